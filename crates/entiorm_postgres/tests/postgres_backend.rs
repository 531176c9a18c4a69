//! Integration tests against a live PostgreSQL server.
//!
//! Run with `DATABASE_URL=postgres://... cargo test -p entiorm_postgres -- --ignored`.
//! Every backend gets its own schema, dropped at the end of the test.

use entiorm_core::{Database, DbConfig, Entity, EntityOptions};
use entiorm_postgres::{sql, PostgresBackend, PostgresConfig};
use entiorm_storage::{RawQuery, StorageBackend, DB_VERSION_KEY, INSTALL_UID_KEY};
use entiorm_testkit::{conformance, Person};
use std::sync::Arc;
use uuid::Uuid;

fn base_config() -> PostgresConfig {
    PostgresConfig::from_env().expect("DATABASE_URL must be set for PostgreSQL tests")
}

fn unique_schema() -> String {
    format!("entiorm_test_{}", Uuid::new_v4().simple())
}

async fn drop_schemas(schemas: &[String]) {
    let cleaner = PostgresBackend::new(base_config().schema(unique_schema()));
    cleaner.connect().await.expect("connect for cleanup");
    let mut scripts: Vec<RawQuery> = schemas
        .iter()
        .map(|s| {
            let schema = sql::quote_ident(s).unwrap();
            RawQuery::new(format!("DROP SCHEMA IF EXISTS {schema} CASCADE"))
        })
        .collect();
    scripts.push(RawQuery::new(format!(
        "DROP SCHEMA IF EXISTS {} CASCADE",
        sql::quote_ident(cleaner.schema()).unwrap()
    )));
    cleaner.exec_scripts(&scripts).await.expect("drop schemas");
    cleaner.disconnect().await.unwrap();
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn postgres_backend_conforms() {
    let mut schemas = Vec::new();
    conformance::run_suite(|| {
        let schema = unique_schema();
        schemas.push(schema.clone());
        PostgresBackend::new(base_config().schema(schema))
    })
    .await;
    drop_schemas(&schemas).await;
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn bootstrap_seeds_install_uid_once() {
    let schema = unique_schema();
    let first = PostgresBackend::new(base_config().schema(schema.clone()));
    first.connect().await.unwrap();
    assert!(first.is_new());
    let uid = first.get_config(INSTALL_UID_KEY).await.unwrap().unwrap();
    first.disconnect().await.unwrap();

    let second = PostgresBackend::new(base_config().schema(schema.clone()));
    second.connect().await.unwrap();
    assert!(!second.is_new());
    assert_eq!(second.get_config(INSTALL_UID_KEY).await.unwrap(), Some(uid));
    second.disconnect().await.unwrap();

    drop_schemas(&[schema]).await;
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn scripts_return_rows() {
    let schema = unique_schema();
    let backend = PostgresBackend::new(base_config().schema(schema.clone()));
    backend.connect().await.unwrap();

    let outputs = backend
        .exec_scripts(&[RawQuery::new("SELECT $1::INTEGER + 1 AS n").bind(41)])
        .await
        .unwrap();
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].rows.len(), 1);
    assert_eq!(outputs[0].rows[0].integer("n").unwrap(), 42);

    backend.disconnect().await.unwrap();
    drop_schemas(&[schema]).await;
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn database_starts_on_postgres() {
    let schema = unique_schema();
    let backend = Arc::new(PostgresBackend::new(base_config().schema(schema.clone())));
    let db = Database::new(backend, DbConfig::default().target_version("2"));
    let people = db
        .register_entity::<Person>(EntityOptions::default())
        .unwrap();
    db.start().await.unwrap();

    assert_eq!(db.version().await.unwrap().as_deref(), Some("2"));
    assert!(db.backend().config_exist(DB_VERSION_KEY).await.unwrap());

    let bob = Person::new("Bob", 30);
    people.create_object(&bob).await.unwrap();
    assert_eq!(people.get_obj_by_id(bob.id()).await.unwrap(), Some(bob));

    db.stop().await.unwrap();
    drop_schemas(&[schema]).await;
}
