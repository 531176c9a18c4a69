//! Backend-agnostic conformance suite.
//!
//! Every check receives a fresh, unconnected backend, registers
//! [`Person`](crate::Person) on it and asserts one part of the storage
//! contract. [`run_suite`] runs them all, asking for a new backend per
//! check.
//!
//! ```rust
//! use entiorm_storage::InMemoryBackend;
//! use entiorm_testkit::conformance::run_suite;
//!
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! runtime.block_on(run_suite(InMemoryBackend::new));
//! ```

use crate::fixtures::{person_record, prepare, reading_config};
use entiorm_codec::{Record, Value};
use entiorm_meta::ID_FIELD;
use entiorm_storage::{
    record_id, Direction, Predicate, Query, RawQuery, StorageBackend, DB_VERSION_KEY,
};

/// Runs every check, each against a backend produced by `make`.
pub async fn run_suite<B, F>(mut make: F)
where
    B: StorageBackend,
    F: FnMut() -> B,
{
    check_connect_lifecycle(&make()).await;
    check_config_store(&make()).await;
    check_create_and_get(&make()).await;
    check_create_requires_identity(&make()).await;
    check_update(&make()).await;
    check_delete(&make()).await;
    check_bulk_operations(&make()).await;
    check_bulk_get(&make()).await;
    check_list_window(&make()).await;
    check_id_order(&make()).await;
    check_search_matches_any_field(&make()).await;
    check_predicates(&make()).await;
    check_value_order(&make()).await;
    check_find(&make()).await;
    check_numeric_fields(&make()).await;
    check_empty_scripts(&make()).await;
}

async fn finish<B: StorageBackend + ?Sized>(backend: &B) {
    backend.disconnect().await.expect("Failed to disconnect");
}

fn ids(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| record_id(r).map(str::to_string))
        .collect()
}

/// Connecting a fresh backend reports a new store.
pub async fn check_connect_lifecycle<B: StorageBackend + ?Sized>(backend: &B) {
    assert!(!backend.is_connected());
    assert!(backend.connect().await.expect("connect"));
    assert!(backend.is_connected());
    assert!(backend.is_new(), "fresh store must be new");
    assert!(backend.disconnect().await.expect("disconnect"));
    assert!(!backend.is_connected());
}

/// Config entries can be written, overwritten and removed.
pub async fn check_config_store<B: StorageBackend + ?Sized>(backend: &B) {
    prepare(backend).await;

    assert!(backend.get_config(DB_VERSION_KEY).await.unwrap().is_none());
    assert!(!backend.config_exist(DB_VERSION_KEY).await.unwrap());

    backend.set_config(DB_VERSION_KEY, "1").await.unwrap();
    backend.set_config(DB_VERSION_KEY, "2").await.unwrap();
    let entry = backend.get_config(DB_VERSION_KEY).await.unwrap().unwrap();
    assert_eq!(entry.value, "2");
    assert!(backend.config_exist(DB_VERSION_KEY).await.unwrap());

    backend.remove_config(DB_VERSION_KEY).await.unwrap();
    backend.remove_config(DB_VERSION_KEY).await.unwrap();
    assert!(!backend.config_exist(DB_VERSION_KEY).await.unwrap());

    finish(backend).await;
}

/// A created record reads back unchanged; identities are unique.
pub async fn check_create_and_get<B: StorageBackend + ?Sized>(backend: &B) {
    let config = prepare(backend).await;
    let record = person_record("p-1", "Bob", 30);

    let created = backend
        .create_entity(&config, record.clone())
        .await
        .unwrap();
    assert_eq!(created, Some(record.clone()));

    let fetched = backend.get_entity_by_id(&config, "p-1").await.unwrap();
    assert_eq!(fetched, Some(record));

    let duplicate = backend
        .create_entity(&config, person_record("p-1", "Other", 1))
        .await
        .unwrap();
    assert!(duplicate.is_none(), "duplicate identity must not be stored");

    assert!(backend
        .get_entity_by_id(&config, "missing")
        .await
        .unwrap()
        .is_none());

    finish(backend).await;
}

/// Records without a text identity are rejected.
pub async fn check_create_requires_identity<B: StorageBackend + ?Sized>(backend: &B) {
    let config = prepare(backend).await;
    let mut record = person_record("p-1", "Bob", 30);
    record.remove(ID_FIELD);

    assert!(backend.create_entity(&config, record).await.is_err());

    finish(backend).await;
}

/// Patches touch only their fields and never the identity.
pub async fn check_update<B: StorageBackend + ?Sized>(backend: &B) {
    let config = prepare(backend).await;
    backend
        .create_entity(&config, person_record("p-1", "Bob", 30))
        .await
        .unwrap();

    let patch = Record::new().with("name", "Bobi").with(ID_FIELD, "p-2");
    assert!(backend.update_entity(&config, "p-1", &patch).await.unwrap());

    let fetched = backend
        .get_entity_by_id(&config, "p-1")
        .await
        .unwrap()
        .expect("updated record");
    assert_eq!(fetched.get("name"), Some(&Value::from("Bobi")));
    assert_eq!(fetched.get("age"), Some(&Value::from(30)));
    assert!(backend
        .get_entity_by_id(&config, "p-2")
        .await
        .unwrap()
        .is_none());

    let patch = Record::new().with("age", 31);
    assert!(!backend.update_entity(&config, "missing", &patch).await.unwrap());

    finish(backend).await;
}

/// Deleting twice reports false the second time.
pub async fn check_delete<B: StorageBackend + ?Sized>(backend: &B) {
    let config = prepare(backend).await;
    backend
        .create_entity(&config, person_record("p-1", "Bob", 30))
        .await
        .unwrap();

    let class = config.class_name();
    assert!(backend.delete_entity_by_id(class, "p-1").await.unwrap());
    assert!(!backend.delete_entity_by_id(class, "p-1").await.unwrap());
    assert!(!backend.delete_entity_by_id(class, "never").await.unwrap());

    finish(backend).await;
}

/// Bulk writes attempt every id and report the conjunction.
pub async fn check_bulk_operations<B: StorageBackend + ?Sized>(backend: &B) {
    let config = prepare(backend).await;
    for i in 0..4 {
        backend
            .create_entity(&config, person_record(&format!("p-{i}"), "Bob", 20))
            .await
            .unwrap();
    }
    let all = Query::new();

    let patch = Record::new().with("age", 21);
    let pair = vec!["p-0".to_string(), "p-1".to_string()];
    assert!(backend.update_bulk_entity(&config, &pair, &patch).await.unwrap());
    let updated = backend
        .get_entity_list(&config, &Query::new().where_eq("age", 21))
        .await
        .unwrap();
    assert_eq!(updated.len(), 2);

    let with_missing = vec!["p-2".to_string(), "missing".to_string()];
    assert!(!backend
        .update_bulk_entity(&config, &with_missing, &patch)
        .await
        .unwrap());
    let updated = backend
        .get_entity_list(&config, &Query::new().where_eq("age", 21))
        .await
        .unwrap();
    assert_eq!(updated.len(), 3, "known ids are updated despite a miss");

    let class = config.class_name();
    let before = backend.get_entity_list(&config, &all).await.unwrap().len();
    assert!(backend.delete_entity_bulk_by_id(class, &pair).await.unwrap());
    let after = backend.get_entity_list(&config, &all).await.unwrap().len();
    assert_eq!(before - after, 2);

    assert!(!backend
        .delete_entity_bulk_by_id(class, &with_missing)
        .await
        .unwrap());
    let remaining = backend.get_entity_list(&config, &all).await.unwrap();
    assert_eq!(ids(&remaining), vec!["p-3"]);

    finish(backend).await;
}

/// Bulk reads skip unknown ids.
pub async fn check_bulk_get<B: StorageBackend + ?Sized>(backend: &B) {
    let config = prepare(backend).await;
    backend
        .create_entity(&config, person_record("a", "Ann", 1))
        .await
        .unwrap();
    backend
        .create_entity(&config, person_record("b", "Ben", 2))
        .await
        .unwrap();

    let request = vec!["a".to_string(), "ghost".to_string(), "b".to_string()];
    let mut found = ids(&backend
        .get_entity_bulk_by_id(&config, &request)
        .await
        .unwrap());
    found.sort();
    assert_eq!(found, vec!["a", "b"]);

    finish(backend).await;
}

/// Limit and offset select a half-open window of the sequence.
pub async fn check_list_window<B: StorageBackend + ?Sized>(backend: &B) {
    let config = prepare(backend).await;
    for i in 0..10 {
        backend
            .create_entity(&config, person_record(&format!("p-{i}"), "P", i))
            .await
            .unwrap();
    }

    let list = |query: Query| {
        let config = config.clone();
        async move { ids(&backend.get_entity_list(&config, &query).await.unwrap()) }
    };

    assert!(list(Query::new().limit(0)).await.is_empty());
    assert_eq!(list(Query::new()).await.len(), 10);

    let first = list(Query::new().limit(3)).await;
    let second = list(Query::new().limit(3).offset(3)).await;
    assert_eq!(first, vec!["p-0", "p-1", "p-2"]);
    assert_eq!(second, vec!["p-3", "p-4", "p-5"]);

    assert_eq!(list(Query::new().offset(8)).await, vec!["p-8", "p-9"]);
    assert!(list(Query::new().offset(10)).await.is_empty());
    assert!(list(Query::new().offset(50).limit(5)).await.is_empty());

    finish(backend).await;
}

/// Ordering by identity follows insertion order, reversed for `Desc`.
pub async fn check_id_order<B: StorageBackend + ?Sized>(backend: &B) {
    let config = prepare(backend).await;
    // Identities sort opposite to insertion order.
    for i in 0..100 {
        let id = format!("id-{:03}", 99 - i);
        backend
            .create_entity(&config, person_record(&id, "P", i))
            .await
            .unwrap();
    }

    let asc = backend
        .get_entity_list(&config, &Query::new().order_by(ID_FIELD, Direction::Asc))
        .await
        .unwrap();
    let desc = backend
        .get_entity_list(&config, &Query::new().order_by(ID_FIELD, Direction::Desc))
        .await
        .unwrap();

    assert_eq!(asc.len(), 100);
    assert_eq!(desc.len(), 100);
    assert_eq!(record_id(&asc[0]), Some("id-099"));
    assert_eq!(record_id(&desc[0]), Some("id-000"));

    let mut reversed = ids(&desc);
    reversed.reverse();
    assert_eq!(ids(&asc), reversed);

    finish(backend).await;
}

/// A record matches when any searched field matches.
pub async fn check_search_matches_any_field<B: StorageBackend + ?Sized>(backend: &B) {
    let config = prepare(backend).await;
    backend
        .create_entity(&config, person_record("a", "Ann", 1))
        .await
        .unwrap();
    backend
        .create_entity(&config, person_record("b", "Ben", 2))
        .await
        .unwrap();
    backend
        .create_entity(&config, person_record("c", "Cy", 3))
        .await
        .unwrap();

    let query = Query::new().where_eq("name", "Ann").where_eq("age", 2);
    let found = backend.get_entity_list(&config, &query).await.unwrap();
    assert_eq!(ids(&found), vec!["a", "b"]);

    finish(backend).await;
}

/// Predicate modes and their type rules.
pub async fn check_predicates<B: StorageBackend + ?Sized>(backend: &B) {
    let config = prepare(backend).await;
    for (id, name, age) in [("a", "Alice", 20), ("b", "Bob", 30), ("c", "Carla", 40)] {
        backend
            .create_entity(&config, person_record(id, name, age))
            .await
            .unwrap();
    }

    let search = |query: Query| {
        let config = config.clone();
        async move { ids(&backend.get_entity_list(&config, &query).await.unwrap()) }
    };

    let like = Query::new().where_pred("name", Predicate::like("li"));
    assert_eq!(search(like).await, vec!["a"]);

    let smaller = Query::new().where_pred("age", Predicate::smaller_than(30));
    assert_eq!(search(smaller).await, vec!["a"]);

    let greater = Query::new().where_pred("age", Predicate::greater_than(30));
    assert_eq!(search(greater).await, vec!["c"]);

    let not = Query::new().where_pred("name", Predicate::not("Bob"));
    assert_eq!(search(not).await, vec!["a", "c"]);

    let range = Query::new().where_all(
        "age",
        vec![Predicate::greater_than(15), Predicate::smaller_than(35)],
    );
    assert_eq!(search(range).await, vec!["a", "b"]);

    let like_number = Query::new().where_pred("age", Predicate::like("2"));
    assert!(search(like_number).await.is_empty());

    let compare_text = Query::new().where_pred("name", Predicate::greater_than(1));
    assert!(search(compare_text).await.is_empty());

    let unknown = Query::new().where_eq("nickname", "Al");
    assert!(search(unknown).await.is_empty());

    finish(backend).await;
}

/// Ordering by a value column sorts by that value.
pub async fn check_value_order<B: StorageBackend + ?Sized>(backend: &B) {
    let config = prepare(backend).await;
    for (id, age) in [("a", 40), ("b", 10), ("c", 30), ("d", 20)] {
        backend
            .create_entity(&config, person_record(id, "P", age))
            .await
            .unwrap();
    }

    let asc = backend
        .get_entity_list(&config, &Query::new().order_by("age", Direction::Asc))
        .await
        .unwrap();
    assert_eq!(ids(&asc), vec!["b", "d", "c", "a"]);

    let desc = backend
        .get_entity_list(
            &config,
            &Query::new().order_by("age", Direction::Desc).limit(2),
        )
        .await
        .unwrap();
    assert_eq!(ids(&desc), vec!["a", "c"]);

    finish(backend).await;
}

/// Find requires every field of the partial record.
pub async fn check_find<B: StorageBackend + ?Sized>(backend: &B) {
    let config = prepare(backend).await;
    backend
        .create_entity(&config, person_record("a", "Ann", 40))
        .await
        .unwrap();
    backend
        .create_entity(&config, person_record("b", "Ann", 41))
        .await
        .unwrap();

    let partial = Record::new().with("name", "Ann").with("age", 41);
    let found = backend.find_entity(&config, &partial).await.unwrap();
    assert_eq!(found.as_ref().and_then(record_id), Some("b"));

    let first = backend
        .find_entity(&config, &Record::new().with("name", "Ann"))
        .await
        .unwrap();
    assert_eq!(first.as_ref().and_then(record_id), Some("a"));

    let none = Record::new().with("name", "Ann").with("age", 99);
    assert!(backend.find_entity(&config, &none).await.unwrap().is_none());

    finish(backend).await;
}

/// Numbers match by value in `find_entity` and searches alike, and float
/// columns keep their precision.
pub async fn check_numeric_fields<B: StorageBackend + ?Sized>(backend: &B) {
    let config = reading_config();
    backend.register_entity(config.clone());
    backend.connect().await.expect("connect");
    backend.init_entity(&config, &Record::new()).await.unwrap();

    let whole = Record::new()
        .with(ID_FIELD, "r-1")
        .with("score", 3i64)
        .with("ratio", 0.1);
    let fractional = Record::new().with(ID_FIELD, "r-2").with("score", 4.5);
    backend.create_entity(&config, whole).await.unwrap();
    backend.create_entity(&config, fractional).await.unwrap();

    for operand in [Value::from(3i64), Value::from(3.0)] {
        let partial = Record::new().with("score", operand.clone());
        let found = backend.find_entity(&config, &partial).await.unwrap();
        assert_eq!(found.as_ref().and_then(record_id), Some("r-1"));

        let listed = backend
            .get_entity_list(&config, &Query::new().where_eq("score", operand))
            .await
            .unwrap();
        assert_eq!(ids(&listed), vec!["r-1"]);
    }

    let found = backend
        .find_entity(&config, &Record::new().with("score", 4.5))
        .await
        .unwrap();
    assert_eq!(found.as_ref().and_then(record_id), Some("r-2"));
    assert!(backend
        .find_entity(&config, &Record::new().with("score", 4i64))
        .await
        .unwrap()
        .is_none());

    let fetched = backend.get_entity_by_id(&config, "r-1").await.unwrap().unwrap();
    assert_eq!(fetched.get("ratio"), Some(&Value::Float(0.1)));

    finish(backend).await;
}

/// An empty script batch produces no output.
pub async fn check_empty_scripts<B: StorageBackend + ?Sized>(backend: &B) {
    prepare(backend).await;
    let scripts: [RawQuery; 0] = [];
    assert!(backend.exec_scripts(&scripts).await.unwrap().is_empty());
    finish(backend).await;
}
