//! PostgreSQL implementation of [`StorageBackend`].

use crate::config::PostgresConfig;
use crate::row::{dynamic_record, entity_record, prepare};
use crate::sql;
use async_trait::async_trait;
use entiorm_codec::Record;
use entiorm_storage::{
    record_id, without_identity, ConfigEntry, EntityConfig, Query, RawQuery, ScriptOutput,
    StorageBackend, StorageError, StorageResult,
};
use parking_lot::RwLock;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

fn driver(message: &str) -> impl FnOnce(sqlx::Error) -> StorageError + '_ {
    move |e| StorageError::backend(message, e)
}

/// PostgreSQL-backed storage.
///
/// Every entity class gets one table in the configured schema, plus a shared
/// `config` table for the key/value store. Connecting to a database where
/// the schema is absent bootstraps it and reports the store as new.
pub struct PostgresBackend {
    config: PostgresConfig,
    entities: RwLock<HashMap<String, EntityConfig>>,
    pool: RwLock<Option<PgPool>>,
    is_new: RwLock<bool>,
}

impl std::fmt::Debug for PostgresBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresBackend")
            .field("schema", &self.config.schema)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl PostgresBackend {
    /// Creates a disconnected backend.
    #[must_use]
    pub fn new(config: PostgresConfig) -> Self {
        Self {
            config,
            entities: RwLock::new(HashMap::new()),
            pool: RwLock::new(None),
            is_new: RwLock::new(false),
        }
    }

    /// The schema this backend writes to.
    #[must_use]
    pub fn schema(&self) -> &str {
        &self.config.schema
    }

    fn pool(&self) -> StorageResult<PgPool> {
        self.pool.read().clone().ok_or(StorageError::NotConnected)
    }

    async fn execute(&self, raw: &RawQuery) -> StorageResult<u64> {
        let pool = self.pool()?;
        let result = prepare(raw)
            .execute(&pool)
            .await
            .map_err(driver("statement failed"))?;
        Ok(result.rows_affected())
    }

    async fn fetch_entities(
        &self,
        config: &EntityConfig,
        raw: &RawQuery,
    ) -> StorageResult<Vec<Record>> {
        let pool = self.pool()?;
        let rows = prepare(raw)
            .fetch_all(&pool)
            .await
            .map_err(driver("query failed"))?;
        rows.iter().map(|row| entity_record(config, row)).collect()
    }

    fn table_of(&self, class_name: &str) -> StorageResult<String> {
        self.entities
            .read()
            .get(class_name)
            .map(|c| c.table().to_string())
            .ok_or_else(|| StorageError::unknown_entity(class_name))
    }
}

#[async_trait]
impl StorageBackend for PostgresBackend {
    fn kind(&self) -> &'static str {
        "postgres"
    }

    fn register_entity(&self, config: EntityConfig) {
        self.entities
            .write()
            .insert(config.class_name().to_string(), config);
    }

    fn entity_config(&self, class_name: &str) -> Option<EntityConfig> {
        self.entities.read().get(class_name).cloned()
    }

    fn registered(&self) -> Vec<EntityConfig> {
        self.entities.read().values().cloned().collect()
    }

    async fn connect(&self) -> StorageResult<bool> {
        if self.is_connected() {
            return Ok(true);
        }
        sql::quote_ident(&self.config.schema)?;

        let pool = PgPoolOptions::new()
            .max_connections(self.config.max_connections)
            .acquire_timeout(self.config.acquire_timeout)
            .connect(&self.config.url)
            .await
            .map_err(driver("failed to connect to PostgreSQL"))?;

        let exists = prepare(&sql::schema_exists(&self.config.schema))
            .fetch_optional(&pool)
            .await
            .map_err(driver("failed to inspect schemas"))?
            .is_some();

        *self.pool.write() = Some(pool);
        *self.is_new.write() = !exists;

        if !exists {
            let install_uid = Uuid::new_v4().to_string();
            self.exec_scripts(&sql::bootstrap(&self.config.schema, &install_uid)?)
                .await?;
            info!(schema = %self.config.schema, "bootstrapped new schema");
        }
        debug!(schema = %self.config.schema, is_new = !exists, "connected to PostgreSQL");
        Ok(true)
    }

    async fn disconnect(&self) -> StorageResult<bool> {
        let Some(pool) = self.pool.write().take() else {
            return Ok(false);
        };
        pool.close().await;
        Ok(true)
    }

    fn is_connected(&self) -> bool {
        self.pool.read().is_some()
    }

    fn is_new(&self) -> bool {
        *self.is_new.read()
    }

    async fn get_config(&self, key: &str) -> StorageResult<Option<ConfigEntry>> {
        let pool = self.pool()?;
        let row = prepare(&sql::get_config(&self.config.schema, key)?)
            .fetch_optional(&pool)
            .await
            .map_err(driver("failed to read config"))?;
        row.map(|row| {
            let value: String = row
                .try_get("c_value")
                .map_err(driver("failed to decode config"))?;
            Ok(ConfigEntry::new(key, value))
        })
        .transpose()
    }

    async fn set_config(&self, key: &str, value: &str) -> StorageResult<bool> {
        let affected = self
            .execute(&sql::set_config(&self.config.schema, key, value)?)
            .await?;
        Ok(affected > 0)
    }

    async fn remove_config(&self, key: &str) -> StorageResult<()> {
        self.execute(&sql::remove_config(&self.config.schema, key)?)
            .await?;
        Ok(())
    }

    async fn exec_scripts(&self, scripts: &[RawQuery]) -> StorageResult<Vec<ScriptOutput>> {
        let pool = self.pool()?;
        let mut outputs = Vec::with_capacity(scripts.len());
        for script in scripts {
            debug!(sql = %script.exec, params = script.params.len(), "executing script");
            let output = if sql::returns_rows(&script.exec) {
                let rows = prepare(script)
                    .fetch_all(&pool)
                    .await
                    .map_err(driver("script failed"))?
                    .iter()
                    .map(dynamic_record)
                    .collect::<StorageResult<Vec<_>>>()?;
                ScriptOutput {
                    rows_affected: rows.len() as u64,
                    rows,
                }
            } else {
                let result = prepare(script)
                    .execute(&pool)
                    .await
                    .map_err(driver("script failed"))?;
                ScriptOutput {
                    rows_affected: result.rows_affected(),
                    rows: Vec::new(),
                }
            };
            outputs.push(output);
        }
        Ok(outputs)
    }

    async fn create_entity(
        &self,
        config: &EntityConfig,
        record: Record,
    ) -> StorageResult<Option<Record>> {
        if record_id(&record).is_none() {
            return Err(StorageError::invalid_record("record has no text identity"));
        }
        let affected = self
            .execute(&sql::insert(&self.config.schema, config, &record)?)
            .await?;
        Ok((affected > 0).then_some(record))
    }

    async fn update_entity(
        &self,
        config: &EntityConfig,
        id: &str,
        patch: &Record,
    ) -> StorageResult<bool> {
        let patch = without_identity(patch);
        let affected = self
            .execute(&sql::update(&self.config.schema, config, id, &patch)?)
            .await?;
        Ok(affected > 0)
    }

    async fn get_entity_by_id(
        &self,
        config: &EntityConfig,
        id: &str,
    ) -> StorageResult<Option<Record>> {
        let raw = sql::select_by_id(&self.config.schema, config, id)?;
        Ok(self.fetch_entities(config, &raw).await?.into_iter().next())
    }

    async fn delete_entity_by_id(&self, class_name: &str, id: &str) -> StorageResult<bool> {
        let table = self.table_of(class_name)?;
        let affected = self
            .execute(&sql::delete_by_id(&self.config.schema, &table, id)?)
            .await?;
        Ok(affected > 0)
    }

    async fn get_entity_list(
        &self,
        config: &EntityConfig,
        query: &Query,
    ) -> StorageResult<Vec<Record>> {
        if query.limit == Some(0) {
            return Ok(Vec::new());
        }
        let raw = sql::select_list(&self.config.schema, config, query)?;
        self.fetch_entities(config, &raw).await
    }

    async fn find_entity(
        &self,
        config: &EntityConfig,
        partial: &Record,
    ) -> StorageResult<Option<Record>> {
        let raw = sql::find(&self.config.schema, config, partial)?;
        Ok(self.fetch_entities(config, &raw).await?.into_iter().next())
    }

    async fn init_entity(&self, config: &EntityConfig, seed: &Record) -> StorageResult<bool> {
        // The seed is a default instance; every field it carries must have a
        // column, or later writes of real instances would fail.
        if let Some(field) = seed
            .keys()
            .find(|f| *f != entiorm_meta::ID_FIELD && !config.schema().has_field(f))
        {
            return Err(StorageError::invalid_record(format!(
                "{} default instance has undeclared field {field}",
                config.class_name()
            )));
        }
        self.execute(&sql::create_table(&self.config.schema, config)?)
            .await?;
        debug!(class = config.class_name(), table = config.table(), "table created");
        Ok(true)
    }
}
