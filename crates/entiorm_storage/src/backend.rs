//! Storage backend trait definition.

use crate::error::StorageResult;
use crate::query::Query;
use async_trait::async_trait;
use entiorm_codec::{Record, Value, ValueKind};
use entiorm_meta::{EntitySchema, ID_FIELD};
use std::sync::Arc;

/// Config key holding the stored schema version.
pub const DB_VERSION_KEY: &str = "dbversion";

/// Config key holding a random identifier written once per fresh store.
pub const INSTALL_UID_KEY: &str = "install_uid";

/// Per-class registration handed to every entity operation.
///
/// Cheap to clone; the schema is shared.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityConfig {
    table: String,
    schema: Arc<EntitySchema>,
}

impl EntityConfig {
    /// Creates a registration whose table is named after the entity.
    pub fn new(schema: EntitySchema) -> Self {
        Self {
            table: schema.name().to_lowercase(),
            schema: Arc::new(schema),
        }
    }

    /// Overrides the table (collection) name.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Entity class name.
    pub fn class_name(&self) -> &str {
        self.schema.name()
    }

    /// Table or collection name used by the backend.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The entity schema.
    pub fn schema(&self) -> &EntitySchema {
        &self.schema
    }

    /// Expected value kind of a field.
    pub fn kind_of(&self, field: &str) -> Option<ValueKind> {
        self.schema.kind_of(field)
    }
}

/// A stored configuration scalar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    /// Config key.
    pub key: String,
    /// Config value.
    pub value: String,
}

impl ConfigEntry {
    /// Creates a config entry.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A raw backend command with bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RawQuery {
    /// Backend-native command text.
    pub exec: String,
    /// Parameters bound in order.
    pub params: Vec<Value>,
}

impl RawQuery {
    /// A command without parameters.
    pub fn new(exec: impl Into<String>) -> Self {
        Self {
            exec: exec.into(),
            params: Vec::new(),
        }
    }

    /// Appends a bound parameter.
    #[must_use]
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }
}

/// Result of one raw command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptOutput {
    /// Rows changed by the command.
    pub rows_affected: u64,
    /// Rows returned by the command.
    pub rows: Vec<Record>,
}

/// Returns the identity of a stored record.
pub fn record_id(record: &Record) -> Option<&str> {
    record.get(ID_FIELD).and_then(Value::as_text)
}

/// Drops the identity field from a patch; identities are immutable.
pub fn without_identity(patch: &Record) -> Record {
    let mut patch = patch.clone();
    if patch.remove(ID_FIELD).is_some() {
        tracing::warn!("ignoring {ID_FIELD} in update patch");
    }
    patch
}

/// A persistence backend for entity records.
///
/// Backends store [`Record`]s per entity class and a small key/value config
/// store. All I/O is asynchronous. A backend owns one underlying connection
/// or handle and serializes access to it internally.
///
/// # Invariants
///
/// - Every stored record carries a text [`ID_FIELD`]
/// - Lookup misses return `None`, `false` or an empty list, never an error
/// - `get_entity_list` returns records in the backend's sequence order
///   unless the query orders them
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`crate::InMemoryBackend`] - Reference implementation and test double
/// - [`crate::FileBackend`] - JSON document on disk
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short backend name used in log lines.
    fn kind(&self) -> &'static str;

    /// Makes an entity class known to the backend.
    ///
    /// Called once per class before `connect`.
    fn register_entity(&self, config: EntityConfig);

    /// The registration of a class, if any.
    fn entity_config(&self, class_name: &str) -> Option<EntityConfig>;

    /// Every registered class.
    fn registered(&self) -> Vec<EntityConfig>;

    /// Opens the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reached or created.
    async fn connect(&self) -> StorageResult<bool>;

    /// Closes the connection. Returns false if it was not open.
    async fn disconnect(&self) -> StorageResult<bool>;

    /// Returns true while connected.
    fn is_connected(&self) -> bool;

    /// Returns true if the last `connect` created a fresh store.
    fn is_new(&self) -> bool;

    /// Reads a config entry.
    async fn get_config(&self, key: &str) -> StorageResult<Option<ConfigEntry>>;

    /// Writes a config entry, replacing any previous value.
    async fn set_config(&self, key: &str, value: &str) -> StorageResult<bool>;

    /// Returns true if the config key exists.
    async fn config_exist(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get_config(key).await?.is_some())
    }

    /// Removes a config entry. Removing a missing key is not an error.
    async fn remove_config(&self, key: &str) -> StorageResult<()>;

    /// Runs raw backend commands in order.
    async fn exec_scripts(&self, scripts: &[RawQuery]) -> StorageResult<Vec<ScriptOutput>>;

    /// Stores a new record. Returns `None` if the identity is taken.
    async fn create_entity(
        &self,
        config: &EntityConfig,
        record: Record,
    ) -> StorageResult<Option<Record>>;

    /// Applies a partial patch. Returns false if the id is unknown.
    async fn update_entity(
        &self,
        config: &EntityConfig,
        id: &str,
        patch: &Record,
    ) -> StorageResult<bool>;

    /// Applies the same patch to every id; true only if every update
    /// succeeded.
    async fn update_bulk_entity(
        &self,
        config: &EntityConfig,
        ids: &[String],
        patch: &Record,
    ) -> StorageResult<bool> {
        let mut all = true;
        for id in ids {
            all &= self.update_entity(config, id, patch).await?;
        }
        Ok(all)
    }

    /// Reads one record.
    async fn get_entity_by_id(
        &self,
        config: &EntityConfig,
        id: &str,
    ) -> StorageResult<Option<Record>>;

    /// Reads every record whose id is listed; unknown ids are skipped.
    async fn get_entity_bulk_by_id(
        &self,
        config: &EntityConfig,
        ids: &[String],
    ) -> StorageResult<Vec<Record>> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.get_entity_by_id(config, id).await? {
                found.push(record);
            }
        }
        Ok(found)
    }

    /// Deletes one record. Returns false if the id is unknown.
    async fn delete_entity_by_id(&self, class_name: &str, id: &str) -> StorageResult<bool>;

    /// Deletes every listed id; true only if every delete succeeded.
    async fn delete_entity_bulk_by_id(&self, class_name: &str, ids: &[String]) -> StorageResult<bool> {
        let mut all = true;
        for id in ids {
            all &= self.delete_entity_by_id(class_name, id).await?;
        }
        Ok(all)
    }

    /// Lists records matching a query.
    async fn get_entity_list(
        &self,
        config: &EntityConfig,
        query: &Query,
    ) -> StorageResult<Vec<Record>>;

    /// Returns the first record whose fields equal every field of `partial`.
    async fn find_entity(
        &self,
        config: &EntityConfig,
        partial: &Record,
    ) -> StorageResult<Option<Record>>;

    /// Creates the storage of one class in a fresh store.
    ///
    /// `seed` is a default instance of the entity.
    async fn init_entity(&self, config: &EntityConfig, seed: &Record) -> StorageResult<bool>;

    /// Backend-specific setup after every class of a fresh store has been
    /// initialized.
    async fn init_new_db(&self) -> StorageResult<()> {
        Ok(())
    }
}
