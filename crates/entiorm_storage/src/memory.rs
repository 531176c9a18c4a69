//! In-memory storage backend for testing.

use crate::backend::{
    record_id, without_identity, ConfigEntry, EntityConfig, RawQuery, ScriptOutput,
    StorageBackend,
};
use crate::error::{StorageError, StorageResult};
use crate::query::{apply_query, find_first, Query};
use async_trait::async_trait;
use entiorm_codec::Record;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default)]
struct Store {
    connected: bool,
    is_new: bool,
    config: BTreeMap<String, String>,
    tables: HashMap<String, Vec<Record>>,
}

impl Store {
    fn check_connected(&self) -> StorageResult<()> {
        if self.connected {
            Ok(())
        } else {
            Err(StorageError::NotConnected)
        }
    }

    fn table(&self, class_name: &str) -> StorageResult<&Vec<Record>> {
        self.check_connected()?;
        self.tables
            .get(class_name)
            .ok_or_else(|| StorageError::unknown_entity(class_name))
    }

    fn table_mut(&mut self, class_name: &str) -> StorageResult<&mut Vec<Record>> {
        self.check_connected()?;
        self.tables
            .get_mut(class_name)
            .ok_or_else(|| StorageError::unknown_entity(class_name))
    }
}

/// An in-memory storage backend.
///
/// Records live in ordered tables keyed by entity class name; insertion
/// order is the sequence order used by queries. This backend is suitable
/// for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral stores that don't need persistence
///
/// Every [`connect`](StorageBackend::connect) starts from an empty store
/// that reports itself as new.
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across tasks.
///
/// # Example
///
/// ```rust
/// use entiorm_codec::Record;
/// use entiorm_meta::EntitySchema;
/// use entiorm_storage::{EntityConfig, InMemoryBackend, StorageBackend};
///
/// let runtime = tokio::runtime::Runtime::new().unwrap();
/// runtime.block_on(async {
/// let backend = InMemoryBackend::new();
/// let config = EntityConfig::new(EntitySchema::builder("note", 1).build());
/// backend.connect().await.unwrap();
/// backend.init_entity(&config, &Record::new()).await.unwrap();
///
/// let note = Record::new().with("e_id", "n1").with("text", "hi");
/// assert!(backend.create_entity(&config, note).await.unwrap().is_some());
/// });
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    entities: RwLock<HashMap<String, EntityConfig>>,
    store: RwLock<Store>,
}

impl InMemoryBackend {
    /// Creates a new, disconnected backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records stored for a class, if it has a table.
    #[must_use]
    pub fn len_of(&self, class_name: &str) -> Option<usize> {
        self.store.read().tables.get(class_name).map(Vec::len)
    }

    /// Snapshot of the config store.
    #[must_use]
    pub fn config_entries(&self) -> Vec<ConfigEntry> {
        self.store
            .read()
            .config
            .iter()
            .map(|(k, v)| ConfigEntry::new(k.clone(), v.clone()))
            .collect()
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    fn kind(&self) -> &'static str {
        "memory"
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
        let mut store = self.store.write();
        *store = Store {
            connected: true,
            is_new: true,
            ..Store::default()
        };
        tracing::debug!(backend = "memory", "connected to fresh store");
        Ok(true)
    }

    async fn disconnect(&self) -> StorageResult<bool> {
        let mut store = self.store.write();
        let was_connected = store.connected;
        store.connected = false;
        Ok(was_connected)
    }

    fn is_connected(&self) -> bool {
        self.store.read().connected
    }

    fn is_new(&self) -> bool {
        self.store.read().is_new
    }

    async fn get_config(&self, key: &str) -> StorageResult<Option<ConfigEntry>> {
        let store = self.store.read();
        store.check_connected()?;
        Ok(store
            .config
            .get(key)
            .map(|value| ConfigEntry::new(key, value.clone())))
    }

    async fn set_config(&self, key: &str, value: &str) -> StorageResult<bool> {
        let mut store = self.store.write();
        store.check_connected()?;
        store.config.insert(key.to_string(), value.to_string());
        Ok(true)
    }

    async fn remove_config(&self, key: &str) -> StorageResult<()> {
        let mut store = self.store.write();
        store.check_connected()?;
        store.config.remove(key);
        Ok(())
    }

    async fn exec_scripts(&self, scripts: &[RawQuery]) -> StorageResult<Vec<ScriptOutput>> {
        if scripts.is_empty() {
            return Ok(Vec::new());
        }
        Err(StorageError::Unsupported {
            operation: "exec_scripts",
        })
    }

    async fn create_entity(
        &self,
        config: &EntityConfig,
        record: Record,
    ) -> StorageResult<Option<Record>> {
        let id = record_id(&record)
            .ok_or_else(|| StorageError::invalid_record("record has no text identity"))?
            .to_string();
        let mut store = self.store.write();
        let table = store.table_mut(config.class_name())?;
        if table.iter().any(|r| record_id(r) == Some(id.as_str())) {
            tracing::debug!(class = config.class_name(), %id, "identity already taken");
            return Ok(None);
        }
        table.push(record.clone());
        Ok(Some(record))
    }

    async fn update_entity(
        &self,
        config: &EntityConfig,
        id: &str,
        patch: &Record,
    ) -> StorageResult<bool> {
        let patch = without_identity(patch);
        let mut store = self.store.write();
        let table = store.table_mut(config.class_name())?;
        match table.iter_mut().find(|r| record_id(r) == Some(id)) {
            Some(record) => {
                record.apply(&patch);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_entity_by_id(
        &self,
        config: &EntityConfig,
        id: &str,
    ) -> StorageResult<Option<Record>> {
        let store = self.store.read();
        let table = store.table(config.class_name())?;
        Ok(table.iter().find(|r| record_id(r) == Some(id)).cloned())
    }

    async fn delete_entity_by_id(&self, class_name: &str, id: &str) -> StorageResult<bool> {
        let mut store = self.store.write();
        let table = store.table_mut(class_name)?;
        match table.iter().position(|r| record_id(r) == Some(id)) {
            Some(index) => {
                table.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_entity_list(
        &self,
        config: &EntityConfig,
        query: &Query,
    ) -> StorageResult<Vec<Record>> {
        let store = self.store.read();
        let table = store.table(config.class_name())?;
        Ok(apply_query(table.clone(), query))
    }

    async fn find_entity(
        &self,
        config: &EntityConfig,
        partial: &Record,
    ) -> StorageResult<Option<Record>> {
        let store = self.store.read();
        let table = store.table(config.class_name())?;
        Ok(find_first(table, partial).cloned())
    }

    async fn init_entity(&self, config: &EntityConfig, _seed: &Record) -> StorageResult<bool> {
        let mut store = self.store.write();
        store.check_connected()?;
        store
            .tables
            .entry(config.class_name().to_string())
            .or_default();
        Ok(true)
    }
}
