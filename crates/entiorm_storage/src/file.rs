//! JSON document storage backend.
//!
//! The whole store is one JSON document on disk:
//!
//! ```text
//! {
//!   "config":      { "dbversion": "2", ... },
//!   "collections": { "user": [ { "e_id": "...", "name": "Bob" }, ... ] }
//! }
//! ```
//!
//! A sidecar `<path>.lock` file holds an advisory exclusive lock while the
//! backend is connected, so only one process uses the document at a time.
//! Every write replaces the document atomically.

use crate::backend::{
    without_identity, ConfigEntry, EntityConfig, RawQuery, ScriptOutput, StorageBackend,
};
use crate::error::{StorageError, StorageResult};
use crate::query::{apply_query, Query};
use async_trait::async_trait;
use entiorm_codec::{record_from_json, record_to_json, Record};
use entiorm_meta::ID_FIELD;
use fs2::FileExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Map;
use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

type RawRecord = Map<String, serde_json::Value>;

/// Configuration of a [`FileBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileConfig {
    /// Path of the JSON document.
    pub path: PathBuf,
    /// Create the document (and parent directories) if absent.
    pub create_if_missing: bool,
    /// Write indented JSON.
    pub pretty: bool,
}

impl FileConfig {
    /// Creates a config for the document at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            create_if_missing: true,
            pretty: false,
        }
    }

    /// Sets whether a missing document is created.
    #[must_use]
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// Sets whether the document is indented.
    #[must_use]
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    fn lock_path(&self) -> PathBuf {
        with_suffix(&self.path, ".lock")
    }

    fn temp_path(&self) -> PathBuf {
        with_suffix(&self.path, ".tmp")
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    config: BTreeMap<String, String>,
    #[serde(default)]
    collections: BTreeMap<String, Vec<RawRecord>>,
}

impl Document {
    fn collection(&self, table: &str) -> StorageResult<&Vec<RawRecord>> {
        self.collections
            .get(table)
            .ok_or_else(|| StorageError::unknown_entity(table))
    }

    fn collection_mut(&mut self, table: &str) -> StorageResult<&mut Vec<RawRecord>> {
        self.collections
            .get_mut(table)
            .ok_or_else(|| StorageError::unknown_entity(table))
    }
}

fn raw_id(raw: &RawRecord) -> Option<&str> {
    raw.get(ID_FIELD).and_then(serde_json::Value::as_str)
}

fn decode(config: &EntityConfig, raw: &RawRecord) -> StorageResult<Record> {
    Ok(record_from_json(raw, |field| config.kind_of(field))?)
}

#[derive(Debug)]
struct Open {
    doc: Document,
    /// Held for exclusive access; released on drop.
    lock_file: File,
}

/// A storage backend keeping the whole store in one JSON file.
///
/// Values are decoded with the registered schema of their class, so typed
/// fields such as timestamps and byte strings survive a round trip.
///
/// # Example
///
/// ```no_run
/// use entiorm_storage::{FileBackend, FileConfig, StorageBackend};
///
/// # async fn demo() -> entiorm_storage::StorageResult<()> {
/// let backend = FileBackend::new(FileConfig::new("store.json").pretty(true));
/// backend.connect().await?;
/// backend.set_config("owner", "ops").await?;
/// backend.disconnect().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FileBackend {
    config: FileConfig,
    entities: RwLock<HashMap<String, EntityConfig>>,
    state: RwLock<Option<Open>>,
    is_new: RwLock<bool>,
}

impl FileBackend {
    /// Creates a disconnected backend.
    #[must_use]
    pub fn new(config: FileConfig) -> Self {
        Self {
            config,
            entities: RwLock::new(HashMap::new()),
            state: RwLock::new(None),
            is_new: RwLock::new(false),
        }
    }

    /// Creates a disconnected backend for the document at `path`.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::new(FileConfig::new(path))
    }

    /// Returns the path of the document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Every config entry, in key order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotConnected`] when disconnected.
    pub fn config_entries(&self) -> StorageResult<Vec<ConfigEntry>> {
        self.read(|doc| {
            Ok(doc
                .config
                .iter()
                .map(|(k, v)| ConfigEntry::new(k.clone(), v.clone()))
                .collect())
        })
    }

    /// Every collection with its record count, in name order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotConnected`] when disconnected.
    pub fn collection_counts(&self) -> StorageResult<Vec<(String, usize)>> {
        self.read(|doc| {
            Ok(doc
                .collections
                .iter()
                .map(|(name, rows)| (name.clone(), rows.len()))
                .collect())
        })
    }

    fn load(&self) -> StorageResult<(Document, bool)> {
        let path = &self.config.path;
        if !path.exists() {
            if !self.config.create_if_missing {
                return Err(StorageError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("store does not exist: {}", path.display()),
                )));
            }
            return Ok((Document::default(), true));
        }

        let data = fs::read(path)?;
        if data.is_empty() {
            return Ok((Document::default(), true));
        }
        let doc = serde_json::from_slice(&data).map_err(|e| {
            StorageError::Corrupted(format!("{}: {e}", path.display()))
        })?;
        Ok((doc, false))
    }

    /// Writes the document to a temporary file, syncs it and renames it
    /// over the store.
    fn persist(&self, doc: &Document) -> StorageResult<()> {
        let data = if self.config.pretty {
            serde_json::to_vec_pretty(doc)?
        } else {
            serde_json::to_vec(doc)?
        };

        let temp_path = self.config.temp_path();
        let mut file = File::create(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &self.config.path)?;
        tracing::trace!(path = %self.config.path.display(), bytes = data.len(), "store persisted");
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&Document) -> StorageResult<T>) -> StorageResult<T> {
        let state = self.state.read();
        let open = state.as_ref().ok_or(StorageError::NotConnected)?;
        f(&open.doc)
    }

    /// Applies `f` to a copy of the document and persists it when `f`
    /// reports a change. The in-memory document only changes once the
    /// write reached disk.
    fn write<T>(
        &self,
        f: impl FnOnce(&mut Document) -> StorageResult<(T, bool)>,
    ) -> StorageResult<T> {
        let mut state = self.state.write();
        let open = state.as_mut().ok_or(StorageError::NotConnected)?;
        let mut next = open.doc.clone();
        let (out, changed) = f(&mut next)?;
        if changed {
            self.persist(&next)?;
            open.doc = next;
        }
        Ok(out)
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
impl StorageBackend for FileBackend {
    fn kind(&self) -> &'static str {
        "file"
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
        let mut state = self.state.write();
        if state.is_some() {
            return Ok(true);
        }

        if self.config.create_if_missing {
            if let Some(parent) = self.config.path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
        }

        let lock_path = self.config.lock_path();
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked { path: lock_path });
        }

        let (doc, is_new) = self.load()?;
        if is_new {
            self.persist(&doc)?;
        }
        *self.is_new.write() = is_new;
        *state = Some(Open { doc, lock_file });

        tracing::debug!(
            path = %self.config.path.display(),
            is_new,
            "file store connected"
        );
        Ok(true)
    }

    async fn disconnect(&self) -> StorageResult<bool> {
        let Some(open) = self.state.write().take() else {
            return Ok(false);
        };
        open.lock_file.unlock()?;
        tracing::debug!(path = %self.config.path.display(), "file store disconnected");
        Ok(true)
    }

    fn is_connected(&self) -> bool {
        self.state.read().is_some()
    }

    fn is_new(&self) -> bool {
        *self.is_new.read()
    }

    async fn get_config(&self, key: &str) -> StorageResult<Option<ConfigEntry>> {
        self.read(|doc| Ok(doc.config.get(key).map(|v| ConfigEntry::new(key, v.clone()))))
    }

    async fn set_config(&self, key: &str, value: &str) -> StorageResult<bool> {
        self.write(|doc| {
            let previous = doc.config.insert(key.to_string(), value.to_string());
            Ok((true, previous.as_deref() != Some(value)))
        })
    }

    async fn remove_config(&self, key: &str) -> StorageResult<()> {
        self.write(|doc| Ok(((), doc.config.remove(key).is_some())))
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
        let raw = record_to_json(&record);
        let id = raw_id(&raw)
            .ok_or_else(|| StorageError::invalid_record("record has no text identity"))?
            .to_string();
        self.write(|doc| {
            let rows = doc.collection_mut(config.table())?;
            if rows.iter().any(|r| raw_id(r) == Some(id.as_str())) {
                return Ok((None, false));
            }
            rows.push(raw);
            Ok((Some(record), true))
        })
    }

    async fn update_entity(
        &self,
        config: &EntityConfig,
        id: &str,
        patch: &Record,
    ) -> StorageResult<bool> {
        let patch = record_to_json(&without_identity(patch));
        self.write(|doc| {
            let rows = doc.collection_mut(config.table())?;
            match rows.iter_mut().find(|r| raw_id(r) == Some(id)) {
                Some(row) => {
                    for (field, value) in patch {
                        row.insert(field, value);
                    }
                    Ok((true, true))
                }
                None => Ok((false, false)),
            }
        })
    }

    async fn get_entity_by_id(
        &self,
        config: &EntityConfig,
        id: &str,
    ) -> StorageResult<Option<Record>> {
        self.read(|doc| {
            doc.collection(config.table())?
                .iter()
                .find(|r| raw_id(r) == Some(id))
                .map(|r| decode(config, r))
                .transpose()
        })
    }

    async fn delete_entity_by_id(&self, class_name: &str, id: &str) -> StorageResult<bool> {
        let table = self.table_of(class_name)?;
        self.write(|doc| {
            let rows = doc.collection_mut(&table)?;
            match rows.iter().position(|r| raw_id(r) == Some(id)) {
                Some(index) => {
                    rows.remove(index);
                    Ok((true, true))
                }
                None => Ok((false, false)),
            }
        })
    }

    async fn get_entity_list(
        &self,
        config: &EntityConfig,
        query: &Query,
    ) -> StorageResult<Vec<Record>> {
        let records = self.read(|doc| {
            doc.collection(config.table())?
                .iter()
                .map(|r| decode(config, r))
                .collect::<StorageResult<Vec<_>>>()
        })?;
        Ok(apply_query(records, query))
    }

    async fn find_entity(
        &self,
        config: &EntityConfig,
        partial: &Record,
    ) -> StorageResult<Option<Record>> {
        self.read(|doc| {
            for raw in doc.collection(config.table())? {
                let record = decode(config, raw)?;
                if record.contains_all(partial) {
                    return Ok(Some(record));
                }
            }
            Ok(None)
        })
    }

    async fn init_entity(&self, config: &EntityConfig, _seed: &Record) -> StorageResult<bool> {
        self.write(|doc| {
            if doc.collections.contains_key(config.table()) {
                return Ok((true, false));
            }
            doc.collections.insert(config.table().to_string(), Vec::new());
            Ok((true, true))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Direction;
    use entiorm_codec::Value;
    use entiorm_meta::{ColumnMeta, DataType, EntitySchema};
    use tempfile::tempdir;

    fn item_config() -> EntityConfig {
        EntityConfig::new(
            EntitySchema::builder("Item", 1)
                .column("label", ColumnMeta::new(DataType::Text))
                .column("payload", ColumnMeta::new(DataType::Blob).nullable())
                .build(),
        )
    }

    fn item(id: &str, label: &str) -> Record {
        Record::new().with(ID_FIELD, id).with("label", label)
    }

    async fn ready(path: &Path) -> (FileBackend, EntityConfig) {
        let backend = FileBackend::open(path);
        let config = item_config();
        backend.register_entity(config.clone());
        backend.connect().await.unwrap();
        backend.init_entity(&config, &Record::new()).await.unwrap();
        (backend, config)
    }

    #[tokio::test]
    async fn file_create_new() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        let backend = FileBackend::open(&path);
        backend.connect().await.unwrap();
        assert!(backend.is_new());
        assert!(path.exists());
        assert_eq!(backend.path(), path);
    }

    #[tokio::test]
    async fn file_missing_store_without_create_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.json");

        let backend = FileBackend::new(FileConfig::new(&path).create_if_missing(false));
        assert!(matches!(backend.connect().await, Err(StorageError::Io(_))));
        assert!(!backend.is_connected());
    }

    #[tokio::test]
    async fn file_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        {
            let (backend, config) = ready(&path).await;
            let record = item("a", "first").with("payload", vec![1u8, 2, 3]);
            backend.create_entity(&config, record).await.unwrap();
            backend.set_config("dbversion", "3").await.unwrap();
            backend.disconnect().await.unwrap();
        }

        {
            let (backend, config) = ready(&path).await;
            assert!(!backend.is_new());
            let stored = backend.get_entity_by_id(&config, "a").await.unwrap().unwrap();
            assert_eq!(stored.get("payload"), Some(&Value::Bytes(vec![1, 2, 3])));
            assert_eq!(
                backend.get_config("dbversion").await.unwrap().unwrap().value,
                "3"
            );
        }
    }

    #[tokio::test]
    async fn file_second_connection_is_locked() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        let first = FileBackend::open(&path);
        first.connect().await.unwrap();

        let second = FileBackend::open(&path);
        assert!(matches!(
            second.connect().await,
            Err(StorageError::Locked { .. })
        ));

        first.disconnect().await.unwrap();
        assert!(second.connect().await.unwrap());
    }

    #[tokio::test]
    async fn file_corrupted_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, b"{not json").unwrap();

        let backend = FileBackend::open(&path);
        assert!(matches!(
            backend.connect().await,
            Err(StorageError::Corrupted(_))
        ));
    }

    #[tokio::test]
    async fn file_pretty_output() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        let backend = FileBackend::new(FileConfig::new(&path).pretty(true));
        backend.connect().await.unwrap();
        backend.set_config("k", "v").await.unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains('\n'));
        let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(doc["config"]["k"], "v");
    }

    #[tokio::test]
    async fn file_crud() {
        let dir = tempdir().unwrap();
        let (backend, config) = ready(&dir.path().join("store.json")).await;

        assert!(backend.create_entity(&config, item("a", "x")).await.unwrap().is_some());
        assert!(backend.create_entity(&config, item("a", "y")).await.unwrap().is_none());

        let patch = Record::new().with("label", "z");
        assert!(backend.update_entity(&config, "a", &patch).await.unwrap());
        assert!(!backend.update_entity(&config, "b", &patch).await.unwrap());
        assert_eq!(
            backend.get_entity_by_id(&config, "a").await.unwrap(),
            Some(item("a", "z"))
        );

        assert!(backend.delete_entity_by_id("Item", "a").await.unwrap());
        assert!(!backend.delete_entity_by_id("Item", "a").await.unwrap());
        assert!(matches!(
            backend.delete_entity_by_id("Ghost", "a").await,
            Err(StorageError::UnknownEntity { .. })
        ));
    }

    #[tokio::test]
    async fn file_list_keeps_insertion_order() {
        let dir = tempdir().unwrap();
        let (backend, config) = ready(&dir.path().join("store.json")).await;
        for id in ["c", "a", "b"] {
            backend.create_entity(&config, item(id, id)).await.unwrap();
        }

        let asc = backend
            .get_entity_list(&config, &Query::new().order_by(ID_FIELD, Direction::Asc))
            .await
            .unwrap();
        let ids: Vec<_> = asc.iter().map(|r| r.text(ID_FIELD).unwrap()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);

        let counts = backend.collection_counts().unwrap();
        assert_eq!(counts, vec![("item".to_string(), 3)]);
    }

    #[tokio::test]
    async fn file_disconnected_operations_fail() {
        let dir = tempdir().unwrap();
        let backend = FileBackend::open(dir.path().join("store.json"));
        assert!(matches!(
            backend.get_config("k").await,
            Err(StorageError::NotConnected)
        ));
        assert!(!backend.disconnect().await.unwrap());
        assert!(backend.config_entries().is_err());
    }
}
