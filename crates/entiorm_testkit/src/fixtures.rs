//! Test fixtures and store helpers.
//!
//! Provides a sample entity and convenience constructors for connected
//! backends and databases.

use entiorm_codec::Record;
use entiorm_core::{CoreResult, Database, DbConfig, Entity, EntityId};
use entiorm_meta::{registry, ColumnMeta, DataType, EntitySchema, ID_FIELD};
use entiorm_storage::{EntityConfig, FileBackend, InMemoryBackend, StorageBackend};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Sample entity used across the suite.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Person {
    id: EntityId,
    /// Display name.
    pub name: String,
    /// Age in years.
    pub age: i64,
    /// Contact address.
    pub email: String,
}

impl Person {
    /// Creates a person with a fresh identity.
    pub fn new(name: impl Into<String>, age: i64) -> Self {
        let name = name.into();
        Self {
            id: EntityId::new(),
            email: format!("{}@example.com", name.to_lowercase()),
            name,
            age,
        }
    }
}

impl Entity for Person {
    fn schema() -> EntitySchema {
        registry::ensure_schema::<Self>(|| {
            EntitySchema::builder("Person", 1)
                .column("name", ColumnMeta::new(DataType::Text))
                .column("age", ColumnMeta::new(DataType::Int))
                .column("email", ColumnMeta::new(DataType::Text).nullable())
                .build()
        })
    }

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn to_record(&self) -> Record {
        Record::new()
            .with("name", self.name.as_str())
            .with("age", self.age)
            .with("email", self.email.as_str())
    }

    fn from_record(id: EntityId, record: &Record) -> CoreResult<Self> {
        Ok(Self {
            id,
            name: record.text("name")?,
            age: record.integer("age")?,
            email: record.opt_text("email")?.unwrap_or_default(),
        })
    }
}

/// Backend registration of [`Person`].
pub fn person_config() -> EntityConfig {
    EntityConfig::new(Person::schema())
}

/// A complete stored `Person` record with the given identity.
pub fn person_record(id: &str, name: &str, age: i64) -> Record {
    Record::new()
        .with(ID_FIELD, id)
        .with("name", name)
        .with("age", age)
        .with("email", format!("{}@example.com", name.to_lowercase()))
}

/// Storage config of a `Reading` class with one `Double` and one `Float`
/// column, for checks on numeric fields.
pub fn reading_config() -> EntityConfig {
    EntityConfig::new(
        EntitySchema::builder("Reading", 1)
            .column("score", ColumnMeta::new(DataType::Double))
            .column("ratio", ColumnMeta::new(DataType::Float).nullable())
            .build(),
    )
}

/// Registers [`Person`], connects and initializes its storage.
pub async fn prepare<B: StorageBackend + ?Sized>(backend: &B) -> EntityConfig {
    let config = person_config();
    backend.register_entity(config.clone());
    backend.connect().await.expect("Failed to connect");
    backend
        .init_entity(&config, &Record::new())
        .await
        .expect("Failed to initialize entity storage");
    config
}

/// A file store in a temporary directory, removed on drop.
pub struct TempStore {
    dir: TempDir,
}

impl TempStore {
    /// Creates an empty temporary directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Path of the store document.
    pub fn path(&self) -> PathBuf {
        self.dir.path().join("store.json")
    }

    /// A new, unconnected backend over the store document.
    pub fn backend(&self) -> FileBackend {
        FileBackend::open(self.path())
    }
}

impl Default for TempStore {
    fn default() -> Self {
        Self::new()
    }
}

/// A database over a fresh in-memory backend.
pub fn memory_database(config: DbConfig) -> Database {
    Database::new(Arc::new(InMemoryBackend::new()), config)
}
