//! # EntiORM Core
//!
//! Typed entity access over pluggable storage.
//!
//! This crate provides:
//! - The [`Entity`] trait and string [`EntityId`]s
//! - [`EntityWrapper`], the typed CRUD and query surface of one class
//! - A read-through [`Cache`] collaborator with an [`InMemoryCache`]
//! - The [`MigrationChain`] that moves stores between schema versions
//! - [`Database`], which composes a backend with all of the above and runs
//!   start-up
//!
//! ## Start-up
//!
//! `Database::start` connects the backend. A fresh store is stamped with
//! the target version (`dbversion`) and gets storage for every registered
//! class; an existing store behind the target is migrated step by step.
//!
//! ## Example
//!
//! ```rust
//! use entiorm_codec::Record;
//! use entiorm_core::{CoreResult, Database, DbConfig, Entity, EntityId, EntityOptions};
//! use entiorm_meta::{registry, ColumnMeta, DataType, EntitySchema};
//! use entiorm_storage::{InMemoryBackend, Query};
//! use std::sync::Arc;
//!
//! #[derive(Debug, Clone, Default)]
//! struct Person {
//!     id: EntityId,
//!     name: String,
//! }
//!
//! impl Entity for Person {
//!     fn schema() -> EntitySchema {
//!         registry::ensure_schema::<Self>(|| {
//!             EntitySchema::builder("Person", 1)
//!                 .column("name", ColumnMeta::new(DataType::Text))
//!                 .build()
//!         })
//!     }
//!     fn id(&self) -> &EntityId {
//!         &self.id
//!     }
//!     fn to_record(&self) -> Record {
//!         Record::new().with("name", self.name.clone())
//!     }
//!     fn from_record(id: EntityId, record: &Record) -> CoreResult<Self> {
//!         Ok(Self { id, name: record.text("name")? })
//!     }
//! }
//!
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! runtime.block_on(async {
//!     let db = Database::new(Arc::new(InMemoryBackend::new()), DbConfig::default());
//!     let people = db.register_entity::<Person>(EntityOptions::default()).unwrap();
//!     db.start().await.unwrap();
//!
//!     let ada = Person { id: EntityId::new(), name: "Ada".into() };
//!     people.create_object(&ada).await.unwrap();
//!
//!     let found = people
//!         .get_obj_list(Some(Query::new().where_eq("name", "Ada")))
//!         .await
//!         .unwrap();
//!     assert_eq!(found.len(), 1);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod config;
mod database;
mod entity;
mod error;
pub mod migration;
mod wrapper;

#[cfg(test)]
mod fixtures;

pub use cache::{Cache, CacheStats, InMemoryCache};
pub use config::{DbConfig, EntityOptions};
pub use database::{Database, INITIAL_VERSION};
pub use entity::{entity_record, Entity, EntityId};
pub use error::{CoreError, CoreResult};
pub use migration::{MigrationChain, MigrationInfo, MigrationRunResult, MigrationStep};
pub use wrapper::EntityWrapper;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
