//! # EntiORM Storage
//!
//! Storage backend contract and reference implementations for EntiORM.
//!
//! A backend persists [`Record`](entiorm_codec::Record)s per entity class
//! together with a small key/value config store. It knows nothing about
//! caching, migrations or typed entities; those live in `entiorm_core`,
//! which composes a backend behind `Arc<dyn StorageBackend>`.
//!
//! ## Design Principles
//!
//! - Every operation is `async` and returns [`StorageResult`]
//! - Misses are `None`, `false` or an empty list, never errors
//! - Backends must be `Send + Sync` and synchronize internally
//! - Queries mean the same thing on every backend ([`apply_query`] is the
//!   reference evaluation)
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral stores
//! - [`FileBackend`] - One JSON document on disk
//!
//! A PostgreSQL backend lives in the `entiorm_postgres` crate.
//!
//! ## Example
//!
//! ```rust
//! use entiorm_codec::Record;
//! use entiorm_meta::EntitySchema;
//! use entiorm_storage::{EntityConfig, InMemoryBackend, Query, StorageBackend};
//!
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! runtime.block_on(async {
//!     let backend = InMemoryBackend::new();
//!     let config = EntityConfig::new(EntitySchema::builder("user", 1).build());
//!     backend.connect().await.unwrap();
//!     backend.init_entity(&config, &Record::new()).await.unwrap();
//!
//!     let bob = Record::new().with("e_id", "u1").with("name", "Bob");
//!     backend.create_entity(&config, bob).await.unwrap();
//!
//!     let rows = backend
//!         .get_entity_list(&config, &Query::new().where_eq("name", "Bob"))
//!         .await
//!         .unwrap();
//!     assert_eq!(rows.len(), 1);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;
mod query;

pub use backend::{
    record_id, without_identity, ConfigEntry, EntityConfig, RawQuery, ScriptOutput,
    StorageBackend, DB_VERSION_KEY, INSTALL_UID_KEY,
};
pub use error::{StorageError, StorageResult};
pub use file::{FileBackend, FileConfig};
pub use memory::InMemoryBackend;
pub use query::{
    apply_query, find_first, values_equal, Direction, Order, Predicate, PredicateMode, Query,
    SearchTerm,
};
