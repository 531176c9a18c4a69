//! # EntiORM Postgres
//!
//! PostgreSQL storage backend for EntiORM, built on `sqlx`.
//!
//! ## Layout
//!
//! One schema per store. It holds a `config` key/value table and one table
//! per registered entity class:
//!
//! ```text
//! <schema>.config   (c_key TEXT PRIMARY KEY, c_value TEXT)
//! <schema>.<table>  (e_seq BIGSERIAL, e_id TEXT PRIMARY KEY, <columns>...)
//! ```
//!
//! The schema is created on the first [`connect`](entiorm_storage::StorageBackend::connect)
//! that does not find it in `information_schema.schemata`; that connect
//! reports the store as new.
//!
//! ## Safety of generated SQL
//!
//! Values are always bound as parameters. Schema, table and column names
//! must match `[A-Za-z_][A-Za-z0-9_]*` and are double-quoted.
//!
//! ## Example
//!
//! ```no_run
//! use entiorm_postgres::{PostgresBackend, PostgresConfig};
//! use entiorm_storage::StorageBackend;
//!
//! # async fn demo() -> entiorm_storage::StorageResult<()> {
//! let config = PostgresConfig::from_url("postgres://localhost/app").schema("app");
//! let backend = PostgresBackend::new(config);
//! backend.connect().await?;
//! backend.set_config("dbversion", "1").await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod config;
mod row;
pub mod sql;

pub use backend::PostgresBackend;
pub use config::{PostgresConfig, DATABASE_URL_VAR};
