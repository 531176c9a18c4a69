//! # EntiORM Meta
//!
//! Schema metadata for EntiORM entities.
//!
//! Entities describe themselves explicitly: an [`EntitySchema`] names the
//! entity, its version and the [`ColumnMeta`] of every persisted field. The
//! schema can be kept in the process-global [`registry`], keyed by the
//! entity's Rust type, and records can be checked against it with
//! [`validate_record`].
//!
//! ## Column Invariants
//!
//! - a nullable column must declare its data type
//! - a primary key column cannot be nullable
//! - float, double, blob and boolean columns cannot carry a foreign key
//!
//! ## Example
//!
//! ```
//! use entiorm_meta::{ColumnMeta, DataType, EntitySchema};
//!
//! let schema = EntitySchema::builder("user", 1)
//!     .column("name", ColumnMeta::new(DataType::Text).unique())
//!     .column("age", ColumnMeta::new(DataType::Int).nullable())
//!     .try_build()
//!     .unwrap();
//!
//! assert_eq!(schema.name(), "user");
//! assert!(schema.is_valid());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod column;
mod error;
pub mod registry;
mod schema;
mod validate;

pub use column::{
    check_column_meta, validate_column_meta, ColumnMeta, DataType, ForeignKey, MetaViolation,
};
pub use error::{MetaError, MetaResult};
pub use registry::{
    column_meta, define_column, define_entity, entity_meta, register_schema, schema_of,
    validate_entity,
};
pub use schema::{EntityMeta, EntitySchema, EntitySchemaBuilder, ID_FIELD};
pub use validate::{fits, validate_record, FieldIssue, Shape, ValidationError};
