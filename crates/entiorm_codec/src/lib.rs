//! # EntiORM Codec
//!
//! Dynamic values and records for EntiORM.
//!
//! This crate provides the representation every storage backend works in:
//! - [`Value`]: one field value (text, numbers, bytes, JSON, timestamps)
//! - [`Record`]: a field-keyed map of values, used both for whole entities
//!   and for partial updates
//! - a JSON document codec used by document backends and JSON columns
//!
//! ## Usage
//!
//! ```
//! use entiorm_codec::{record_from_json, record_to_json, Record, ValueKind};
//!
//! let record = Record::new().with("name", "Alice").with("age", 30i64);
//! let object = record_to_json(&record);
//!
//! let decoded = record_from_json(&object, |_| None).unwrap();
//! assert_eq!(decoded.text("name").unwrap(), "Alice");
//! assert_eq!(decoded.integer("age").unwrap(), 30);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod json;
mod record;
mod value;

pub use error::{CodecError, CodecResult};
pub use json::{from_json, infer_json, record_from_json, record_to_json, to_json};
pub use record::Record;
pub use value::{Value, ValueKind};
