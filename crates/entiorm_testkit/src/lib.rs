//! # EntiORM Testkit
//!
//! Test utilities for EntiORM.
//!
//! This crate provides:
//! - Fixtures: a sample [`Person`] entity and store helpers
//! - A backend [`conformance`] suite shared by every storage backend
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use entiorm_testkit::{conformance, TempStore};
//!
//! let store = TempStore::new();
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! runtime.block_on(conformance::check_find(&store.backend()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod conformance;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::conformance::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
