//! Error types for metadata operations.

use crate::column::MetaViolation;
use crate::validate::ValidationError;
use thiserror::Error;

/// Result type for metadata operations.
pub type MetaResult<T> = Result<T, MetaError>;

/// Errors raised while building or checking entity metadata.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetaError {
    /// A column carries an invalid combination of properties.
    #[error("invalid column {entity}.{field}: {violation}")]
    InvalidColumn {
        /// Entity name.
        entity: String,
        /// Field key.
        field: String,
        /// The broken rule.
        violation: MetaViolation,
    },

    /// The same field key was declared twice.
    #[error("duplicate column {entity}.{field}")]
    DuplicateColumn {
        /// Entity name.
        entity: String,
        /// Field key.
        field: String,
    },

    /// A record does not match its entity metadata.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}
