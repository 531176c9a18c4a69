//! Error types for EntiORM core.

use entiorm_codec::CodecError;
use entiorm_meta::{MetaError, ValidationError};
use entiorm_storage::StorageError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in EntiORM core operations.
///
/// Lookup misses (unknown id, unregistered wrapper, no migration step for a
/// version) are `None` or `false`, never errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A stored record could not be turned into an entity.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A record does not match its entity metadata.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Entity metadata is malformed.
    #[error("schema error: {0}")]
    Schema(#[from] MetaError),

    /// A migration step failed; earlier steps stay applied.
    #[error("migration {source_version} -> {target_version} failed: {reason}")]
    Migration {
        /// Version the step migrates from.
        source_version: String,
        /// Version the step migrates to.
        target_version: String,
        /// What went wrong.
        reason: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a migration error.
    pub fn migration(
        source_version: impl Into<String>,
        target_version: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Migration {
            source_version: source_version.into(),
            target_version: target_version.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migration_message_names_both_versions() {
        let err = CoreError::migration("1", "2", "step reported failure");
        assert_eq!(err.to_string(), "migration 1 -> 2 failed: step reported failure");
    }

    #[test]
    fn storage_errors_convert() {
        let err: CoreError = StorageError::NotConnected.into();
        assert!(matches!(err, CoreError::Storage(StorageError::NotConnected)));
    }
}
