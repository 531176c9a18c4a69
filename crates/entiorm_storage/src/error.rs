//! Error types for storage operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by storage backends.
///
/// Lookup misses are not errors: they surface as `None`, `false` or an
/// empty list. Everything here is fatal for the current operation and is
/// never retried by the backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A document could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored value could not be decoded.
    #[error("codec error: {0}")]
    Codec(#[from] entiorm_codec::CodecError),

    /// The backend is not connected.
    #[error("backend is not connected")]
    NotConnected,

    /// The entity class has no storage (not registered or not initialized).
    #[error("unknown entity class: {class_name}")]
    UnknownEntity {
        /// Name of the entity class.
        class_name: String,
    },

    /// A record handed to the backend is malformed.
    #[error("invalid record: {message}")]
    InvalidRecord {
        /// Description of the problem.
        message: String,
    },

    /// The stored data is corrupted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// Another process holds the store.
    #[error("store is locked by another process: {}", path.display())]
    Locked {
        /// Path of the lock file.
        path: PathBuf,
    },

    /// A name cannot be used as a SQL identifier.
    #[error("invalid identifier: {ident:?}")]
    InvalidIdentifier {
        /// The rejected name.
        ident: String,
    },

    /// The backend does not implement the operation.
    #[error("operation not supported by this backend: {operation}")]
    Unsupported {
        /// Name of the operation.
        operation: &'static str,
    },

    /// The underlying driver failed.
    #[error("{message}: {source}")]
    Backend {
        /// What the backend was doing.
        message: String,
        /// The driver error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StorageError {
    /// Creates an unknown entity error.
    pub fn unknown_entity(class_name: impl Into<String>) -> Self {
        Self::UnknownEntity {
            class_name: class_name.into(),
        }
    }

    /// Creates an invalid record error.
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Wraps a driver error.
    pub fn backend(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Backend {
            message: message.into(),
            source: Box::new(source),
        }
    }
}
