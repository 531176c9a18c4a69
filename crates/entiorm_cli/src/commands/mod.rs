//! CLI command implementations.

pub mod config;
pub mod inspect;

use entiorm_storage::{FileBackend, FileConfig, StorageBackend, StorageError};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// No store document at the given path.
    #[error("no store found at {}", .0.display())]
    NoStore(PathBuf),

    /// The requested config key is not set.
    #[error("config key not set: {0}")]
    MissingKey(String),

    /// The store could not be read or written.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Opens an existing store. Never creates one.
pub(crate) async fn open_store(path: &Path) -> Result<FileBackend, CliError> {
    if !path.is_file() {
        return Err(CliError::NoStore(path.to_path_buf()));
    }
    let backend = FileBackend::new(FileConfig::new(path).create_if_missing(false));
    backend.connect().await?;
    Ok(backend)
}
