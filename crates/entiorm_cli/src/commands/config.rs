//! Config command implementation.

use super::{open_store, CliError};
use entiorm_storage::{ConfigEntry, StorageBackend};
use std::path::Path;

/// Reads one config value.
pub async fn get(path: &Path, key: &str) -> Result<String, CliError> {
    let store = open_store(path).await?;
    let entry = store.get_config(key).await;
    store.disconnect().await?;
    entry?
        .map(|e| e.value)
        .ok_or_else(|| CliError::MissingKey(key.to_string()))
}

/// Writes one config value.
pub async fn set(path: &Path, key: &str, value: &str) -> Result<(), CliError> {
    let store = open_store(path).await?;
    let written = store.set_config(key, value).await;
    store.disconnect().await?;
    written?;
    tracing::info!(key, value, "config entry written");
    Ok(())
}

/// Lists every config entry in key order.
pub async fn list(path: &Path) -> Result<Vec<ConfigEntry>, CliError> {
    let store = open_store(path).await?;
    let entries = store.config_entries();
    store.disconnect().await?;
    Ok(entries?)
}
