//! Inspect command implementation.

use super::{open_store, CliError};
use entiorm_storage::StorageBackend;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Size of the store document in bytes.
    pub size: u64,
    /// Record count per collection.
    pub collections: BTreeMap<String, usize>,
    /// Config entries.
    pub config: BTreeMap<String, String>,
}

impl InspectResult {
    /// Total records across collections.
    pub fn record_count(&self) -> usize {
        self.collections.values().sum()
    }
}

impl fmt::Display for InspectResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "EntiORM Store Inspection")?;
        writeln!(f, "========================")?;
        writeln!(f)?;
        writeln!(f, "Path: {}", self.path)?;
        writeln!(f, "Size: {}", format_size(self.size))?;
        writeln!(f)?;
        writeln!(f, "Collections ({} records):", self.record_count())?;
        if self.collections.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for (name, count) in &self.collections {
            writeln!(f, "  {name:<24} {count}")?;
        }
        writeln!(f)?;
        writeln!(f, "Config:")?;
        for (key, value) in &self.config {
            writeln!(f, "  {key} = {value}")?;
        }
        Ok(())
    }
}

/// Runs the inspect command.
pub async fn run(path: &Path) -> Result<InspectResult, CliError> {
    let store = open_store(path).await?;
    let counts = store.collection_counts();
    let entries = store.config_entries();
    store.disconnect().await?;

    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    Ok(InspectResult {
        path: path.display().to_string(),
        size,
        collections: counts?.into_iter().collect(),
        config: entries?.into_iter().map(|e| (e.key, e.value)).collect(),
    })
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entiorm_core::{Database, DbConfig};
    use entiorm_storage::FileBackend;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn reports_config_of_started_database() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let db = Database::new(
            Arc::new(FileBackend::open(&path)),
            DbConfig::default().target_version("5"),
        );
        db.start().await.unwrap();
        db.stop().await.unwrap();

        let report = run(&path).await.unwrap();
        assert_eq!(report.config.get("dbversion").map(String::as_str), Some("5"));
        assert!(report.config.contains_key("install_uid"));
        assert_eq!(report.record_count(), 0);
        assert!(report.size > 0);

        let text = report.to_string();
        assert!(text.contains("dbversion = 5"));
    }

    #[tokio::test]
    async fn locked_store_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let holder = FileBackend::open(&path);
        holder.connect().await.unwrap();

        let err = run(&path).await.unwrap_err();
        assert!(matches!(err, CliError::Storage(_)));
    }

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
    }
}
