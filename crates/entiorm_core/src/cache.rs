//! Read-through cache collaborator.
//!
//! Wrappers cache stored records under `"{prefix}{class}:{id}"`. Reads fill
//! the cache on a miss, creates populate it, and updates or deletes drop
//! the key before they return.

use crate::error::CoreResult;
use async_trait::async_trait;
use entiorm_codec::Record;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// A key/value cache of stored records.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Reads a cached record.
    async fn get(&self, key: &str) -> CoreResult<Option<Record>>;

    /// Stores a record, replacing any previous value.
    async fn set(&self, key: &str, value: Record) -> CoreResult<()>;

    /// Drops a key. Dropping a missing key is not an error.
    async fn delete(&self, key: &str) -> CoreResult<()>;

    /// Returns true if the key is cached.
    async fn exist(&self, key: &str) -> CoreResult<bool>;
}

/// Hit and miss counters of an [`InMemoryCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads answered from the cache.
    pub hits: u64,
    /// Reads that found nothing.
    pub misses: u64,
}

/// Process-local [`Cache`].
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, Record>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl InMemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drops every key.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Current hit and miss counts.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, key: &str) -> CoreResult<Option<Record>> {
        let found = self.entries.read().get(key).cloned();
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(found)
    }

    async fn set(&self, key: &str, value: Record) -> CoreResult<()> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CoreResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn exist(&self, key: &str) -> CoreResult<bool> {
        Ok(self.entries.read().contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_delete() {
        let cache = InMemoryCache::new();
        let record = Record::new().with("name", "Bob");

        assert!(cache.get("user:1").await.unwrap().is_none());
        cache.set("user:1", record.clone()).await.unwrap();
        assert!(cache.exist("user:1").await.unwrap());
        assert_eq!(cache.get("user:1").await.unwrap(), Some(record));

        cache.delete("user:1").await.unwrap();
        cache.delete("user:1").await.unwrap();
        assert!(!cache.exist("user:1").await.unwrap());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn stats_count_reads() {
        let cache = InMemoryCache::new();
        cache.set("k", Record::new()).await.unwrap();
        cache.get("k").await.unwrap();
        cache.get("k").await.unwrap();
        cache.get("other").await.unwrap();
        assert_eq!(cache.stats(), CacheStats { hits: 2, misses: 1 });
    }
}
