//! Bounded result cache
//!
//! Completed documents keyed by content fingerprint, bounded by both a byte
//! budget and an entry count. Inserting past the budget evicts the
//! least-recently-accessed entries until the cache fits again; reads treat
//! TTL-expired entries as misses and evict them lazily.

use crate::traits::Clock;
use chrono::{DateTime, Utc};
use pageflow_core::ProcessedDocument;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Cache bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Byte budget across all entries
    pub max_size_bytes: usize,

    /// Entry-count budget
    pub max_entries: usize,

    /// Entries older than this are treated as misses
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: 200 * 1024 * 1024,
            max_entries: 100,
            ttl: Duration::from_secs(30 * 60),
        }
    }
}

/// One cached result with access bookkeeping.
#[derive(Debug, Clone)]
struct CacheEntry {
    document: Arc<ProcessedDocument>,
    size_bytes: usize,
    created_at: DateTime<Utc>,
    last_accessed: DateTime<Utc>,
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Live entries
    pub entries: usize,

    /// Bytes held across all entries
    pub total_size_bytes: usize,

    /// Configured byte budget
    pub max_size_bytes: usize,
}

/// Bounded, TTL-evicted store of completed documents.
///
/// Not internally synchronized; the orchestrator wraps it in a mutex and
/// holds the lock only for these short map operations.
pub struct ProcessingCache {
    entries: HashMap<String, CacheEntry>,
    total_size_bytes: usize,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
}

impl ProcessingCache {
    /// Create a cache with the given bounds.
    #[must_use]
    pub fn new(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            total_size_bytes: 0,
            config,
            clock,
        }
    }

    /// Look up a document, refreshing its access time.
    ///
    /// A TTL-expired entry is removed and reported as a miss.
    pub fn get(&mut self, key: &str) -> Option<Arc<ProcessedDocument>> {
        let now = self.clock.now();
        let expired = self
            .entries
            .get(key)
            .is_some_and(|entry| self.is_expired(entry, now));
        if expired {
            debug!(key, "evicting expired cache entry");
            self.remove(key);
            return None;
        }

        let entry = self.entries.get_mut(key)?;
        entry.last_accessed = now;
        Some(Arc::clone(&entry.document))
    }

    /// Insert a document, evicting least-recently-accessed entries until the
    /// cache is back within budget.
    pub fn set(&mut self, key: String, document: Arc<ProcessedDocument>) {
        let now = self.clock.now();
        let size_bytes = document.estimated_size_bytes();

        if let Some(previous) = self.entries.remove(&key) {
            self.total_size_bytes -= previous.size_bytes;
        }
        self.total_size_bytes += size_bytes;
        self.entries.insert(
            key,
            CacheEntry {
                document,
                size_bytes,
                created_at: now,
                last_accessed: now,
            },
        );

        self.evict_to_budget();
    }

    /// Remove one entry.
    pub fn delete(&mut self, key: &str) -> bool {
        self.remove(key).is_some()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_size_bytes = 0;
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            total_size_bytes: self.total_size_bytes,
            max_size_bytes: self.config.max_size_bytes,
        }
    }

    fn is_expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(self.config.ttl) {
            Ok(ttl) => now.signed_duration_since(entry.created_at) > ttl,
            Err(_) => false,
        }
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.total_size_bytes -= entry.size_bytes;
        Some(entry)
    }

    fn evict_to_budget(&mut self) {
        while self.total_size_bytes > self.config.max_size_bytes
            || self.entries.len() > self.config.max_entries
        {
            let Some(lru_key) = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_accessed)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            debug!(key = %lru_key, "evicting least-recently-accessed cache entry");
            self.remove(&lru_key);
        }
    }
}
