//! Time-to-live cache for remote reads.
//!
//! Entries are keyed by strings built in [`crate::keys`] and expire a fixed
//! duration after they were stored. Lookups never perform I/O: callers check
//! the cache, fetch on a miss and store the result themselves.
//!
//! # Example
//!
//! ```ignore
//! use college_cache::{keys, ReadThroughCache};
//!
//! let cache: ReadThroughCache<bool> = ReadThroughCache::new();
//! if cache.get(&keys::is_paused()).is_none() {
//!     cache.set(keys::is_paused(), fetch_paused().await?);
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::clock::{Clock, SystemClock};
use crate::metrics::CacheMetrics;

/// How long an entry stays fresh unless the cache was built with another TTL.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    stored_at: Instant,
}

/// In-memory TTL cache.
///
/// Thread-safe via internal RwLock. Share it with `Arc`.
pub struct ReadThroughCache<V> {
    entries: RwLock<HashMap<String, Entry<V>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    metrics: CacheMetrics,
}

impl<V: Clone> Default for ReadThroughCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> ReadThroughCache<V> {
    /// Create a cache with [`DEFAULT_TTL`] and the system clock.
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            clock,
            metrics: CacheMetrics::default(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    fn is_fresh(&self, entry: &Entry<V>, now: Instant) -> bool {
        now.saturating_duration_since(entry.stored_at) < self.ttl
    }

    // ==================== Lookup ====================

    /// Return the value for `key` if present and younger than the TTL.
    ///
    /// A stale entry is dropped and reported as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if self.is_fresh(entry, now) => {
                    self.metrics.record_hit();
                    return Some(entry.value.clone());
                }
                None => {
                    self.metrics.record_miss();
                    return None;
                }
                Some(_) => {}
            }
        }

        // Expired: re-check under the write lock, a concurrent set may have
        // refreshed it.
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(entry) if self.is_fresh(entry, now) => {
                self.metrics.record_hit();
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                self.metrics.record_expiration();
                self.metrics.record_miss();
                tracing::debug!(key, "cache entry expired");
                None
            }
            None => {
                self.metrics.record_miss();
                None
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.entries
            .read()
            .get(key)
            .map(|entry| self.is_fresh(entry, now))
            .unwrap_or(false)
    }

    // ==================== Mutation ====================

    /// Store `value` under `key`, replacing any prior entry and restarting its TTL.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let entry = Entry {
            value,
            stored_at: self.clock.now(),
        };
        self.entries.write().insert(key.into(), entry);
        self.metrics.record_insert();
    }

    /// Remove `key`. Returns whether an entry was present.
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self.entries.write().remove(key).is_some();
        if removed {
            self.metrics.record_invalidations(1);
        }
        removed
    }

    /// Remove every key starting with `prefix`. Returns how many were removed.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before - entries.len();
        if removed > 0 {
            self.metrics.record_invalidations(removed as u64);
            tracing::debug!(prefix, removed, "invalidated cache entries");
        }
        removed
    }

    /// Drop all expired entries. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| now.saturating_duration_since(entry.stored_at) < self.ttl);
        let purged = before - entries.len();
        for _ in 0..purged {
            self.metrics.record_expiration();
        }
        purged
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    // ==================== Statistics ====================

    /// Number of stored entries, including ones that have expired but not
    /// yet been dropped.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
