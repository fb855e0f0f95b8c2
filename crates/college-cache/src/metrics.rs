//! Counters for cache traffic.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Cache operation metrics (thread-safe counters).
///
/// Clones share the same counters.
#[derive(Debug, Clone, Default)]
pub struct CacheMetrics {
    /// Lookups answered from a fresh entry
    pub hits: Arc<AtomicU64>,
    /// Lookups with no usable entry (absent or expired)
    pub misses: Arc<AtomicU64>,
    /// Entries found stale and dropped
    pub expirations: Arc<AtomicU64>,
    pub inserts: Arc<AtomicU64>,
    /// Entries removed by `invalidate`/`invalidate_prefix`
    pub invalidations: Arc<AtomicU64>,
}

impl CacheMetrics {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidations(&self, n: u64) {
        self.invalidations.fetch_add(n, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.expirations.store(0, Ordering::Relaxed);
        self.inserts.store(0, Ordering::Relaxed);
        self.invalidations.store(0, Ordering::Relaxed);
    }
}

/// Snapshot of metrics (for reporting).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub expirations: u64,
    pub inserts: u64,
    pub invalidations: u64,
}

impl MetricsSnapshot {
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Fraction of lookups served from cache.
    pub fn hit_rate(&self) -> f64 {
        let total = self.lookups();
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }

    /// Format a human-readable report.
    pub fn format_report(&self) -> String {
        [
            "Read Cache".to_string(),
            "=".repeat(30),
            format!("  Hits:          {}", self.hits),
            format!("  Misses:        {}", self.misses),
            format!("  Expired:       {}", self.expirations),
            format!("  Inserts:       {}", self.inserts),
            format!("  Invalidated:   {}", self.invalidations),
            format!("  Hit Rate:      {:.1}%", self.hit_rate() * 100.0),
        ]
        .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_counters() {
        let metrics = CacheMetrics::default();
        let other = metrics.clone();
        other.record_hit();
        other.record_hit();
        metrics.record_miss();

        let snap = metrics.snapshot();
        assert_eq!(snap.hits, 2);
        assert_eq!(snap.misses, 1);
        assert!((snap.hit_rate() - 2.0 / 3.0).abs() < 1e-9);

        metrics.reset();
        assert_eq!(other.snapshot().lookups(), 0);
        assert_eq!(other.snapshot().hit_rate(), 0.0);
    }

    #[test]
    fn test_report_mentions_hit_rate() {
        let metrics = CacheMetrics::default();
        metrics.record_hit();
        assert!(metrics.snapshot().format_report().contains("100.0%"));
    }
}
