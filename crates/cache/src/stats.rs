//! Cache counters
//!
//! The manager owns a [`CacheMetrics`] and bumps it lock-free; callers read a
//! point-in-time [`CacheStats`] snapshot.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub(crate) struct CacheMetrics {
    hits: AtomicU64,
    memory_hits: AtomicU64,
    misses: AtomicU64,
    bypasses: AtomicU64,
    writes: AtomicU64,
    skipped_writes: AtomicU64,
    expired_evictions: AtomicU64,
    stale_evictions: AtomicU64,
    capacity_evictions: AtomicU64,
    store_errors: AtomicU64,
}

impl CacheMetrics {
    pub(crate) fn record_hit(&self, from_memory: bool) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        if from_memory {
            self.memory_hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_bypass(&self) {
        self.bypasses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped_write(&self) {
        self.skipped_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_store_error(&self) {
        self.store_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_evictions(&self, report: &EvictionReport) {
        self.expired_evictions
            .fetch_add(report.expired, Ordering::Relaxed);
        self.stale_evictions.fetch_add(report.stale, Ordering::Relaxed);
        self.capacity_evictions
            .fetch_add(report.capacity, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, memory_entries: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            bypasses: self.bypasses.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            skipped_writes: self.skipped_writes.load(Ordering::Relaxed),
            expired_evictions: self.expired_evictions.load(Ordering::Relaxed),
            stale_evictions: self.stale_evictions.load(Ordering::Relaxed),
            capacity_evictions: self.capacity_evictions.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
            memory_entries,
        }
    }
}

/// Point-in-time cache counters for this process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups answered from either layer
    pub hits: u64,
    /// Subset of `hits` answered by the in-memory layer
    pub memory_hits: u64,
    pub misses: u64,
    /// Time-sensitive lookups that skipped both layers
    pub bypasses: u64,
    pub writes: u64,
    /// Stores refused (time-sensitive query or cache disabled)
    pub skipped_writes: u64,
    pub expired_evictions: u64,
    pub stale_evictions: u64,
    pub capacity_evictions: u64,
    /// Persistent store failures that degraded to misses
    pub store_errors: u64,
    pub memory_entries: usize,
}

impl CacheStats {
    pub fn evictions(&self) -> u64 {
        self.expired_evictions + self.stale_evictions + self.capacity_evictions
    }

    /// Fraction of cacheable lookups that hit; bypasses are excluded
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Entries removed by one eviction pass, by reason
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionReport {
    pub expired: u64,
    pub stale: u64,
    pub capacity: u64,
}

impl EvictionReport {
    pub fn total(&self) -> u64 {
        self.expired + self.stale + self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate_excludes_bypasses() {
        let metrics = CacheMetrics::default();
        metrics.record_hit(true);
        metrics.record_hit(false);
        metrics.record_miss();
        metrics.record_bypass();
        metrics.record_bypass();

        let stats = metrics.snapshot(3);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.memory_hits, 1);
        assert_eq!(stats.bypasses, 2);
        assert_eq!(stats.memory_entries, 3);
        assert!((stats.hit_rate() - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_hit_rate_empty() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_eviction_totals() {
        let metrics = CacheMetrics::default();
        metrics.record_evictions(&EvictionReport {
            expired: 2,
            stale: 1,
            capacity: 4,
        });
        let stats = metrics.snapshot(0);
        assert_eq!(stats.evictions(), 7);
    }
}
