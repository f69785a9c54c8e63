//! Process-local L1 cache

use crate::key::CacheKey;
use dashmap::DashMap;
use deepwave_core::SourceBundle;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct MemoryEntry {
    bundle: Arc<SourceBundle>,
    created_at: i64,
    last_accessed_at: AtomicI64,
    /// Insertion order, breaking ties between entries touched in the same
    /// millisecond the way the persistent store's rowid does
    seq: u64,
}

/// Outcome of an L1 probe
#[derive(Debug)]
pub(crate) enum MemoryLookup {
    Hit(Arc<SourceBundle>),
    Expired,
    Miss,
}

/// In-memory cache fronting the persistent store.
///
/// Holds at most `capacity` entries; inserting past that drops the
/// least-recently-accessed entry, oldest insertion first on ties.
#[derive(Debug)]
pub(crate) struct MemoryCache {
    entries: DashMap<CacheKey, MemoryEntry>,
    capacity: usize,
    next_seq: AtomicU64,
}

impl MemoryCache {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            next_seq: AtomicU64::new(0),
        }
    }

    pub(crate) fn get(&self, key: &CacheKey, now: i64, ttl_millis: i64) -> MemoryLookup {
        match self.entries.get(key) {
            None => return MemoryLookup::Miss,
            Some(entry) if now - entry.created_at < ttl_millis => {
                entry.last_accessed_at.store(now, Ordering::Relaxed);
                return MemoryLookup::Hit(Arc::clone(&entry.bundle));
            }
            Some(_) => {}
        }
        // Read guard must be dropped before removing from the same shard
        self.entries
            .remove_if(key, |_, e| now - e.created_at >= ttl_millis);
        MemoryLookup::Expired
    }

    /// Insert or overwrite, returning how many entries were evicted for room
    pub(crate) fn insert(
        &self,
        key: CacheKey,
        bundle: Arc<SourceBundle>,
        created_at: i64,
        now: i64,
    ) -> usize {
        self.entries.insert(
            key,
            MemoryEntry {
                bundle,
                created_at,
                last_accessed_at: AtomicI64::new(now),
                seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            },
        );

        let mut evicted = 0;
        while self.entries.len() > self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|e| {
                    let entry = e.value();
                    (entry.last_accessed_at.load(Ordering::Relaxed), entry.seq)
                })
                .map(|e| e.key().clone());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                    evicted += 1;
                }
                None => break,
            }
        }
        evicted
    }

    /// Drop entries past their TTL
    pub(crate) fn purge_expired(&self, now: i64, ttl_millis: i64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| now - e.created_at < ttl_millis);
        before.saturating_sub(self.entries.len())
    }

    /// Drop entries last read before `cutoff`
    pub(crate) fn purge_stale(&self, cutoff: i64) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, e| e.last_accessed_at.load(Ordering::Relaxed) >= cutoff);
        before.saturating_sub(self.entries.len())
    }

    pub(crate) fn remove(&self, key: &CacheKey) {
        self.entries.remove(key);
    }

    pub(crate) fn clear(&self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(summary: &str) -> Arc<SourceBundle> {
        Arc::new(SourceBundle {
            query_summary: Some(summary.to_string()),
            sources: Vec::new(),
        })
    }

    #[test]
    fn test_hit_within_ttl_then_expired() {
        let cache = MemoryCache::new(10);
        let key = CacheKey::derive("q", "v1");
        cache.insert(key.clone(), bundle("a"), 0, 0);

        assert!(matches!(cache.get(&key, 999, 1_000), MemoryLookup::Hit(_)));
        assert!(matches!(cache.get(&key, 1_000, 1_000), MemoryLookup::Expired));
        assert!(matches!(cache.get(&key, 1_000, 1_000), MemoryLookup::Miss));
    }

    #[test]
    fn test_capacity_evicts_least_recently_accessed() {
        let cache = MemoryCache::new(2);
        let a = CacheKey::derive("a", "v1");
        let b = CacheKey::derive("b", "v1");
        let c = CacheKey::derive("c", "v1");

        cache.insert(a.clone(), bundle("a"), 0, 0);
        cache.insert(b.clone(), bundle("b"), 1, 1);
        // Touch `a` so `b` becomes the eviction candidate
        assert!(matches!(cache.get(&a, 2, 10_000), MemoryLookup::Hit(_)));
        let evicted = cache.insert(c.clone(), bundle("c"), 3, 3);

        assert_eq!(evicted, 1);
        assert_eq!(cache.len(), 2);
        assert!(matches!(cache.get(&b, 4, 10_000), MemoryLookup::Miss));
        assert!(matches!(cache.get(&a, 4, 10_000), MemoryLookup::Hit(_)));
    }

    #[test]
    fn test_overwrite_does_not_grow() {
        let cache = MemoryCache::new(5);
        let key = CacheKey::derive("q", "v1");
        cache.insert(key.clone(), bundle("first"), 0, 0);
        cache.insert(key.clone(), bundle("second"), 1, 1);
        assert_eq!(cache.len(), 1);
        match cache.get(&key, 2, 1_000) {
            MemoryLookup::Hit(b) => assert_eq!(b.query_summary.as_deref(), Some("second")),
            other => panic!("expected hit, got {other:?}"),
        }
    }

    #[test]
    fn test_same_millisecond_ties_evict_oldest_insertion() {
        let cache = MemoryCache::new(3);
        let keys: Vec<CacheKey> = (0..5)
            .map(|i| CacheKey::derive(&format!("topic {i}"), "v1"))
            .collect();
        for key in &keys {
            cache.insert(key.clone(), bundle("b"), 7, 7);
        }

        assert_eq!(cache.len(), 3);
        for key in &keys[..2] {
            assert!(matches!(cache.get(key, 8, 10_000), MemoryLookup::Miss));
        }
        for key in &keys[2..] {
            assert!(matches!(cache.get(key, 8, 10_000), MemoryLookup::Hit(_)));
        }
    }

    #[test]
    fn test_purge_stale_uses_last_access() {
        let cache = MemoryCache::new(5);
        let read = CacheKey::derive("read", "v1");
        cache.insert(read.clone(), bundle("r"), 0, 0);
        cache.insert(CacheKey::derive("idle", "v1"), bundle("i"), 0, 0);
        assert!(matches!(cache.get(&read, 600, 10_000), MemoryLookup::Hit(_)));

        assert_eq!(cache.purge_stale(500), 1);
        assert_eq!(cache.len(), 1);
        assert!(matches!(cache.get(&read, 700, 10_000), MemoryLookup::Hit(_)));
    }

    #[test]
    fn test_purge_expired() {
        let cache = MemoryCache::new(5);
        cache.insert(CacheKey::derive("old", "v1"), bundle("o"), 0, 0);
        cache.insert(CacheKey::derive("new", "v1"), bundle("n"), 900, 900);
        assert_eq!(cache.purge_expired(1_000, 500), 1);
        assert_eq!(cache.len(), 1);
    }
}
