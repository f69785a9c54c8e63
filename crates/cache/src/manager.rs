//! Two-level query cache: in-memory L1 fronting a persistent L2 store

use crate::clock::{secs_to_millis, Clock, SystemClock};
use crate::error::Result;
use crate::freshness::TimeSensitivity;
use crate::key::CacheKey;
use crate::memory::{MemoryCache, MemoryLookup};
use crate::stats::{CacheMetrics, CacheStats, EvictionReport};
use crate::store::{CacheRecord, CacheStore, SqliteCacheStore, StoreSnapshot, CURRENT_SCHEMA_VERSION};
use chrono::Datelike;
use deepwave_core::{CacheConfig, SourceBundle};
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Which layer answered a hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLayer {
    Memory,
    Persistent,
}

/// Result of [`CacheManager::lookup`]
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit {
        bundle: SourceBundle,
        layer: CacheLayer,
    },
    Miss,
    /// The query is time-sensitive; neither layer was consulted
    Bypassed,
}

impl CacheLookup {
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit { .. })
    }

    pub fn into_bundle(self) -> Option<SourceBundle> {
        match self {
            Self::Hit { bundle, .. } => Some(bundle),
            Self::Miss | Self::Bypassed => None,
        }
    }
}

/// Counters plus a view of the persistent layer
#[derive(Debug, Clone, PartialEq)]
pub struct CacheReport {
    pub stats: CacheStats,
    pub store: Option<StoreSnapshot>,
    pub path: Option<PathBuf>,
}

/// Unifies the memory and persistent layers.
///
/// Owns eviction policy, the time-sensitivity bypass and hit/miss statistics.
/// Persistent store failures never surface to callers: they are logged,
/// counted and answered as misses. Writes to the persistent store are
/// serialized through a single lock.
#[derive(Debug)]
pub struct CacheManager {
    enabled: bool,
    ttl_seconds: u64,
    max_entries: usize,
    stale_after_seconds: u64,
    cleanup_interval_seconds: u64,
    version_salt: String,
    memory: MemoryCache,
    store: Option<Arc<dyn CacheStore>>,
    path: Option<PathBuf>,
    freshness: TimeSensitivity,
    clock: Arc<dyn Clock>,
    metrics: CacheMetrics,
    write_lock: Mutex<()>,
    last_cleanup: AtomicI64,
}

impl CacheManager {
    /// Build a manager over an explicit store and clock.
    ///
    /// `store: None` runs memory-only. No startup eviction is performed; call
    /// [`CacheManager::evict`] when ready.
    pub fn with_store(
        config: &CacheConfig,
        store: Option<Arc<dyn CacheStore>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let now = clock.now_millis();
        Ok(Self {
            enabled: config.enabled,
            ttl_seconds: config.ttl_seconds,
            max_entries: config.max_entries,
            stale_after_seconds: config.stale_after_seconds,
            cleanup_interval_seconds: config.cleanup_interval_seconds,
            version_salt: config.version_salt.clone(),
            memory: MemoryCache::new(config.max_entries),
            store,
            path: None,
            freshness: TimeSensitivity::new(config.time_sensitive_keywords.as_slice())?,
            clock,
            metrics: CacheMetrics::default(),
            write_lock: Mutex::new(()),
            last_cleanup: AtomicI64::new(now),
        })
    }

    /// Open the persistent store named by `config` and run startup eviction.
    ///
    /// If the store cannot be opened (corrupt file, permissions, lock
    /// contention) the failure is logged and the manager runs memory-only.
    pub async fn open(config: &CacheConfig) -> Result<Self> {
        if !config.enabled {
            info!("Query cache disabled by configuration");
            return Self::with_store(config, None, Arc::new(SystemClock));
        }

        let (store, path) = match config.resolved_path() {
            Ok(path) => match SqliteCacheStore::open(&path, config.ttl_seconds).await {
                Ok(store) => (Some(Arc::new(store) as Arc<dyn CacheStore>), Some(path)),
                Err(e) => {
                    error!(
                        "Cache store at {} is unusable, continuing with memory cache only: {e}",
                        path.display()
                    );
                    (None, None)
                }
            },
            Err(e) => {
                error!("Cannot resolve cache path, continuing with memory cache only: {e}");
                (None, None)
            }
        };

        let mut manager = Self::with_store(config, store, Arc::new(SystemClock))?;
        manager.path = path;
        manager.evict().await;
        Ok(manager)
    }

    /// A manager over a private in-memory SQLite store, for tests and one-off runs
    pub async fn in_memory(config: &CacheConfig) -> Result<Self> {
        Self::in_memory_with_clock(config, Arc::new(SystemClock)).await
    }

    pub async fn in_memory_with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let store = SqliteCacheStore::in_memory(config.ttl_seconds).await?;
        Self::with_store(config, Some(Arc::new(store)), clock)
    }

    fn ttl_millis(&self) -> i64 {
        secs_to_millis(self.ttl_seconds)
    }

    fn current_year(&self, now: i64) -> i32 {
        chrono::DateTime::from_timestamp_millis(now)
            .map(|t| t.year())
            .unwrap_or(1970)
    }

    /// Whether `query` must always bypass the cache
    pub fn is_time_sensitive(&self, query: &str) -> bool {
        let now = self.clock.now_millis();
        self.freshness.is_time_sensitive(query, self.current_year(now))
    }

    /// Look `query` up in L1, then L2, promoting L2 hits into L1.
    pub async fn lookup(&self, query: &str) -> CacheLookup {
        if !self.enabled {
            return CacheLookup::Miss;
        }

        let now = self.clock.now_millis();
        if self.freshness.is_time_sensitive(query, self.current_year(now)) {
            debug!("Cache bypass for time-sensitive query: {query}");
            self.metrics.record_bypass();
            return CacheLookup::Bypassed;
        }

        let key = CacheKey::derive(query, &self.version_salt);

        if let MemoryLookup::Hit(bundle) = self.memory.get(&key, now, self.ttl_millis()) {
            debug!("Memory cache hit for query: {query}");
            self.touch_persistent(&key, now).await;
            self.metrics.record_hit(true);
            return CacheLookup::Hit {
                bundle: (*bundle).clone(),
                layer: CacheLayer::Memory,
            };
        }

        if let Some(bundle) = self.lookup_persistent(&key, now).await {
            debug!("Persistent cache hit for query: {query}");
            self.metrics.record_hit(false);
            return CacheLookup::Hit {
                bundle,
                layer: CacheLayer::Persistent,
            };
        }

        debug!("Cache miss for query: {query}");
        self.metrics.record_miss();
        CacheLookup::Miss
    }

    async fn lookup_persistent(&self, key: &CacheKey, now: i64) -> Option<SourceBundle> {
        let store = self.store.as_ref()?;

        let record = match store.get(key.as_str()).await {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                warn!("Cache lookup failed, treating as miss: {e}");
                self.metrics.record_store_error();
                return None;
            }
        };

        if record.schema_version != CURRENT_SCHEMA_VERSION {
            debug!(
                "Discarding cache entry {} written under schema version {}",
                record.key, record.schema_version
            );
            self.discard_persistent(key).await;
            return None;
        }

        if now - record.created_at >= secs_to_millis(u64::try_from(record.ttl_seconds).unwrap_or(0)) {
            self.discard_persistent(key).await;
            return None;
        }

        let bundle: SourceBundle = match serde_json::from_str(&record.payload) {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!("Undecodable cache entry {}, discarding: {e}", record.key);
                self.discard_persistent(key).await;
                return None;
            }
        };

        self.touch_persistent(key, now).await;
        let evicted = self.memory.insert(
            key.clone(),
            Arc::new(bundle.clone()),
            record.created_at,
            now,
        );
        if evicted > 0 {
            debug!("Memory cache full, dropped {evicted} least-recently-used entries");
        }
        Some(bundle)
    }

    async fn touch_persistent(&self, key: &CacheKey, now: i64) {
        let Some(store) = &self.store else { return };
        let _guard = self.write_lock.lock().await;
        if let Err(e) = store.touch(key.as_str(), now).await {
            warn!("Failed to record cache access: {e}");
            self.metrics.record_store_error();
        }
    }

    async fn discard_persistent(&self, key: &CacheKey) {
        self.memory.remove(key);
        let Some(store) = &self.store else { return };
        let _guard = self.write_lock.lock().await;
        if let Err(e) = store.delete(key.as_str()).await {
            warn!("Failed to delete cache entry: {e}");
            self.metrics.record_store_error();
        }
    }

    /// Memoize `bundle` for `query` in both layers.
    ///
    /// Repeated stores for the same key overwrite. Time-sensitive queries are
    /// never written. Returns whether the entry was cached.
    pub async fn store(&self, query: &str, bundle: &SourceBundle) -> bool {
        let now = self.clock.now_millis();
        if !self.enabled || self.freshness.is_time_sensitive(query, self.current_year(now)) {
            self.metrics.record_skipped_write();
            return false;
        }

        let key = CacheKey::derive(query, &self.version_salt);
        let payload = match serde_json::to_string(bundle) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to encode cache payload for '{query}': {e}");
                self.metrics.record_skipped_write();
                return false;
            }
        };

        self.memory
            .insert(key.clone(), Arc::new(bundle.clone()), now, now);
        self.metrics.record_write();

        if let Some(store) = &self.store {
            let record = CacheRecord {
                key: key.as_str().to_string(),
                payload,
                created_at: now,
                last_accessed_at: now,
                ttl_seconds: i64::try_from(self.ttl_seconds).unwrap_or(i64::MAX),
                schema_version: CURRENT_SCHEMA_VERSION,
                access_count: 1,
            };

            let guard = self.write_lock.lock().await;
            if let Err(e) = store.put(&record).await {
                warn!("Failed to persist cache entry, keeping it in memory only: {e}");
                self.metrics.record_store_error();
            }
            let removed = self.enforce_store_capacity(&**store).await;
            if removed > 0 {
                debug!("Cache over capacity, evicted {removed} least-recently-used entries");
                self.metrics.record_evictions(&EvictionReport {
                    capacity: removed,
                    ..Default::default()
                });
            }
            drop(guard);
        }

        let since_cleanup = now - self.last_cleanup.load(Ordering::Relaxed);
        if since_cleanup >= secs_to_millis(self.cleanup_interval_seconds) {
            self.evict().await;
        }

        true
    }

    /// Remove expired, stale and over-capacity entries.
    ///
    /// Runs on open and every `cleanup_interval_seconds` of writes; safe to
    /// call at any time.
    pub async fn evict(&self) -> EvictionReport {
        let now = self.clock.now_millis();
        self.last_cleanup.store(now, Ordering::Relaxed);
        let stale_cutoff = now - secs_to_millis(self.stale_after_seconds);
        let memory_expired = self.memory.purge_expired(now, self.ttl_millis());
        let memory_stale = self.memory.purge_stale(stale_cutoff);

        let mut report = EvictionReport::default();
        let Some(store) = &self.store else {
            report.expired = memory_expired as u64;
            report.stale = memory_stale as u64;
            self.metrics.record_evictions(&report);
            return report;
        };

        let _guard = self.write_lock.lock().await;

        match store.delete_expired(now).await {
            Ok(n) => report.expired = n,
            Err(e) => {
                warn!("Failed to evict expired cache entries: {e}");
                self.metrics.record_store_error();
            }
        }

        match store.delete_not_accessed_since(stale_cutoff).await {
            Ok(n) => report.stale = n,
            Err(e) => {
                warn!("Failed to evict stale cache entries: {e}");
                self.metrics.record_store_error();
            }
        }

        report.capacity = self.enforce_store_capacity(&**store).await;

        self.metrics.record_evictions(&report);
        if report.total() > 0 {
            info!(
                "Cache eviction: {} expired, {} stale, {} over capacity",
                report.expired, report.stale, report.capacity
            );
        }
        report
    }

    /// Trim the store to `max_entries` and drop the same keys from memory.
    /// Callers hold `write_lock`.
    async fn enforce_store_capacity(&self, store: &dyn CacheStore) -> u64 {
        match store.enforce_capacity(self.max_entries).await {
            Ok(keys) => {
                for key in &keys {
                    self.memory.remove(&CacheKey::from(key.clone()));
                }
                keys.len() as u64
            }
            Err(e) => {
                warn!("Failed to enforce cache capacity: {e}");
                self.metrics.record_store_error();
                0
            }
        }
    }

    /// Empty both layers, returning how many persistent entries were removed
    pub async fn clear(&self) -> u64 {
        self.memory.clear();
        let Some(store) = &self.store else {
            return 0;
        };
        let _guard = self.write_lock.lock().await;
        match store.clear().await {
            Ok(n) => {
                info!("Cleared {n} cache entries");
                n
            }
            Err(e) => {
                warn!("Failed to clear cache store: {e}");
                self.metrics.record_store_error();
                0
            }
        }
    }

    /// Counters for this process
    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot(self.memory.len())
    }

    /// Counters plus a snapshot of the persistent layer
    pub async fn report(&self) -> CacheReport {
        let now = self.clock.now_millis();
        let store = match &self.store {
            Some(store) => {
                let stale_cutoff = now - secs_to_millis(self.stale_after_seconds);
                match store.snapshot(now, stale_cutoff).await {
                    Ok(snapshot) => Some(snapshot),
                    Err(e) => {
                        warn!("Failed to read cache store statistics: {e}");
                        self.metrics.record_store_error();
                        None
                    }
                }
            }
            None => None,
        };
        CacheReport {
            stats: self.stats(),
            store,
            path: self.path.clone(),
        }
    }

    /// Whether a persistent layer is attached
    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }
}
