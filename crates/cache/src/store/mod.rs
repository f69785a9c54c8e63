//! Persistent (L2) cache store

mod schema;
mod sqlite;

pub use schema::CURRENT_SCHEMA_VERSION;
pub use sqlite::SqliteCacheStore;

use crate::error::Result;
use async_trait::async_trait;

/// One persisted cache entry
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRecord {
    pub key: String,
    /// JSON encoded source bundle
    pub payload: String,
    /// Unix milliseconds
    pub created_at: i64,
    /// Unix milliseconds
    pub last_accessed_at: i64,
    pub ttl_seconds: i64,
    pub schema_version: i64,
    pub access_count: i64,
}

/// Aggregate view of the persisted entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub total_entries: u64,
    pub expired_entries: u64,
    pub stale_entries: u64,
    pub payload_bytes: u64,
}

/// Durable key/record storage with TTL filtering and LRU-ordered eviction.
///
/// Implementations need point lookup by key and must tolerate concurrent
/// readers; writers are serialized by the cache manager.
#[async_trait]
pub trait CacheStore: Send + Sync + std::fmt::Debug {
    async fn get(&self, key: &str) -> Result<Option<CacheRecord>>;

    /// Record a read: bump `last_accessed_at` and `access_count`
    async fn touch(&self, key: &str, now: i64) -> Result<()>;

    /// Insert or overwrite the record for `record.key`
    async fn put(&self, record: &CacheRecord) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Remove entries whose `created_at + ttl_seconds` is at or before `now`
    async fn delete_expired(&self, now: i64) -> Result<u64>;

    /// Remove entries last read before `cutoff`
    async fn delete_not_accessed_since(&self, cutoff: i64) -> Result<u64>;

    /// Remove least-recently-accessed entries until at most `max_entries` remain,
    /// returning the removed keys
    async fn enforce_capacity(&self, max_entries: usize) -> Result<Vec<String>>;

    async fn clear(&self) -> Result<u64>;

    async fn snapshot(&self, now: i64, stale_cutoff: i64) -> Result<StoreSnapshot>;
}
