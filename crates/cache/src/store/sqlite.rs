//! SQLite backed cache store

use super::schema::{migrate, TABLE};
use super::{CacheRecord, CacheStore, StoreSnapshot};
use crate::error::{CacheError, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

const BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Cache store persisted in a single SQLite file
#[derive(Debug, Clone)]
pub struct SqliteCacheStore {
    pool: SqlitePool,
    path: Option<PathBuf>,
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn record_from_row(row: &SqliteRow) -> std::result::Result<CacheRecord, sqlx::Error> {
    Ok(CacheRecord {
        key: row.try_get("key")?,
        payload: row.try_get("payload")?,
        created_at: row.try_get("created_at")?,
        last_accessed_at: row.try_get("last_accessed_at")?,
        ttl_seconds: row.try_get("ttl_seconds")?,
        schema_version: row.try_get("schema_version")?,
        access_count: row.try_get("access_count")?,
    })
}

impl SqliteCacheStore {
    /// Open (creating if needed) the store at `path` and migrate its schema
    pub async fn open(path: &Path, default_ttl_seconds: u64) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT)
            .pragma("journal_mode", "WAL");

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|source| CacheError::Open {
                path: path.display().to_string(),
                source,
            })?;

        migrate(&pool, default_ttl_seconds).await?;
        debug!("Cache store opened at {}", path.display());

        Ok(Self {
            pool,
            path: Some(path.to_path_buf()),
        })
    }

    /// A private in-memory store, discarded when dropped
    pub async fn in_memory(default_ttl_seconds: u64) -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?
            .busy_timeout(BUSY_TIMEOUT);

        // One connection that never idles out, otherwise the database vanishes
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(CacheError::from_sqlx)?;

        migrate(&pool, default_ttl_seconds).await?;
        Ok(Self { pool, path: None })
    }

    /// Location on disk, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn get(&self, key: &str) -> Result<Option<CacheRecord>> {
        let row = sqlx::query(&format!(
            "SELECT key, payload, created_at, last_accessed_at, ttl_seconds, schema_version, access_count
             FROM {TABLE} WHERE key = ?"
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(CacheError::from_sqlx)?;

        row.as_ref()
            .map(record_from_row)
            .transpose()
            .map_err(CacheError::from)
    }

    async fn touch(&self, key: &str, now: i64) -> Result<()> {
        sqlx::query(&format!(
            "UPDATE {TABLE} SET last_accessed_at = ?, access_count = access_count + 1 WHERE key = ?"
        ))
        .bind(now)
        .bind(key)
        .execute(&self.pool)
        .await
        .map_err(CacheError::from_sqlx)?;
        Ok(())
    }

    async fn put(&self, record: &CacheRecord) -> Result<()> {
        sqlx::query(&format!(
            "INSERT OR REPLACE INTO {TABLE}
             (key, payload, created_at, last_accessed_at, ttl_seconds, schema_version, access_count)
             VALUES (?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&record.key)
        .bind(&record.payload)
        .bind(record.created_at)
        .bind(record.last_accessed_at)
        .bind(record.ttl_seconds)
        .bind(record.schema_version)
        .bind(record.access_count)
        .execute(&self.pool)
        .await
        .map_err(CacheError::from_sqlx)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query(&format!("DELETE FROM {TABLE} WHERE key = ?"))
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(CacheError::from_sqlx)?;
        Ok(())
    }

    async fn delete_expired(&self, now: i64) -> Result<u64> {
        let result = sqlx::query(&format!(
            "DELETE FROM {TABLE} WHERE created_at + ttl_seconds * 1000 <= ?"
        ))
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(CacheError::from_sqlx)?;
        Ok(result.rows_affected())
    }

    async fn delete_not_accessed_since(&self, cutoff: i64) -> Result<u64> {
        let result = sqlx::query(&format!("DELETE FROM {TABLE} WHERE last_accessed_at < ?"))
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(CacheError::from_sqlx)?;
        Ok(result.rows_affected())
    }

    async fn enforce_capacity(&self, max_entries: usize) -> Result<Vec<String>> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {TABLE}"))
            .fetch_one(&self.pool)
            .await
            .map_err(CacheError::from_sqlx)?;

        let max = i64::try_from(max_entries).unwrap_or(i64::MAX);
        if count <= max {
            return Ok(Vec::new());
        }

        // rowid breaks ties between entries touched in the same millisecond
        sqlx::query_scalar::<_, String>(&format!(
            "DELETE FROM {TABLE} WHERE key IN (
                SELECT key FROM {TABLE} ORDER BY last_accessed_at ASC, rowid ASC LIMIT ?
             ) RETURNING key"
        ))
        .bind(count - max)
        .fetch_all(&self.pool)
        .await
        .map_err(CacheError::from_sqlx)
    }

    async fn clear(&self) -> Result<u64> {
        let result = sqlx::query(&format!("DELETE FROM {TABLE}"))
            .execute(&self.pool)
            .await
            .map_err(CacheError::from_sqlx)?;
        Ok(result.rows_affected())
    }

    async fn snapshot(&self, now: i64, stale_cutoff: i64) -> Result<StoreSnapshot> {
        let row = sqlx::query(&format!(
            "SELECT
                COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN created_at + ttl_seconds * 1000 <= ? THEN 1 ELSE 0 END), 0) AS expired,
                COALESCE(SUM(CASE WHEN last_accessed_at < ? THEN 1 ELSE 0 END), 0) AS stale,
                COALESCE(SUM(LENGTH(payload)), 0) AS bytes
             FROM {TABLE}"
        ))
        .bind(now)
        .bind(stale_cutoff)
        .fetch_one(&self.pool)
        .await
        .map_err(CacheError::from_sqlx)?;

        Ok(StoreSnapshot {
            total_entries: to_u64(row.try_get("total")?),
            expired_entries: to_u64(row.try_get("expired")?),
            stale_entries: to_u64(row.try_get("stale")?),
            payload_bytes: to_u64(row.try_get("bytes")?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CURRENT_SCHEMA_VERSION;

    fn record(key: &str, created_at: i64, last_accessed_at: i64) -> CacheRecord {
        CacheRecord {
            key: key.to_string(),
            payload: format!("{{\"k\":\"{key}\"}}"),
            created_at,
            last_accessed_at,
            ttl_seconds: 60,
            schema_version: CURRENT_SCHEMA_VERSION,
            access_count: 1,
        }
    }

    #[tokio::test]
    async fn test_put_get_overwrite() {
        let store = SqliteCacheStore::in_memory(60).await.expect("store");
        store.put(&record("a", 0, 0)).await.expect("put");
        let mut updated = record("a", 5, 5);
        updated.payload = "{}".to_string();
        store.put(&updated).await.expect("put");

        let got = store.get("a").await.expect("get").expect("present");
        assert_eq!(got.payload, "{}");
        assert_eq!(got.created_at, 5);
        let snapshot = store.snapshot(0, 0).await.expect("snapshot");
        assert_eq!(snapshot.total_entries, 1);
    }

    #[tokio::test]
    async fn test_touch_updates_access() {
        let store = SqliteCacheStore::in_memory(60).await.expect("store");
        store.put(&record("a", 0, 0)).await.expect("put");
        store.touch("a", 42).await.expect("touch");
        let got = store.get("a").await.expect("get").expect("present");
        assert_eq!(got.last_accessed_at, 42);
        assert_eq!(got.access_count, 2);
    }

    #[tokio::test]
    async fn test_delete_expired_uses_record_ttl() {
        let store = SqliteCacheStore::in_memory(60).await.expect("store");
        store.put(&record("old", 0, 0)).await.expect("put");
        store.put(&record("fresh", 30_000, 30_000)).await.expect("put");

        assert_eq!(store.delete_expired(60_000).await.expect("evict"), 1);
        assert!(store.get("old").await.expect("get").is_none());
        assert!(store.get("fresh").await.expect("get").is_some());
    }

    #[tokio::test]
    async fn test_enforce_capacity_removes_least_recent() {
        let store = SqliteCacheStore::in_memory(60).await.expect("store");
        for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
            store.put(&record(key, 0, i as i64)).await.expect("put");
        }
        store.touch("a", 100).await.expect("touch");

        let mut removed = store.enforce_capacity(2).await.expect("cap");
        removed.sort();
        assert_eq!(removed, vec!["b".to_string(), "c".to_string()]);
        assert!(store.get("a").await.expect("get").is_some());
        assert!(store.get("d").await.expect("get").is_some());
        assert!(store.get("b").await.expect("get").is_none());
        assert!(store.get("c").await.expect("get").is_none());
        assert!(store.enforce_capacity(2).await.expect("cap").is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_counts() {
        let store = SqliteCacheStore::in_memory(60).await.expect("store");
        store.put(&record("a", 0, 0)).await.expect("put");
        store.put(&record("b", 100_000, 100_000)).await.expect("put");

        let snapshot = store.snapshot(100_000, 50_000).await.expect("snapshot");
        assert_eq!(snapshot.total_entries, 2);
        assert_eq!(snapshot.expired_entries, 1);
        assert_eq!(snapshot.stale_entries, 1);
        assert!(snapshot.payload_bytes > 0);
    }

    #[tokio::test]
    async fn test_in_memory_stores_are_isolated() {
        let first = SqliteCacheStore::in_memory(60).await.expect("store");
        let second = SqliteCacheStore::in_memory(60).await.expect("store");
        first.put(&record("a", 0, 0)).await.expect("put");
        assert!(second.get("a").await.expect("get").is_none());
        assert!(first.path().is_none());
    }
}
