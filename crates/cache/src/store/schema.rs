//! Schema creation and in-place migration for the SQLite cache store

use crate::error::{CacheError, Result};
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use tracing::{info, warn};

/// Bumped whenever the record layout or payload encoding changes
pub const CURRENT_SCHEMA_VERSION: i64 = 2;

pub(crate) const TABLE: &str = "query_cache";

/// Columns every version of the table has had; without them a row is useless
const REQUIRED_COLUMNS: &[&str] = &["key", "payload", "created_at"];

/// Columns added after the first release, with the declaration used to add them
const OPTIONAL_COLUMNS: &[(&str, &str)] = &[
    ("last_accessed_at", "INTEGER"),
    ("ttl_seconds", "INTEGER"),
    ("schema_version", "INTEGER"),
    ("access_count", "INTEGER NOT NULL DEFAULT 1"),
];

/// What [`migrate`] changed
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct MigrationReport {
    pub added_columns: Vec<String>,
    pub backfilled_rows: u64,
    pub rebuilt: bool,
}

fn create_table_sql() -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {TABLE} (
            key TEXT PRIMARY KEY,
            payload TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            last_accessed_at INTEGER,
            ttl_seconds INTEGER,
            schema_version INTEGER,
            access_count INTEGER NOT NULL DEFAULT 1
        )"
    )
}

async fn existing_columns(pool: &SqlitePool) -> Result<HashSet<String>> {
    let rows = sqlx::query(&format!("PRAGMA table_info({TABLE})"))
        .fetch_all(pool)
        .await
        .map_err(CacheError::from_sqlx)?;
    rows.iter()
        .map(|row| row.try_get::<String, _>("name").map_err(CacheError::from))
        .collect()
}

/// Bring the cache table up to the current layout.
///
/// Missing optional columns are added and backfilled from existing data
/// instead of failing. A table lacking a required column cannot be salvaged
/// and is rebuilt empty.
pub(crate) async fn migrate(pool: &SqlitePool, default_ttl_seconds: u64) -> Result<MigrationReport> {
    let mut report = MigrationReport::default();

    sqlx::query(&create_table_sql())
        .execute(pool)
        .await
        .map_err(|e| CacheError::Migration(format!("create table: {e}")))?;

    let mut columns = existing_columns(pool).await?;

    if let Some(missing) = REQUIRED_COLUMNS.iter().find(|c| !columns.contains(**c)) {
        warn!(
            "Cache table is missing required column '{}', rebuilding it empty",
            missing
        );
        sqlx::query(&format!("DROP TABLE {TABLE}"))
            .execute(pool)
            .await
            .map_err(|e| CacheError::Migration(format!("drop table: {e}")))?;
        sqlx::query(&create_table_sql())
            .execute(pool)
            .await
            .map_err(|e| CacheError::Migration(format!("recreate table: {e}")))?;
        columns = existing_columns(pool).await?;
        report.rebuilt = true;
    }

    for (name, declaration) in OPTIONAL_COLUMNS {
        if columns.contains(*name) {
            continue;
        }
        sqlx::query(&format!(
            "ALTER TABLE {TABLE} ADD COLUMN {name} {declaration}"
        ))
        .execute(pool)
        .await
        .map_err(|e| CacheError::Migration(format!("add column {name}: {e}")))?;
        report.added_columns.push((*name).to_string());
    }

    let ttl = i64::try_from(default_ttl_seconds).unwrap_or(i64::MAX);
    let backfills: [(String, Option<i64>); 3] = [
        (
            format!(
                "UPDATE {TABLE} SET last_accessed_at = created_at WHERE last_accessed_at IS NULL"
            ),
            None,
        ),
        (
            format!("UPDATE {TABLE} SET ttl_seconds = ? WHERE ttl_seconds IS NULL"),
            Some(ttl),
        ),
        (
            format!("UPDATE {TABLE} SET schema_version = ? WHERE schema_version IS NULL"),
            Some(CURRENT_SCHEMA_VERSION),
        ),
    ];
    for (sql, value) in &backfills {
        let mut statement = sqlx::query(sql);
        if let Some(value) = value {
            statement = statement.bind(*value);
        }
        let result = statement
            .execute(pool)
            .await
            .map_err(|e| CacheError::Migration(format!("backfill: {e}")))?;
        report.backfilled_rows += result.rows_affected();
    }

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{TABLE}_last_accessed ON {TABLE}(last_accessed_at)"
    ))
    .execute(pool)
    .await
    .map_err(|e| CacheError::Migration(format!("create index: {e}")))?;

    if report.rebuilt || !report.added_columns.is_empty() || report.backfilled_rows > 0 {
        info!(
            "Migrated cache schema: added columns {:?}, backfilled {} fields, rebuilt: {}",
            report.added_columns, report.backfilled_rows, report.rebuilt
        );
    }

    Ok(report)
}
