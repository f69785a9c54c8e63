//! Error types for the query cache

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to open cache store at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Cache store query failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache schema migration failed: {0}")]
    Migration(String),

    #[error("Cache directory could not be created: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid time-sensitive keyword pattern: {0}")]
    InvalidKeywords(#[from] regex::Error),

    #[error("Cache store is busy, please retry")]
    Busy,
}

impl CacheError {
    /// Map a sqlx error, recognizing SQLITE_BUSY lock contention
    pub(crate) fn from_sqlx(e: sqlx::Error) -> Self {
        if is_busy_error(&e) {
            Self::Busy
        } else {
            Self::Database(e)
        }
    }
}

fn is_busy_error(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code == "5"),
        _ => false,
    }
}

impl From<CacheError> for deepwave_core::Error {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Io(e) => deepwave_core::Error::Io(e),
            other => deepwave_core::Error::storage(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
