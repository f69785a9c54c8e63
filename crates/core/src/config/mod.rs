//! Configuration module for deepwave
//!
//! Configuration can be loaded from a TOML file, `DEEPWAVE_` prefixed
//! environment variables, and the flat tuning variables (`CACHE_TTL_SECONDS`,
//! `MAX_WAVES`, ...) recognized by the research core.

mod defaults;
mod loading;


use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use defaults::*;

/// Upper bound for either worker pool
const MAX_CONCURRENCY_LIMIT: usize = 64;

/// Upper bound accepted for `waves.max_waves`
const MAX_WAVES_CEILING: usize = 10;

/// Returns the deepwave home directory (`~/.deepwave`)
pub fn deepwave_home() -> Result<PathBuf> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| Error::config("Unable to determine home directory".to_string()))?;
    Ok(home_dir.join(".deepwave"))
}

/// Returns the path to the global configuration file
///
/// The global config is stored at `~/.deepwave/config.toml`.
pub fn global_config_path() -> Result<PathBuf> {
    Ok(deepwave_home()?.join("config.toml"))
}

/// Query cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Disable to run every query against the search capability
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Location of the persistent store (default: ~/.deepwave/search_cache_v1.sqlite)
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Seconds an entry stays valid after it was written
    #[serde(default = "default_cache_ttl_seconds")]
    pub ttl_seconds: u64,

    /// Maximum number of persisted entries before LRU eviction
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,

    /// Entries not read for this long are evicted even inside their TTL
    #[serde(default = "default_cache_stale_after_seconds")]
    pub stale_after_seconds: u64,

    /// Mixed into every cache key; bumping it invalidates all prior entries
    #[serde(default = "default_cache_version_salt")]
    pub version_salt: String,

    /// Minimum seconds between opportunistic eviction sweeps
    #[serde(default = "default_cache_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,

    /// Queries containing any of these words or phrases bypass the cache
    #[serde(default = "default_time_sensitive_keywords")]
    pub time_sensitive_keywords: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            path: None,
            ttl_seconds: default_cache_ttl_seconds(),
            max_entries: default_cache_max_entries(),
            stale_after_seconds: default_cache_stale_after_seconds(),
            version_salt: default_cache_version_salt(),
            cleanup_interval_seconds: default_cache_cleanup_interval_seconds(),
            time_sensitive_keywords: default_time_sensitive_keywords(),
        }
    }
}

impl CacheConfig {
    /// Resolve the persistent store location, falling back to the home directory
    pub fn resolved_path(&self) -> Result<PathBuf> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => Ok(deepwave_home()?.join(DEFAULT_CACHE_FILE_NAME)),
        }
    }
}

/// Search executor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Maximum queries in flight at once
    #[serde(default = "default_search_concurrency_limit")]
    pub search_concurrency_limit: usize,

    /// Maximum summarization calls in flight at once
    #[serde(default = "default_summary_concurrency_limit")]
    pub summary_concurrency_limit: usize,

    /// Raw results kept per query
    #[serde(default = "default_results_per_query")]
    pub results_per_query: usize,

    /// Deadline applied to each external call
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Extra attempts for a failed search call
    #[serde(default = "default_search_retry_attempts")]
    pub retry_attempts: usize,

    /// Initial backoff between search retries, doubled per attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            search_concurrency_limit: default_search_concurrency_limit(),
            summary_concurrency_limit: default_summary_concurrency_limit(),
            results_per_query: default_results_per_query(),
            call_timeout_secs: default_call_timeout_secs(),
            retry_attempts: default_search_retry_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Wave controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveConfig {
    /// Hard ceiling on research waves
    #[serde(default = "default_max_waves")]
    pub max_waves: usize,

    /// Queries accepted from the planner for the first wave
    #[serde(default = "default_max_queries_per_wave")]
    pub max_queries_per_wave: usize,

    /// Queries accepted from a follow-up decision
    #[serde(default = "default_max_followup_queries")]
    pub max_followup_queries: usize,

    /// Sources summarized for the follow-up decision
    #[serde(default = "default_findings_highlights")]
    pub findings_highlights: usize,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            max_waves: default_max_waves(),
            max_queries_per_wave: default_max_queries_per_wave(),
            max_followup_queries: default_max_followup_queries(),
            findings_highlights: default_findings_highlights(),
        }
    }
}

/// Report hand-off configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Curated sources handed to the report writer
    #[serde(default = "default_report_max_sources")]
    pub max_sources: usize,

    /// Curated sources for the simplified retry
    #[serde(default = "default_report_retry_max_sources")]
    pub retry_max_sources: usize,

    /// Subtopics handed to the report writer
    #[serde(default = "default_report_max_subtopics")]
    pub max_subtopics: usize,

    /// Per-source summary size before head/tail truncation
    #[serde(default = "default_report_max_summary_chars")]
    pub max_summary_chars: usize,

    /// Size of each query-level summary before truncation
    #[serde(default = "default_report_max_query_summary_chars")]
    pub max_query_summary_chars: usize,

    /// Estimated prompt tokens above which a warning is logged
    #[serde(default = "default_prompt_token_warning")]
    pub prompt_token_warning: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            max_sources: default_report_max_sources(),
            retry_max_sources: default_report_retry_max_sources(),
            max_subtopics: default_report_max_subtopics(),
            max_summary_chars: default_report_max_summary_chars(),
            max_query_summary_chars: default_report_max_query_summary_chars(),
            prompt_token_warning: default_prompt_token_warning(),
        }
    }
}

/// Main configuration structure for deepwave
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Query cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Search executor configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Wave controller configuration
    #[serde(default)]
    pub waves: WaveConfig,

    /// Report hand-off configuration
    #[serde(default)]
    pub report: ReportConfig,
}

impl Config {
    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.cache.ttl_seconds == 0 {
            return Err(Error::config(
                "cache.ttl_seconds must be greater than 0".to_string(),
            ));
        }

        if self.cache.max_entries == 0 {
            return Err(Error::config(
                "cache.max_entries must be greater than 0".to_string(),
            ));
        }

        if self.cache.stale_after_seconds == 0 {
            return Err(Error::config(
                "cache.stale_after_seconds must be greater than 0".to_string(),
            ));
        }

        if self.cache.version_salt.trim().is_empty() {
            return Err(Error::config(
                "cache.version_salt must not be empty".to_string(),
            ));
        }

        for (name, value) in [
            (
                "search.search_concurrency_limit",
                self.search.search_concurrency_limit,
            ),
            (
                "search.summary_concurrency_limit",
                self.search.summary_concurrency_limit,
            ),
        ] {
            if value == 0 || value > MAX_CONCURRENCY_LIMIT {
                return Err(Error::config(format!(
                    "{name} must be between 1 and {MAX_CONCURRENCY_LIMIT}, got {value}"
                )));
            }
        }

        if self.search.results_per_query == 0 {
            return Err(Error::config(
                "search.results_per_query must be greater than 0".to_string(),
            ));
        }

        if self.search.call_timeout_secs == 0 {
            return Err(Error::config(
                "search.call_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.waves.max_waves == 0 || self.waves.max_waves > MAX_WAVES_CEILING {
            return Err(Error::config(format!(
                "waves.max_waves must be between 1 and {MAX_WAVES_CEILING}, got {}",
                self.waves.max_waves
            )));
        }

        if self.waves.max_queries_per_wave == 0 || self.waves.max_followup_queries == 0 {
            return Err(Error::config(
                "waves query limits must be greater than 0".to_string(),
            ));
        }

        if self.report.max_sources == 0 || self.report.retry_max_sources == 0 {
            return Err(Error::config(
                "report source limits must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
