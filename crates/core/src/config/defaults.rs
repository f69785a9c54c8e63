//! Default values and functions for configuration

// Default constants
pub(crate) const DEFAULT_VERSION_SALT: &str = "v1.0";
pub(crate) const DEFAULT_CACHE_FILE_NAME: &str = "search_cache_v1.sqlite";

pub(crate) const DEFAULT_TIME_SENSITIVE_KEYWORDS: &[&str] = &[
    "today",
    "yesterday",
    "this week",
    "this month",
    "recent",
    "latest",
    "new",
    "breaking",
    "current",
    "now",
    "just",
    "announced",
    "happening",
];

// Cache defaults

pub(crate) fn default_cache_ttl_seconds() -> u64 {
    86_400
}

pub(crate) fn default_cache_max_entries() -> usize {
    1_000
}

pub(crate) fn default_cache_stale_after_seconds() -> u64 {
    7 * 86_400
}

pub(crate) fn default_cache_version_salt() -> String {
    DEFAULT_VERSION_SALT.to_string()
}

pub(crate) fn default_cache_cleanup_interval_seconds() -> u64 {
    3_600
}

pub(crate) fn default_cache_enabled() -> bool {
    true
}

pub(crate) fn default_time_sensitive_keywords() -> Vec<String> {
    DEFAULT_TIME_SENSITIVE_KEYWORDS
        .iter()
        .map(|k| k.to_string())
        .collect()
}

// Search executor defaults

pub(crate) fn default_search_concurrency_limit() -> usize {
    5
}

pub(crate) fn default_summary_concurrency_limit() -> usize {
    5
}

pub(crate) fn default_results_per_query() -> usize {
    5
}

pub(crate) fn default_call_timeout_secs() -> u64 {
    60
}

pub(crate) fn default_search_retry_attempts() -> usize {
    2
}

pub(crate) fn default_retry_backoff_ms() -> u64 {
    500
}

// Wave controller defaults

pub(crate) fn default_max_waves() -> usize {
    2
}

pub(crate) fn default_max_queries_per_wave() -> usize {
    5
}

pub(crate) fn default_max_followup_queries() -> usize {
    4
}

pub(crate) fn default_findings_highlights() -> usize {
    10
}

// Report defaults

pub(crate) fn default_report_max_sources() -> usize {
    15
}

pub(crate) fn default_report_retry_max_sources() -> usize {
    10
}

pub(crate) fn default_report_max_subtopics() -> usize {
    7
}

pub(crate) fn default_report_max_summary_chars() -> usize {
    3_000
}

pub(crate) fn default_report_max_query_summary_chars() -> usize {
    2_000
}

pub(crate) fn default_prompt_token_warning() -> usize {
    10_000
}
