//! Configuration loading from files and environment variables

use crate::error::{Error, Result};
use config::{Config as ConfigLib, ConfigBuilder as LibConfigBuilder, Environment, File};
use std::path::Path;
use tracing::debug;

use super::{global_config_path, Config};

type Builder = LibConfigBuilder<config::builder::DefaultState>;

/// Flat numeric variables and the config keys they override
const NUMERIC_OVERRIDES: &[(&str, &str)] = &[
    ("CACHE_TTL_SECONDS", "cache.ttl_seconds"),
    ("CACHE_MAX_ENTRIES", "cache.max_entries"),
    ("CACHE_STALE_AFTER_SECONDS", "cache.stale_after_seconds"),
    ("SEARCH_CONCURRENCY_LIMIT", "search.search_concurrency_limit"),
    ("SUMMARY_CONCURRENCY_LIMIT", "search.summary_concurrency_limit"),
    ("MAX_WAVES", "waves.max_waves"),
];

/// Helper to set a config override with consistent error mapping
fn set_config_override<T: Into<config::Value>>(
    builder: Builder,
    var: &str,
    key: &str,
    value: T,
) -> Result<Builder> {
    builder
        .set_override(key, value)
        .map_err(|e| Error::config(format!("Failed to set {var}: {e}")))
}

/// Split a comma separated keyword list, dropping blanks
pub(crate) fn parse_keyword_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

/// Apply the flat tuning variables, which take precedence over everything else
fn apply_flat_overrides(mut builder: Builder) -> Result<Builder> {
    for (var, key) in NUMERIC_OVERRIDES {
        if let Ok(raw) = std::env::var(var) {
            match raw.trim().parse::<i64>() {
                Ok(value) => builder = set_config_override(builder, var, key, value)?,
                Err(_) => {
                    return Err(Error::config(format!(
                        "{var} must be an integer, got '{raw}'"
                    )))
                }
            }
        }
    }

    if let Ok(salt) = std::env::var("CACHE_VERSION_SALT") {
        builder = set_config_override(builder, "CACHE_VERSION_SALT", "cache.version_salt", salt)?;
    }

    if let Ok(raw) = std::env::var("TIME_SENSITIVE_KEYWORDS") {
        builder = set_config_override(
            builder,
            "TIME_SENSITIVE_KEYWORDS",
            "cache.time_sensitive_keywords",
            parse_keyword_list(&raw),
        )?;
    }

    Ok(builder)
}

impl Config {
    /// Loads configuration from a TOML file with environment variable overrides
    ///
    /// Environment variables are prefixed with `DEEPWAVE_` and use double underscores
    /// for nested values. For example:
    /// - `DEEPWAVE_CACHE__TTL_SECONDS=3600`
    ///
    /// The flat variables (`CACHE_TTL_SECONDS`, `MAX_WAVES`, ...) win over both.
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut builder = ConfigLib::builder();

        // Add the config file if it exists
        if path.exists() {
            debug!("Loading configuration from {}", path.display());
            builder = builder.add_source(File::from(path));
        } else {
            debug!("No config file at {}, using defaults", path.display());
        }

        // Add environment variables with DEEPWAVE_ prefix
        builder = builder.add_source(
            Environment::with_prefix("DEEPWAVE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder = apply_flat_overrides(builder)?;

        let config = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Creates a config from a TOML string (useful for testing)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration
    ///
    /// Precedence (lowest to highest):
    /// 1. Hardcoded defaults
    /// 2. Config file (~/.deepwave/config.toml or custom --config path)
    /// 3. Environment variables (DEEPWAVE_*)
    /// 4. Flat tuning variables (CACHE_*, SEARCH_CONCURRENCY_LIMIT, MAX_WAVES, ...)
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = match config_path {
            Some(p) => p.to_path_buf(),
            None => global_config_path()?,
        };
        Self::from_file(&path)
    }
}
