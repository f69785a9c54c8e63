//! Library interface for the deepwave CLI
//!
//! Output formatting lives here so it can be tested without spawning the
//! binary; argument parsing and dispatch stay in main.rs.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use anyhow::{Context, Result};
use deepwave_cache::{CacheReport, EvictionReport};
use deepwave_core::Config;

/// Human-readable cache statistics
pub fn format_cache_report(report: &CacheReport) -> String {
    let mut lines = vec![
        String::new(),
        "Research Cache Statistics".to_string(),
        "=========================".to_string(),
    ];

    lines.push(match &report.path {
        Some(path) => format!("Location:          {}", path.display()),
        None => "Location:          (memory only)".to_string(),
    });

    match &report.store {
        Some(store) => {
            lines.push(format!("Total entries:     {}", store.total_entries));
            lines.push(format!("Expired entries:   {}", store.expired_entries));
            lines.push(format!("Stale entries:     {}", store.stale_entries));
            lines.push(format!(
                "Payload size:      {:.2} MB",
                store.payload_bytes as f64 / 1_048_576.0
            ));
        }
        None => lines.push("Persistent store unavailable".to_string()),
    }

    let stats = &report.stats;
    if stats.hits + stats.misses + stats.bypasses > 0 {
        lines.push("\nThis process:".to_string());
        lines.push(format!(
            "  Hits:            {} ({} from memory)",
            stats.hits, stats.memory_hits
        ));
        lines.push(format!("  Misses:          {}", stats.misses));
        lines.push(format!("  Bypasses:        {}", stats.bypasses));
        lines.push(format!("  Hit rate:        {:.1}%", stats.hit_rate() * 100.0));
    }
    if stats.evictions() > 0 {
        lines.push(format!("  Evictions:       {}", stats.evictions()));
    }
    if stats.store_errors > 0 {
        lines.push(format!("  Store errors:    {}", stats.store_errors));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

pub fn format_eviction(report: &EvictionReport) -> String {
    if report.total() == 0 {
        return "Nothing to evict.".to_string();
    }
    format!(
        "Evicted {} entries ({} expired, {} stale, {} over capacity).",
        report.total(),
        report.expired,
        report.stale,
        report.capacity
    )
}

/// The effective configuration as TOML
pub fn format_config(config: &Config) -> Result<String> {
    toml::to_string_pretty(config).context("Failed to serialize configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepwave_cache::{CacheStats, StoreSnapshot};
    use std::path::PathBuf;

    #[test]
    fn test_report_with_store() {
        let report = CacheReport {
            stats: CacheStats {
                hits: 3,
                memory_hits: 2,
                misses: 1,
                ..CacheStats::default()
            },
            store: Some(StoreSnapshot {
                total_entries: 12,
                expired_entries: 2,
                stale_entries: 1,
                payload_bytes: 2_097_152,
            }),
            path: Some(PathBuf::from("/tmp/deepwave/cache.db")),
        };
        let text = format_cache_report(&report);
        assert!(text.contains("/tmp/deepwave/cache.db"));
        assert!(text.contains("Total entries:     12"));
        assert!(text.contains("2.00 MB"));
        assert!(text.contains("Hit rate:        75.0%"));
    }

    #[test]
    fn test_report_without_store() {
        let report = CacheReport {
            stats: CacheStats::default(),
            store: None,
            path: None,
        };
        let text = format_cache_report(&report);
        assert!(text.contains("(memory only)"));
        assert!(text.contains("Persistent store unavailable"));
        assert!(!text.contains("This process"));
    }

    #[test]
    fn test_report_lists_evictions_and_store_errors() {
        let report = CacheReport {
            stats: CacheStats {
                misses: 4,
                capacity_evictions: 2,
                stale_evictions: 1,
                store_errors: 3,
                ..CacheStats::default()
            },
            store: None,
            path: None,
        };
        let text = format_cache_report(&report);
        assert!(text.starts_with("\nResearch Cache Statistics\n"));
        assert!(text.contains("\n\nThis process:\n"));
        assert!(text.contains("  Hit rate:        0.0%\n"));
        assert!(text.contains("  Evictions:       3\n"));
        assert!(text.ends_with("  Store errors:    3\n"));
    }

    #[test]
    fn test_eviction_summary() {
        assert_eq!(format_eviction(&EvictionReport::default()), "Nothing to evict.");
        let report = EvictionReport {
            expired: 2,
            stale: 1,
            capacity: 4,
        };
        assert_eq!(
            format_eviction(&report),
            "Evicted 7 entries (2 expired, 1 stale, 4 over capacity)."
        );
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let text = format_config(&Config::default()).expect("serializable");
        assert!(text.contains("[cache]"));
        let parsed = Config::from_toml_str(&text).expect("parsable");
        assert_eq!(parsed.waves.max_waves, Config::default().waves.max_waves);
    }
}
