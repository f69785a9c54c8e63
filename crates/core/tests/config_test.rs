use deepwave_core::config::{CacheConfig, Config};

#[test]
fn test_cache_config_defaults() {
    let config = CacheConfig::default();
    assert!(config.enabled);
    assert_eq!(config.ttl_seconds, 86_400);
    assert_eq!(config.max_entries, 1_000);
    assert_eq!(config.stale_after_seconds, 7 * 86_400);
    assert_eq!(config.cleanup_interval_seconds, 3_600);
    assert!(config.path.is_none());
    for keyword in ["today", "latest", "breaking", "recent", "current"] {
        assert!(
            config.time_sensitive_keywords.iter().any(|k| k == keyword),
            "missing default keyword {keyword}"
        );
    }
}

#[test]
fn test_default_cache_path_lives_under_home() {
    let path = CacheConfig::default()
        .resolved_path()
        .expect("home directory available in tests");
    assert!(path.ends_with(".deepwave/search_cache_v1.sqlite"));
}

#[test]
fn test_config_round_trips_through_toml() {
    let mut config = Config::default();
    config.cache.version_salt = "v2.0".to_string();
    config.waves.max_waves = 3;

    let rendered = toml::to_string(&config).expect("serialize");
    let parsed = Config::from_toml_str(&rendered).expect("parse");
    assert_eq!(parsed.cache.version_salt, "v2.0");
    assert_eq!(parsed.waves.max_waves, 3);
    assert!(parsed.validate().is_ok());
}

#[test]
fn test_validation_messages_name_the_field() {
    let mut config = Config::default();
    config.cache.max_entries = 0;
    let message = config.validate().unwrap_err().to_string();
    assert!(message.contains("cache.max_entries"));
}
