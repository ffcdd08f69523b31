//! Configuration loading and validation tests.
//!
//! Tests partial files, environment overrides, CLI precedence and
//! validation failures as the daemon sees them at startup.

use clap::Parser;
use serial_test::serial;

use netwatch_core::config::NetwatchConfig;
use netwatch_daemon::cli::DaemonCli;

const EXAMPLE: &str = include_str!("../../netwatch.toml.example");

#[test]
fn test_partial_config_uses_defaults() {
    // Given: Only the store section
    let toml_str = r#"
[store]
db_path = "/data/net.db"
"#;

    // When
    let config = NetwatchConfig::parse(toml_str).expect("partial config should parse");

    // Then: Everything else is defaulted
    assert_eq!(config.store.db_path, "/data/net.db");
    assert!(config.log_pipeline.enabled);
    assert!(config.http.enabled);
    assert!(!config.metrics.enabled);
}

#[test]
fn test_default_config_round_trips_through_toml() {
    let original = NetwatchConfig::default();

    let text = toml::to_string(&original).expect("should serialize");
    let parsed = NetwatchConfig::parse(&text).expect("should parse back");

    assert_eq!(parsed.store.db_path, original.store.db_path);
    assert_eq!(parsed.http.public_url, original.http.public_url);
    assert_eq!(parsed.log_pipeline.poll_interval_ms, original.log_pipeline.poll_interval_ms);
}

#[test]
fn test_zero_poll_interval_fails_validation() {
    let mut config = NetwatchConfig::default();
    config.log_pipeline.poll_interval_ms = 0;

    let err = config.validate().unwrap_err().to_string();

    assert!(err.contains("poll_interval_ms"), "unexpected error: {err}");
}

#[test]
fn test_disabled_pipeline_skips_pipeline_validation() {
    let mut config = NetwatchConfig::default();
    config.log_pipeline.enabled = false;
    config.log_pipeline.log_path = String::new();
    config.log_pipeline.poll_interval_ms = 0;

    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_env_overrides_apply_on_top_of_file() {
    // Given: A file value and an env var for the same field
    let mut config = NetwatchConfig::parse(EXAMPLE).unwrap();
    // SAFETY: serialized with other env-mutating tests
    unsafe {
        std::env::set_var("NETWATCH_LOG_PIPELINE_LOG_PATH", "/var/log/dnsmasq.log");
        std::env::set_var("NETWATCH_HTTP_PUBLIC_URL", "http://netwatch.lan");
    }

    // When
    config.apply_env_overrides();
    // SAFETY: as above
    unsafe {
        std::env::remove_var("NETWATCH_LOG_PIPELINE_LOG_PATH");
        std::env::remove_var("NETWATCH_HTTP_PUBLIC_URL");
    }

    // Then
    assert_eq!(config.log_pipeline.log_path, "/var/log/dnsmasq.log");
    assert_eq!(config.http.public_url, "http://netwatch.lan");
}

#[test]
#[serial]
fn test_cli_overrides_beat_env_overrides() {
    // Given: Env sets the log level, the CLI sets another
    let mut config = NetwatchConfig::default();
    // SAFETY: serialized with other env-mutating tests
    unsafe { std::env::set_var("NETWATCH_GENERAL_LOG_LEVEL", "warn") };
    config.apply_env_overrides();
    // SAFETY: as above
    unsafe { std::env::remove_var("NETWATCH_GENERAL_LOG_LEVEL") };
    assert_eq!(config.general.log_level, "warn");

    let cli = DaemonCli::try_parse_from([
        "netwatch-daemon",
        "--log-level",
        "trace",
        "/tmp/dnsmasq.log",
    ])
    .unwrap();

    // When
    cli.apply_overrides(&mut config);

    // Then
    assert_eq!(config.general.log_level, "trace");
    assert_eq!(config.log_pipeline.log_path, "/tmp/dnsmasq.log");
    assert!(config.validate().is_ok());
}

#[test]
fn test_invalid_cli_log_level_fails_validation() {
    let cli = DaemonCli::try_parse_from(["netwatch-daemon", "--log-level", "loud"]).unwrap();
    let mut config = NetwatchConfig::default();

    cli.apply_overrides(&mut config);

    assert!(config.validate().is_err());
}
