//! Logging initialization for netwatch-daemon.
//!
//! Configures `tracing-subscriber` from the `[general]` section of
//! `NetwatchConfig`. `RUST_LOG`, when set, replaces the configured level.

use anyhow::{Result, anyhow, bail};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use netwatch_core::config::GeneralConfig;

/// HTTP stack crates are noisy below `warn`.
const QUIET_DEPENDENCIES: &[&str] = &["hyper=warn", "h2=warn", "tower=warn"];

/// Build the filter directive string for a configured level.
pub fn filter_directives(level: &str) -> String {
    let mut directives = vec![level.to_owned()];
    directives.extend(QUIET_DEPENDENCIES.iter().map(|d| (*d).to_owned()));
    directives.join(",")
}

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any tracing macros are used.
///
/// # Formats
///
/// * `"json"` - Machine-parseable JSON lines (default for production)
/// * `"pretty"` - Human-readable multi-line output (for development)
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(filter_directives(&config.log_level))
            .map_err(|e| anyhow!("invalid log level '{}': {}", config.log_level, e))?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.log_format.as_str() {
        "json" => registry.with(fmt::layer().json()).try_init(),
        "pretty" => registry.with(fmt::layer().pretty()).try_init(),
        other => bail!("unknown log format '{}', expected 'json' or 'pretty'", other),
    };

    result.map_err(|e| {
        anyhow!(
            "failed to initialize {} tracing subscriber: {}",
            config.log_format,
            e
        )
    })
}
