//! CLI argument definitions for netwatch-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Default configuration file location, used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/netwatch/netwatch.toml";

/// netwatch network log monitor daemon.
///
/// Tails a dnsmasq log, tracks which devices resolved which hosts,
/// and serves the aggregate to operators.
#[derive(Parser, Debug)]
#[command(name = "netwatch-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to netwatch.toml configuration file.
    ///
    /// When omitted, the default location is used if it exists,
    /// otherwise built-in defaults apply.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,

    /// Override PID file path (takes precedence over config file).
    #[arg(long)]
    pub pid_file: Option<String>,

    /// dnsmasq log file to tail (overrides `log_pipeline.log_path`).
    pub log_path: Option<PathBuf>,
}

impl DaemonCli {
    /// Apply command-line overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut netwatch_core::NetwatchConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
        if let Some(pid_file) = &self.pid_file {
            config.general.pid_file = pid_file.clone();
        }
        if let Some(path) = &self.log_path {
            config.log_pipeline.log_path = path.display().to_string();
        }
    }
}
