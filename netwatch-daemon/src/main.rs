use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;

use netwatch_core::config::NetwatchConfig;
use netwatch_daemon::cli::{DEFAULT_CONFIG_PATH, DaemonCli};
use netwatch_daemon::logging;
use netwatch_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = load_config(&cli).await?;
    cli.apply_overrides(&mut config);
    config.validate().context("invalid configuration")?;

    if cli.validate {
        println!("configuration OK");
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_path = %config.log_pipeline.log_path,
        db_path = %config.store.db_path,
        "netwatch-daemon starting"
    );

    let mut orchestrator = Orchestrator::build_from_config(config).await?;
    orchestrator.run().await?;

    tracing::info!("netwatch-daemon shut down");
    Ok(())
}

/// Explicit `--config` must exist; the default location is optional.
async fn load_config(cli: &DaemonCli) -> Result<NetwatchConfig> {
    let path = match &cli.config {
        Some(path) => Some(path.as_path()),
        None => Some(Path::new(DEFAULT_CONFIG_PATH)).filter(|p| p.exists()),
    };

    let mut config = match path {
        Some(path) => NetwatchConfig::from_file(path)
            .await
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => NetwatchConfig::default(),
    };
    config.apply_env_overrides();
    Ok(config)
}
