//! Plugin orchestration -- assembly, channel wiring, and lifecycle management.
//!
//! The [`Orchestrator`] is the central coordinator of `netwatch-daemon`.
//! It opens the device store, creates the event channel, builds enabled
//! plugins, manages startup/shutdown ordering, and publishes health.
//!
//! # Startup Order (producers before consumers)
//!
//! 1. Log Pipeline (produces NetworkEvents)
//! 2. Event Router (consumes NetworkEvents, writes the store)
//! 3. Operator API (reads/mutates the store)
//! 4. Digest Exporter (snapshots the store)
//!
//! # Shutdown Order (same as startup)
//!
//! Stopping the log pipeline drops the only event sender, so the router
//! drains what is left in the channel and exits before the API goes away.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};

use netwatch_core::config::NetwatchConfig;
use netwatch_core::event::NetworkEvent;
use netwatch_core::metrics as m;
use netwatch_core::plugin::PluginRegistry;
use netwatch_log_pipeline::{LogPipelineBuilder, PipelineConfig};
use netwatch_store::DeviceStore;

use crate::api::OperatorApi;
use crate::digest::DigestExporter;
use crate::health::{DaemonHealth, ModuleHealth, aggregate_status};
use crate::metrics_server;
use crate::router::EventRouter;

/// How often health is re-published and the uptime gauge refreshed.
const HEALTH_INTERVAL: Duration = Duration::from_secs(10);

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: NetwatchConfig,
    /// Registry of all plugins (ordered for start/stop).
    plugins: PluginRegistry,
    /// Device store shared by the router, API and exporter.
    store: Arc<DeviceStore>,
    /// Publishes the latest health report to the operator API.
    health_tx: watch::Sender<DaemonHealth>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Orchestrator {
    /// Load configuration from `config_path` and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or any
    /// component fails to build.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = NetwatchConfig::load(config_path)
            .await
            .context("failed to load config")?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    ///
    /// Opening the store happens here, so an unusable database path fails
    /// before any plugin starts.
    pub async fn build_from_config(config: NetwatchConfig) -> Result<Self> {
        config.validate().context("config validation failed")?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let store = Arc::new(
            DeviceStore::open(&config.store.db_path)
                .with_context(|| format!("failed to open store at {}", config.store.db_path))?,
        );

        let (event_tx, event_rx) =
            mpsc::channel::<NetworkEvent>(config.log_pipeline.channel_capacity.max(1));
        let (health_tx, health_rx) = watch::channel(DaemonHealth::starting());

        let mut plugins = PluginRegistry::new();

        if config.log_pipeline.enabled {
            tracing::info!(path = %config.log_pipeline.log_path, "initializing log pipeline");
            let (pipeline, _) = LogPipelineBuilder::new()
                .config(PipelineConfig::from_core(&config.log_pipeline))
                .event_sender(event_tx)
                .build()
                .context("failed to build log pipeline")?;
            plugins.register(Box::new(pipeline))?;
        } else {
            tracing::warn!("log pipeline disabled, no events will be routed");
            drop(event_tx);
        }

        plugins.register(Box::new(EventRouter::new(Arc::clone(&store), event_rx)))?;

        if config.http.enabled {
            plugins.register(Box::new(OperatorApi::new(
                config.http.clone(),
                Arc::clone(&store),
                health_rx,
            )))?;
        }

        if config.digest.interval_mins > 0 {
            plugins.register(Box::new(DigestExporter::new(
                config.digest.clone(),
                config.http.public_url.clone(),
                Arc::clone(&store),
            )))?;
        }

        tracing::info!(total_plugins = plugins.count(), "orchestrator initialized");

        if config.metrics.enabled {
            record_daemon_metrics(plugins.count());
        }

        Ok(Self {
            config,
            plugins,
            store,
            health_tx,
            start_time: Instant::now(),
        })
    }

    /// Start all plugins and block until SIGTERM or SIGINT.
    pub async fn run(&mut self) -> Result<()> {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm =
            signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;

        self.run_until(async move {
            tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
            }
        })
        .await
    }

    /// Start all plugins and run until `shutdown` resolves, then stop them.
    ///
    /// The future's output names the shutdown trigger for logging.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = &'static str>,
    {
        let pid_file = self.pid_file();
        if let Some(path) = &pid_file {
            write_pid_file(path)?;
        }

        if let Err(e) = self.start_plugins().await {
            if let Some(path) = &pid_file {
                remove_pid_file(path);
            }
            return Err(e);
        }

        self.publish_health().await;

        tracing::info!("netwatch running");
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(HEALTH_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let trigger = loop {
            tokio::select! {
                trigger = &mut shutdown => break trigger,
                _ = ticker.tick() => self.publish_health().await,
            }
        };
        tracing::info!(signal = trigger, "shutdown signal received");

        let result = self.shutdown().await;

        if let Some(path) = &pid_file {
            remove_pid_file(path);
        }
        result
    }

    /// Initialize and start plugins, rolling back on failure.
    async fn start_plugins(&mut self) -> Result<()> {
        tracing::info!("initializing all plugins");
        if let Err(e) = self.plugins.init_all().await {
            tracing::error!(error = %e, "plugin initialization failed");
            return Err(e.into());
        }

        tracing::info!("starting all plugins");
        if let Err(e) = self.plugins.start_all().await {
            tracing::warn!(error = %e, "startup failed, rolling back already-started plugins");
            if let Err(stop_err) = self.plugins.stop_all().await {
                tracing::error!(
                    startup_error = %e,
                    rollback_error = %stop_err,
                    "rollback also failed during startup failure cleanup"
                );
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Stop plugins in registration order (producers first).
    async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("stopping all plugins");
        self.plugins.stop_all().await?;
        tracing::info!(devices = self.store.device_count(), "netwatch stopped");
        Ok(())
    }

    async fn publish_health(&self) {
        let health = self.health().await;
        if !health.status.is_healthy() {
            tracing::warn!(status = ?health.status, "daemon health degraded");
        }
        self.health_tx.send_replace(health);
    }

    /// Get the current aggregated health status.
    pub async fn health(&self) -> DaemonHealth {
        let modules: Vec<ModuleHealth> = self
            .plugins
            .health_check_all()
            .await
            .into_iter()
            .map(|(name, state, status)| ModuleHealth {
                name,
                state: state.to_string(),
                status,
            })
            .collect();

        let uptime_secs = self.start_time.elapsed().as_secs();
        if self.config.metrics.enabled {
            #[allow(clippy::cast_precision_loss)]
            metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(uptime_secs as f64);
        }

        DaemonHealth {
            status: aggregate_status(&modules),
            uptime_secs,
            modules,
        }
    }

    /// The device store.
    pub fn store(&self) -> &Arc<DeviceStore> {
        &self.store
    }

    /// Names of registered plugins in start order.
    pub fn plugin_names(&self) -> Vec<String> {
        self.plugins.list().into_iter().map(|i| i.name.clone()).collect()
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &NetwatchConfig {
        &self.config
    }

    fn pid_file(&self) -> Option<PathBuf> {
        let path = self.config.general.pid_file.trim();
        (!path.is_empty()).then(|| PathBuf::from(path))
    }
}

/// Write the current process PID to a file.
///
/// The file is created with `create_new`, so an existing PID file
/// (another instance, or a stale file) aborts startup.
///
/// # Errors
///
/// Returns an error if the PID file exists or cannot be written.
pub fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            fs::DirBuilder::new()
                .mode(0o755)
                .recursive(true)
                .create(parent)?;
        }
        #[cfg(not(unix))]
        fs::create_dir_all(parent)?;
    }

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_owned());
            anyhow::bail!(
                "PID file {} already exists with PID: {}. Is another instance running?",
                path.display(),
                existing.trim()
            );
        }
        Err(e) => return Err(e.into()),
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o644))?;
    }

    let pid = std::process::id();
    writeln!(file, "{pid}")?;
    tracing::info!(pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file. Failures are logged, not returned.
pub fn remove_pid_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::info!(path = %path.display(), "PID file removed"),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove PID file"),
    }
}

/// Record daemon-level metrics (build info, plugins registered).
fn record_daemon_metrics(plugin_count: usize) {
    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    #[allow(clippy::cast_precision_loss)]
    metrics::gauge!(m::DAEMON_PLUGINS_REGISTERED).set(plugin_count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn pid_file_contains_current_pid() {
        // Given: a path under a missing directory
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("run").join("netwatch.pid");

        // When
        write_pid_file(&pid_file).unwrap();

        // Then
        let content = fs::read_to_string(&pid_file).unwrap();
        assert_eq!(content.trim().parse::<u32>().unwrap(), std::process::id());
    }

    #[test]
    fn existing_pid_file_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("netwatch.pid");
        fs::write(&pid_file, "12345").unwrap();

        let err = write_pid_file(&pid_file).unwrap_err().to_string();

        assert!(err.contains("already exists"));
        assert!(err.contains("12345"));
    }

    #[test]
    fn remove_missing_pid_file_does_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        remove_pid_file(&dir.path().join("absent.pid"));
    }
}
