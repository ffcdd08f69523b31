//! Periodic digest export.
//!
//! Every `digest.interval_mins` minutes the exporter takes a store snapshot
//! (optionally consuming the visits) and writes it as a JSON file named
//! `digest-<UTC timestamp>.json` into `digest.output_dir`.
//!
//! The snapshot is a detached copy, so the file is written without holding
//! any store lock. When a consuming export cannot write its file, the taken
//! visits are handed back to the store. Export failures are logged and
//! counted; the timer keeps running.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use netwatch_core::config::DigestConfig;
use netwatch_core::error::{NetwatchError, PipelineError, StorageError};
use netwatch_core::event::MODULE_DIGEST;
use netwatch_core::metrics as m;
use netwatch_core::pipeline::HealthStatus;
use netwatch_core::plugin::{Plugin, PluginInfo, PluginState, PluginType};
use netwatch_store::{Device, DeviceStore};

/// The device -> host -> visits picture at one point in time.
///
/// Served by the API on `/latest` and written to disk by the exporter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Digest {
    /// When the snapshot was taken.
    pub generated_at: DateTime<Utc>,
    /// Externally reachable URL of the operator API.
    pub public_url: String,
    /// All tracked devices with their visit history.
    pub devices: Vec<Device>,
}

impl Digest {
    /// Take a snapshot of `store`, consuming visits when `reset` is set.
    pub fn capture(store: &DeviceStore, public_url: &str, reset: bool) -> Self {
        Self {
            generated_at: Utc::now(),
            public_url: public_url.to_owned(),
            devices: store.snapshot_and_reset(reset),
        }
    }

    /// File name for this digest.
    pub fn file_name(&self) -> String {
        format!(
            "digest-{}.json",
            self.generated_at.format("%Y%m%dT%H%M%S%.3fZ")
        )
    }

    /// Total visits across all devices.
    pub fn visit_count(&self) -> usize {
        self.devices.iter().map(Device::visit_count).sum()
    }
}

/// Capture a digest and write it into `output_dir`.
///
/// With `reset`, visits consumed by the snapshot are restored to the store
/// if the file cannot be written. Returns the path of the written file.
pub async fn export_once(
    store: Arc<DeviceStore>,
    output_dir: &Path,
    public_url: &str,
    reset: bool,
) -> Result<PathBuf, NetwatchError> {
    let url = public_url.to_owned();
    let snapshot_store = Arc::clone(&store);
    let digest = tokio::task::spawn_blocking(move || Digest::capture(&snapshot_store, &url, reset))
        .await
        .map_err(|e| StorageError::Backend(format!("snapshot task failed: {e}")))?;

    let path = match write_digest(&digest, output_dir).await {
        Ok(path) => path,
        Err(e) if reset => {
            let visits = digest.visit_count();
            let devices = digest.devices;
            tokio::task::spawn_blocking(move || store.restore_visits(&devices))
                .await
                .map_err(|join| StorageError::Backend(format!("restore task failed: {join}")))?;
            tracing::warn!(visits, "digest not written, consumed visits restored");
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    tracing::info!(
        path = %path.display(),
        devices = digest.devices.len(),
        visits = digest.visit_count(),
        reset,
        "digest exported"
    );
    Ok(path)
}

async fn write_digest(digest: &Digest, output_dir: &Path) -> Result<PathBuf, NetwatchError> {
    let body = serde_json::to_vec_pretty(digest)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    let path = output_dir.join(digest.file_name());
    tokio::fs::write(&path, body).await?;
    Ok(path)
}

/// Digest exporter plugin.
pub struct DigestExporter {
    info: PluginInfo,
    state: PluginState,
    config: DigestConfig,
    period: Duration,
    public_url: String,
    store: Arc<DeviceStore>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl DigestExporter {
    /// Create an exporter for `store`.
    pub fn new(config: DigestConfig, public_url: impl Into<String>, store: Arc<DeviceStore>) -> Self {
        Self {
            info: PluginInfo::new(
                MODULE_DIGEST,
                "periodic JSON digest of device activity",
                PluginType::Exporter,
            ),
            state: PluginState::Created,
            period: Duration::from_secs(config.interval_mins.saturating_mul(60)),
            config,
            public_url: public_url.into(),
            store,
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    /// Export interval.
    pub fn interval(&self) -> Duration {
        self.period
    }

    #[cfg(test)]
    fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }
}

impl Plugin for DigestExporter {
    fn info(&self) -> &PluginInfo {
        &self.info
    }

    fn state(&self) -> PluginState {
        self.state
    }

    async fn init(&mut self) -> Result<(), NetwatchError> {
        self.state.expect(&self.info.name, PluginState::Created)?;
        if self.config.interval_mins == 0 {
            self.state = PluginState::Failed;
            return Err(PipelineError::InitFailed("digest interval must be > 0".to_owned()).into());
        }
        if let Err(e) = tokio::fs::create_dir_all(&self.config.output_dir).await {
            self.state = PluginState::Failed;
            return Err(PipelineError::InitFailed(format!(
                "cannot create digest directory {}: {}",
                self.config.output_dir, e
            ))
            .into());
        }
        self.state = PluginState::Initialized;
        Ok(())
    }

    async fn start(&mut self) -> Result<(), NetwatchError> {
        if self.state == PluginState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }
        self.state.expect(&self.info.name, PluginState::Initialized)?;

        let period = self.interval();
        let store = Arc::clone(&self.store);
        let output_dir = PathBuf::from(&self.config.output_dir);
        let public_url = self.public_url.clone();
        let reset = self.config.reset;
        let cancel = self.cancel.clone();

        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let result = export_once(Arc::clone(&store), &output_dir, &public_url, reset).await;
                        let label = if result.is_ok() { "success" } else { "failure" };
                        metrics::counter!(m::DIGEST_EXPORTS_TOTAL, m::LABEL_RESULT => label).increment(1);
                        if let Err(e) = result {
                            tracing::warn!(error = %e, "digest export failed");
                        }
                    }
                }
            }
            tracing::debug!("digest exporter shutting down");
        }));

        self.state = PluginState::Running;
        tracing::info!(
            interval_mins = self.config.interval_mins,
            output_dir = %self.config.output_dir,
            "digest exporter started"
        );
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), NetwatchError> {
        if self.state != PluginState::Running {
            return Err(PipelineError::NotRunning.into());
        }
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "digest exporter task panicked");
            }
        }
        self.state = PluginState::Stopped;
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PluginState::Running => HealthStatus::Healthy,
            PluginState::Created | PluginState::Initialized => {
                HealthStatus::Unhealthy("not started".to_owned())
            }
            PluginState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
            PluginState::Failed => HealthStatus::Unhealthy("failed".to_owned()),
        }
    }
}
