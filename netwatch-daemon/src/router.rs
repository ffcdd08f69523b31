//! Event router -- applies pipeline events to the device store.
//!
//! The router is the single consumer of the `NetworkEvent` channel. It
//! processes each event as soon as it arrives and exits once the channel
//! closes (the log pipeline drops its sender on shutdown).
//!
//! # Policy
//!
//! - Device: upsert unconditionally.
//! - Request for an authorized host: skip before resolving the device.
//! - Request from an unknown address: create a placeholder device.
//! - Request from an ignored device: skip after resolution.
//! - Otherwise: record the visit.
//!
//! Store operations commit to disk, so the loop runs on the blocking pool.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use netwatch_core::error::{NetwatchError, PipelineError};
use netwatch_core::event::{MODULE_EVENT_ROUTER, NetworkEvent, RequestEvent};
use netwatch_core::metrics as m;
use netwatch_core::pipeline::HealthStatus;
use netwatch_core::plugin::{Plugin, PluginInfo, PluginState, PluginType};
use netwatch_store::DeviceStore;

/// How long `stop` waits for the router to drain after the channel closes.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// What the router did with one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// A DHCP acknowledgment created or updated a device.
    DeviceUpserted,
    /// A visit was recorded.
    Recorded {
        /// The source address was unknown and a placeholder was created.
        placeholder: bool,
    },
    /// The requested host is authorized.
    SkippedAuthorized,
    /// The resolved device is ignored.
    SkippedIgnored {
        /// The source address was unknown and a placeholder was created.
        placeholder: bool,
    },
}

/// Apply one event to the store.
pub fn route_event(store: &DeviceStore, event: &NetworkEvent) -> RouteOutcome {
    match event {
        NetworkEvent::Device { event, metadata } => {
            tracing::debug!(trace_id = %metadata.trace_id, device = %event, "routing device");
            store.upsert_device(event.at, &event.hostname, &event.ip, &event.mac);
            RouteOutcome::DeviceUpserted
        }
        NetworkEvent::Request { event, metadata } => {
            tracing::debug!(trace_id = %metadata.trace_id, request = %event, "routing request");
            route_request(store, event)
        }
    }
}

fn route_request(store: &DeviceStore, request: &RequestEvent) -> RouteOutcome {
    if !request.aliases.is_empty() {
        tracing::debug!(host = %request.host, aliases = ?request.aliases, "request aliases");
    }

    if store.is_authorized(&request.host) {
        metrics::counter!(m::ROUTER_REQUESTS_AUTHORIZED_TOTAL).increment(1);
        return RouteOutcome::SkippedAuthorized;
    }

    let (device, placeholder) = match store.find_by_address(&request.source) {
        Some(device) => (device, false),
        None => {
            tracing::info!(source = %request.source, "unrecognized address, creating placeholder device");
            metrics::counter!(m::ROUTER_PLACEHOLDER_DEVICES_TOTAL).increment(1);
            let addr = request.source.as_str();
            (store.upsert_device(None, addr, addr, addr), true)
        }
    };

    if store.is_ignored(&device.mac) {
        metrics::counter!(m::ROUTER_REQUESTS_IGNORED_TOTAL).increment(1);
        return RouteOutcome::SkippedIgnored { placeholder };
    }

    store.record_visit(&device, request.at, &request.host);
    metrics::counter!(m::ROUTER_VISITS_RECORDED_TOTAL).increment(1);
    RouteOutcome::Recorded { placeholder }
}

/// Drain `rx` into the store until the channel closes.
///
/// Returns the number of events processed. Blocks the calling thread.
pub fn run_blocking(store: &DeviceStore, mut rx: mpsc::Receiver<NetworkEvent>) -> u64 {
    let mut processed = 0u64;
    while let Some(event) = rx.blocking_recv() {
        route_event(store, &event);
        processed += 1;
    }
    tracing::info!(processed, "event channel closed, router exiting");
    processed
}

/// Event router plugin.
pub struct EventRouter {
    info: PluginInfo,
    state: PluginState,
    store: Arc<DeviceStore>,
    rx: Option<mpsc::Receiver<NetworkEvent>>,
    task: Option<JoinHandle<u64>>,
}

impl EventRouter {
    /// Create a router consuming `rx`.
    pub fn new(store: Arc<DeviceStore>, rx: mpsc::Receiver<NetworkEvent>) -> Self {
        Self {
            info: PluginInfo::new(
                MODULE_EVENT_ROUTER,
                "applies device and request events to the store",
                PluginType::Router,
            ),
            state: PluginState::Created,
            store,
            rx: Some(rx),
            task: None,
        }
    }

    fn is_consuming(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Plugin for EventRouter {
    fn info(&self) -> &PluginInfo {
        &self.info
    }

    fn state(&self) -> PluginState {
        self.state
    }

    async fn init(&mut self) -> Result<(), NetwatchError> {
        self.state.expect(&self.info.name, PluginState::Created)?;
        self.state = PluginState::Initialized;
        Ok(())
    }

    async fn start(&mut self) -> Result<(), NetwatchError> {
        if self.state == PluginState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }
        self.state.expect(&self.info.name, PluginState::Initialized)?;

        let rx = self
            .rx
            .take()
            .ok_or_else(|| PipelineError::InitFailed("event receiver missing".to_owned()))?;
        let store = Arc::clone(&self.store);
        self.task = Some(tokio::task::spawn_blocking(move || run_blocking(&store, rx)));

        self.state = PluginState::Running;
        tracing::info!("event router started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), NetwatchError> {
        if self.state != PluginState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        if let Some(task) = self.task.take() {
            match tokio::time::timeout(DRAIN_TIMEOUT, task).await {
                Ok(Ok(processed)) => tracing::info!(processed, "event router drained"),
                Ok(Err(e)) => tracing::warn!(error = %e, "event router task panicked"),
                Err(_) => tracing::warn!(
                    timeout_secs = DRAIN_TIMEOUT.as_secs(),
                    "event channel still open, detaching router"
                ),
            }
        }

        self.state = PluginState::Stopped;
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PluginState::Running if self.is_consuming() => HealthStatus::Healthy,
            PluginState::Running => HealthStatus::Degraded("event channel closed".to_owned()),
            PluginState::Created | PluginState::Initialized => {
                HealthStatus::Unhealthy("not started".to_owned())
            }
            PluginState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
            PluginState::Failed => HealthStatus::Unhealthy("failed".to_owned()),
        }
    }
}
