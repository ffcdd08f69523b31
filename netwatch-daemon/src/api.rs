//! Operator HTTP API.
//!
//! Thin CRUD surface over the device store, served with `axum`:
//!
//! | Method | Path | Response |
//! |--------|------|----------|
//! | GET | `/` | welcome text |
//! | GET | `/health` | latest [`DaemonHealth`] |
//! | GET | `/authorized-hosts` | sorted host list |
//! | POST | `/authorized-hosts/add?host=` | updated host list |
//! | POST | `/authorized-hosts/remove?host=` | updated host list |
//! | GET | `/ignored-devices` | sorted MAC list |
//! | POST | `/ignored-devices/add?mac=` | updated MAC list |
//! | POST | `/ignored-devices/remove?mac=` | updated MAC list |
//! | GET | `/latest` | [`Digest`] without consuming visits |
//!
//! Store calls commit to disk or wait on store locks, so handlers run them on
//! the blocking pool through [`with_store`].
//!
//! The listener is bound in `start`, so a bind failure is a startup error.
//! Shutdown is graceful on the plugin's cancellation token.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use netwatch_core::config::HttpConfig;
use netwatch_core::error::{NetwatchError, PipelineError};
use netwatch_core::event::MODULE_OPERATOR_API;
use netwatch_core::pipeline::HealthStatus;
use netwatch_core::plugin::{Plugin, PluginInfo, PluginState, PluginType};
use netwatch_store::DeviceStore;

use crate::digest::Digest;
use crate::health::DaemonHealth;

/// Text served on `/`.
pub const WELCOME: &str = "Welcome to netwatch";

/// Shared handler state.
#[derive(Clone)]
pub struct ApiState {
    /// Device store.
    pub store: Arc<DeviceStore>,
    /// URL included in `/latest` responses.
    pub public_url: String,
    /// Latest health report published by the orchestrator.
    pub health: watch::Receiver<DaemonHealth>,
}

#[derive(Debug, Deserialize)]
struct HostParams {
    #[serde(default)]
    host: String,
}

#[derive(Debug, Deserialize)]
struct MacParams {
    #[serde(default)]
    mac: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

fn required(name: &str, value: &str) -> Result<String, (StatusCode, String)> {
    let value = value.trim();
    if value.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("missing query parameter '{name}'"),
        ));
    }
    Ok(value.to_owned())
}

/// Build the API router.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(|| async { WELCOME }))
        .route("/health", get(get_health))
        .route("/authorized-hosts", get(get_authorized_hosts))
        .route("/authorized-hosts/add", post(add_authorized_host))
        .route("/authorized-hosts/remove", post(remove_authorized_host))
        .route("/ignored-devices", get(get_ignored_devices))
        .route("/ignored-devices/add", post(add_ignored_device))
        .route("/ignored-devices/remove", post(remove_ignored_device))
        .route("/latest", get(get_latest))
        .with_state(state)
}

async fn get_health(State(api): State<ApiState>) -> Json<DaemonHealth> {
    Json(api.health.borrow().clone())
}

/// Run `f` against the store on the blocking pool.
async fn with_store<T, F>(store: &Arc<DeviceStore>, f: F) -> Result<T, (StatusCode, String)>
where
    T: Send + 'static,
    F: FnOnce(&DeviceStore) -> T + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || f(&store))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "store task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "store task failed".to_owned())
        })
}

async fn get_authorized_hosts(State(api): State<ApiState>) -> ApiResult<Vec<String>> {
    with_store(&api.store, |store| store.authorized_hosts()).await.map(Json)
}

async fn add_authorized_host(
    State(api): State<ApiState>,
    Query(params): Query<HostParams>,
) -> ApiResult<Vec<String>> {
    let host = required("host", &params.host)?;
    with_store(&api.store, move |store| {
        store.authorize(&host);
        store.authorized_hosts()
    })
    .await
    .map(Json)
}

async fn remove_authorized_host(
    State(api): State<ApiState>,
    Query(params): Query<HostParams>,
) -> ApiResult<Vec<String>> {
    let host = required("host", &params.host)?;
    with_store(&api.store, move |store| {
        store.deauthorize(&host);
        store.authorized_hosts()
    })
    .await
    .map(Json)
}

async fn get_ignored_devices(State(api): State<ApiState>) -> ApiResult<Vec<String>> {
    with_store(&api.store, |store| store.ignored_devices()).await.map(Json)
}

async fn add_ignored_device(
    State(api): State<ApiState>,
    Query(params): Query<MacParams>,
) -> ApiResult<Vec<String>> {
    let mac = required("mac", &params.mac)?;
    with_store(&api.store, move |store| {
        store.ignore(&mac);
        store.ignored_devices()
    })
    .await
    .map(Json)
}

async fn remove_ignored_device(
    State(api): State<ApiState>,
    Query(params): Query<MacParams>,
) -> ApiResult<Vec<String>> {
    let mac = required("mac", &params.mac)?;
    with_store(&api.store, move |store| {
        store.unignore(&mac);
        store.ignored_devices()
    })
    .await
    .map(Json)
}

async fn get_latest(State(api): State<ApiState>) -> ApiResult<Digest> {
    let url = api.public_url.clone();
    with_store(&api.store, move |store| Digest::capture(store, &url, false))
        .await
        .map(Json)
}

/// Operator API plugin.
pub struct OperatorApi {
    info: PluginInfo,
    state: PluginState,
    config: HttpConfig,
    api_state: ApiState,
    local_addr: Option<SocketAddr>,
    cancel: CancellationToken,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl OperatorApi {
    /// Create the API plugin.
    pub fn new(
        config: HttpConfig,
        store: Arc<DeviceStore>,
        health: watch::Receiver<DaemonHealth>,
    ) -> Self {
        let api_state = ApiState {
            store,
            public_url: config.public_url.clone(),
            health,
        };
        Self {
            info: PluginInfo::new(
                MODULE_OPERATOR_API,
                "operator HTTP API over the device store",
                PluginType::Api,
            ),
            state: PluginState::Created,
            config,
            api_state,
            local_addr: None,
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    /// Address the listener is bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

impl Plugin for OperatorApi {
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

        let listener = match tokio::net::TcpListener::bind(&self.config.bind).await {
            Ok(listener) => listener,
            Err(e) => {
                self.state = PluginState::Failed;
                return Err(PipelineError::InitFailed(format!(
                    "failed to bind operator API on {}: {}",
                    self.config.bind, e
                ))
                .into());
            }
        };
        let addr = listener.local_addr()?;
        self.local_addr = Some(addr);

        let app = build_router(self.api_state.clone());
        let cancel = self.cancel.clone();
        self.task = Some(tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { cancel.cancelled().await })
                .await
        }));

        self.state = PluginState::Running;
        tracing::info!(listen_addr = %addr, "operator API listening");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), NetwatchError> {
        if self.state != PluginState::Running {
            return Err(PipelineError::NotRunning.into());
        }
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "operator API exited with error"),
                Err(e) => tracing::warn!(error = %e, "operator API task panicked"),
            }
        }
        self.state = PluginState::Stopped;
        tracing::info!("operator API stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PluginState::Running if self.task.as_ref().is_some_and(|t| !t.is_finished()) => {
                HealthStatus::Healthy
            }
            PluginState::Running => HealthStatus::Unhealthy("server exited".to_owned()),
            PluginState::Created | PluginState::Initialized => {
                HealthStatus::Unhealthy("not started".to_owned())
            }
            PluginState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
            PluginState::Failed => HealthStatus::Unhealthy("failed to bind".to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_state() -> (tempfile::TempDir, ApiState) {
        let dir = tempfile::tempdir().unwrap();
        let store = DeviceStore::open(dir.path().join("network-log.db")).unwrap();
        let (_tx, health) = watch::channel(DaemonHealth::starting());
        let state = ApiState {
            store: Arc::new(store),
            public_url: "http://netwatch.lan".to_owned(),
            health,
        };
        (dir, state)
    }

    #[tokio::test]
    async fn add_and_remove_authorized_host() {
        let (_dir, state) = api_state();

        let Json(hosts) = add_authorized_host(
            State(state.clone()),
            Query(HostParams {
                host: "www.example.com".to_owned(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(hosts, vec!["www.example.com"]);

        let Json(hosts) = remove_authorized_host(
            State(state.clone()),
            Query(HostParams {
                host: "www.example.com".to_owned(),
            }),
        )
        .await
        .unwrap();
        assert!(hosts.is_empty());
    }

    #[tokio::test]
    async fn empty_parameter_is_bad_request() {
        let (_dir, state) = api_state();
        let err = add_ignored_device(State(state), Query(MacParams { mac: "  ".to_owned() }))
            .await
            .unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert!(err.1.contains("mac"));
    }

    #[tokio::test]
    async fn latest_does_not_consume_visits() {
        let (_dir, state) = api_state();
        let device = state
            .store
            .upsert_device(None, "laptop", "10.0.0.2", "aa:aa:aa:aa:aa:aa");
        state.store.record_visit(&device, None, "example.com");

        let Json(first) = get_latest(State(state.clone())).await.unwrap();
        let Json(second) = get_latest(State(state)).await.unwrap();

        assert_eq!(first.public_url, "http://netwatch.lan");
        assert_eq!(first.visit_count(), 1);
        assert_eq!(second.visit_count(), 1);
    }

    #[tokio::test]
    async fn health_serves_published_report() {
        let (_dir, state) = api_state();
        let Json(report) = get_health(State(state)).await;
        assert!(!report.status.is_healthy());
        assert_eq!(report.uptime_secs, 0);
    }

    #[tokio::test]
    async fn plugin_binds_and_stops() {
        let (_dir, state) = api_state();
        let config = HttpConfig {
            bind: "127.0.0.1:0".to_owned(),
            ..Default::default()
        };
        let mut api = OperatorApi::new(config, state.store, state.health);

        Plugin::init(&mut api).await.unwrap();
        Plugin::start(&mut api).await.unwrap();
        assert!(api.local_addr().is_some_and(|a| a.port() != 0));
        assert!(Plugin::health_check(&api).await.is_healthy());

        Plugin::stop(&mut api).await.unwrap();
        assert_eq!(Plugin::state(&api), PluginState::Stopped);
    }

    #[tokio::test]
    async fn bind_failure_is_startup_error() {
        let (_dir, state) = api_state();
        let config = HttpConfig {
            bind: "not-an-address".to_owned(),
            ..Default::default()
        };
        let mut api = OperatorApi::new(config, state.store, state.health);

        Plugin::init(&mut api).await.unwrap();
        assert!(Plugin::start(&mut api).await.is_err());
        assert_eq!(Plugin::state(&api), PluginState::Failed);
    }
}
