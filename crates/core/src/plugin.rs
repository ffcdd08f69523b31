//! 플러그인 시스템: 모듈 등록과 생명주기 관리
//!
//! 데몬의 각 런타임 구성요소(로그 파이프라인, 이벤트 라우터, 운영자 API,
//! 다이제스트 내보내기)는 [`Plugin`]을 구현하고 [`PluginRegistry`]에 등록됩니다.
//!
//! # 생명주기
//! ```text
//! Created → init() → Initialized → start() → Running → stop() → Stopped
//! ```

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::{NetwatchError, PluginError};
use crate::pipeline::{BoxFuture, HealthStatus};

/// 플러그인 유형
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginType {
    /// 로그 수집/상관 파이프라인 (이벤트 생산자)
    LogPipeline,
    /// 이벤트를 저장소에 반영하는 라우터 (이벤트 소비자)
    Router,
    /// 운영자용 HTTP 인터페이스
    Api,
    /// 주기적 다이제스트 내보내기
    Exporter,
}

impl fmt::Display for PluginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LogPipeline => write!(f, "log-pipeline"),
            Self::Router => write!(f, "router"),
            Self::Api => write!(f, "api"),
            Self::Exporter => write!(f, "exporter"),
        }
    }
}

/// 플러그인 메타데이터
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginInfo {
    /// 플러그인 고유 이름 (예: `"log-pipeline"`)
    pub name: String,
    /// 플러그인 버전
    pub version: String,
    /// 플러그인 설명
    pub description: String,
    /// 플러그인 유형
    pub plugin_type: PluginType,
}

impl PluginInfo {
    /// 크레이트 버전을 사용하는 메타데이터를 생성합니다.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        plugin_type: PluginType,
    ) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            description: description.into(),
            plugin_type,
        }
    }
}

/// 플러그인 생명주기 상태
///
/// 상태 전환:
/// - `Created` → `init()` → `Initialized`
/// - `Initialized` → `start()` → `Running`
/// - `Running` → `stop()` → `Stopped`
/// - 에러 발생 시 → `Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginState {
    /// 생성됨 (init 전)
    Created,
    /// 초기화 완료 (start 가능)
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
    /// 오류 상태
    Failed,
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Initialized => write!(f, "initialized"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl PluginState {
    /// 현재 상태가 기대 상태가 아니면 `InvalidState` 에러를 반환합니다.
    pub fn expect(self, name: &str, expected: PluginState) -> Result<(), PluginError> {
        if self == expected {
            Ok(())
        } else {
            Err(PluginError::InvalidState {
                name: name.to_owned(),
                current: self.to_string(),
                expected: expected.to_string(),
            })
        }
    }
}

/// 모든 런타임 구성요소가 구현하는 플러그인 trait
pub trait Plugin: Send + Sync {
    /// 플러그인 메타데이터를 반환합니다.
    fn info(&self) -> &PluginInfo;

    /// 현재 플러그인 상태를 반환합니다.
    fn state(&self) -> PluginState;

    /// 플러그인을 초기화합니다.
    ///
    /// 입력 파일/저장소 열기처럼 실패하면 기동 자체가 불가능한 작업을 수행합니다.
    fn init(&mut self) -> impl Future<Output = Result<(), NetwatchError>> + Send;

    /// 백그라운드 태스크를 시작합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), NetwatchError>> + Send;

    /// 백그라운드 태스크를 정지합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), NetwatchError>> + Send;

    /// 플러그인의 건강 상태를 확인합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// [`Plugin`]의 박싱된 형태
///
/// RPITIT 메서드는 trait 객체로 쓸 수 없으므로 레지스트리는 이 trait으로 보관합니다.
/// 모든 [`Plugin`] 구현은 blanket impl로 자동 제공됩니다.
pub trait DynPlugin: Send + Sync {
    fn info(&self) -> &PluginInfo;
    fn state(&self) -> PluginState;
    fn init(&mut self) -> BoxFuture<'_, Result<(), NetwatchError>>;
    fn start(&mut self) -> BoxFuture<'_, Result<(), NetwatchError>>;
    fn stop(&mut self) -> BoxFuture<'_, Result<(), NetwatchError>>;
    fn health_check(&self) -> BoxFuture<'_, HealthStatus>;
}

impl<T: Plugin> DynPlugin for T {
    fn info(&self) -> &PluginInfo {
        Plugin::info(self)
    }

    fn state(&self) -> PluginState {
        Plugin::state(self)
    }

    fn init(&mut self) -> BoxFuture<'_, Result<(), NetwatchError>> {
        Box::pin(Plugin::init(self))
    }

    fn start(&mut self) -> BoxFuture<'_, Result<(), NetwatchError>> {
        Box::pin(Plugin::start(self))
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<(), NetwatchError>> {
        Box::pin(Plugin::stop(self))
    }

    fn health_check(&self) -> BoxFuture<'_, HealthStatus> {
        Box::pin(Plugin::health_check(self))
    }
}

/// 플러그인 레지스트리
///
/// 등록 순서가 보존되며, 생산자를 먼저 등록하고 소비자를 나중에 등록합니다.
/// 정지도 같은 순서로 진행되므로 소비자는 생산자가 닫은 채널을 끝까지 비울 수 있습니다.
pub struct PluginRegistry {
    plugins: Vec<Box<dyn DynPlugin>>,
}

impl PluginRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    /// 플러그인을 등록합니다.
    ///
    /// 동일한 이름의 플러그인이 이미 등록되어 있으면 에러를 반환합니다.
    pub fn register(&mut self, plugin: Box<dyn DynPlugin>) -> Result<(), NetwatchError> {
        let name = plugin.info().name.clone();
        if self.plugins.iter().any(|p| p.info().name == name) {
            return Err(PluginError::AlreadyRegistered { name }.into());
        }
        self.plugins.push(plugin);
        Ok(())
    }

    /// 이름으로 플러그인을 조회합니다.
    pub fn get(&self, name: &str) -> Option<&dyn DynPlugin> {
        self.plugins
            .iter()
            .find(|p| p.info().name == name)
            .map(|p| p.as_ref())
    }

    /// 모든 플러그인을 등록 순서대로 초기화합니다 (fail-fast).
    pub async fn init_all(&mut self) -> Result<(), NetwatchError> {
        for plugin in &mut self.plugins {
            plugin.init().await?;
        }
        Ok(())
    }

    /// 모든 플러그인을 등록 순서대로 시작합니다 (fail-fast).
    ///
    /// 이미 시작된 플러그인은 롤백하지 않으므로, 호출자가 `stop_all`을 호출해야 합니다.
    pub async fn start_all(&mut self) -> Result<(), NetwatchError> {
        for plugin in &mut self.plugins {
            plugin.start().await?;
        }
        Ok(())
    }

    /// 실행 중인 플러그인을 등록 순서대로 정지합니다.
    ///
    /// 개별 정지 실패 시에도 나머지 정지를 계속하고, 에러를 모아 반환합니다.
    pub async fn stop_all(&mut self) -> Result<(), NetwatchError> {
        let mut errors = Vec::new();
        for plugin in &mut self.plugins {
            if plugin.state() != PluginState::Running {
                continue;
            }
            if let Err(e) = plugin.stop().await {
                errors.push(format!("{}: {}", plugin.info().name, e));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(PluginError::StopFailed(errors.join("; ")).into())
        }
    }

    /// 등록된 플러그인 수를 반환합니다.
    pub fn count(&self) -> usize {
        self.plugins.len()
    }

    /// 등록 순서대로 플러그인 정보
    pub fn list(&self) -> Vec<&PluginInfo> {
        self.plugins.iter().map(|p| p.info()).collect()
    }

    /// 등록 순서대로 `(이름, 상태, 건강)`을 수집합니다.
    pub async fn health_check_all(&self) -> Vec<(String, PluginState, HealthStatus)> {
        let mut report = Vec::with_capacity(self.plugins.len());
        for plugin in &self.plugins {
            let health = plugin.health_check().await;
            report.push((plugin.info().name.clone(), plugin.state(), health));
        }
        report
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}
