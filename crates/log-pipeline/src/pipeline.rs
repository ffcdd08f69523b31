//! 파이프라인 오케스트레이션 -- 추적/파싱/상관의 전체 흐름을 관리합니다.
//!
//! [`LogPipeline`]은 core의 [`Plugin`] trait을 구현하여
//! `netwatch-daemon`에서 다른 모듈과 동일한 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! FileTailer -> Correlator(DnsmasqParser) -> mpsc<NetworkEvent> -> downstream
//! ```

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use netwatch_core::error::{NetwatchError, PipelineError};
use netwatch_core::event::{MODULE_LOG_PIPELINE, NetworkEvent};
use netwatch_core::pipeline::HealthStatus;
use netwatch_core::plugin::{Plugin, PluginInfo, PluginState, PluginType};

use crate::collector::FileTailer;
use crate::config::PipelineConfig;
use crate::correlator::Correlator;
use crate::error::LogPipelineError;
use crate::parser::DnsmasqParser;

/// 로그 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use netwatch_log_pipeline::LogPipelineBuilder;
///
/// let (mut pipeline, event_rx) = LogPipelineBuilder::new()
///     .config(config)
///     .build()?;
///
/// pipeline.init().await?;   // 로그 파일 열기 (없으면 기동 실패)
/// pipeline.start().await?;
/// ```
pub struct LogPipeline {
    info: PluginInfo,
    config: PipelineConfig,
    state: PluginState,
    parser: DnsmasqParser,
    /// 이벤트 전송 채널 (start 시 추적 태스크로 이동)
    event_tx: Option<mpsc::Sender<NetworkEvent>>,
    /// init에서 연 추적기 (start 시 태스크로 이동)
    tailer: Option<FileTailer>,
    cancel: CancellationToken,
    task: Option<JoinHandle<Result<(), LogPipelineError>>>,
}

impl LogPipeline {
    /// 파이프라인 설정을 반환합니다.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 추적 태스크가 아직 실행 중인지 확인합니다.
    pub fn is_tailing(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Plugin for LogPipeline {
    fn info(&self) -> &PluginInfo {
        &self.info
    }

    fn state(&self) -> PluginState {
        self.state
    }

    async fn init(&mut self) -> Result<(), NetwatchError> {
        self.state.expect(&self.info.name, PluginState::Created)?;

        match FileTailer::open(&self.config.log_path, self.config.max_line_length).await {
            Ok(tailer) => {
                self.tailer = Some(tailer);
                self.state = PluginState::Initialized;
                Ok(())
            }
            Err(e) => {
                self.state = PluginState::Failed;
                Err(e.into())
            }
        }
    }

    async fn start(&mut self) -> Result<(), NetwatchError> {
        if self.state == PluginState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }
        self.state.expect(&self.info.name, PluginState::Initialized)?;

        let (Some(tailer), Some(tx)) = (self.tailer.take(), self.event_tx.take()) else {
            return Err(PipelineError::InitFailed("tailer or event channel missing".to_owned()).into());
        };

        tracing::info!(path = %self.config.log_path.display(), "starting log pipeline");

        let correlator = Correlator::new(self.parser.clone(), self.config.source_label());
        let task = tokio::spawn(tailer.run(
            self.config.poll_interval(),
            correlator,
            tx,
            self.cancel.clone(),
        ));
        self.task = Some(task);

        self.state = PluginState::Running;
        tracing::info!("log pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), NetwatchError> {
        if self.state != PluginState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        tracing::info!("stopping log pipeline");
        self.cancel.cancel();

        if let Some(task) = self.task.take() {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "log tailer exited with error"),
                Err(e) => tracing::warn!(error = %e, "log tailer task panicked"),
            }
        }

        self.state = PluginState::Stopped;
        tracing::info!("log pipeline stopped");
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PluginState::Running if self.is_tailing() => HealthStatus::Healthy,
            PluginState::Running => HealthStatus::Unhealthy("log tailer exited".to_owned()),
            PluginState::Created | PluginState::Initialized => {
                HealthStatus::Unhealthy("not started".to_owned())
            }
            PluginState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
            PluginState::Failed => HealthStatus::Unhealthy("failed to open log file".to_owned()),
        }
    }
}

/// 로그 파이프라인 빌더
///
/// 파이프라인을 구성하고 필요한 채널을 생성합니다.
pub struct LogPipelineBuilder {
    config: PipelineConfig,
    event_tx: Option<mpsc::Sender<NetworkEvent>>,
}

impl LogPipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            event_tx: None,
        }
    }

    /// 파이프라인 설정을 지정합니다.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// 외부 이벤트 전송 채널을 설정합니다.
    ///
    /// 설정하지 않으면 빌더가 `channel_capacity` 용량의 새 채널을 생성합니다.
    pub fn event_sender(mut self, tx: mpsc::Sender<NetworkEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// 파이프라인을 빌드합니다.
    ///
    /// # Returns
    /// - `LogPipeline`: 파이프라인 인스턴스
    /// - `Option<mpsc::Receiver<NetworkEvent>>`: 이벤트 수신 채널
    ///   (외부 event_sender를 설정한 경우 None)
    pub fn build(
        self,
    ) -> Result<(LogPipeline, Option<mpsc::Receiver<NetworkEvent>>), LogPipelineError> {
        self.config.validate()?;

        let (event_tx, event_rx) = match self.event_tx {
            Some(tx) => (tx, None),
            None => {
                let (tx, rx) = mpsc::channel(self.config.channel_capacity);
                (tx, Some(rx))
            }
        };

        let pipeline = LogPipeline {
            info: PluginInfo::new(
                MODULE_LOG_PIPELINE,
                "dnsmasq log tailer and query/reply correlator",
                PluginType::LogPipeline,
            ),
            config: self.config,
            state: PluginState::Created,
            parser: DnsmasqParser::new()?,
            event_tx: Some(event_tx),
            tailer: None,
            cancel: CancellationToken::new(),
            task: None,
        };

        Ok((pipeline, event_rx))
    }
}

impl Default for LogPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
