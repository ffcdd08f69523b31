//! 로그 파이프라인 설정
//!
//! [`PipelineConfig`]는 core의 [`LogPipelineConfig`](netwatch_core::config::LogPipelineConfig)를
//! 기반으로 로그 파이프라인 전용 설정을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use netwatch_core::config::NetwatchConfig;
//! use netwatch_log_pipeline::config::PipelineConfig;
//!
//! let core_config = NetwatchConfig::default();
//! let config = PipelineConfig::from_core(&core_config.log_pipeline);
//! ```

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LogPipelineError;

/// 폴링 주기 상한 (1분)
const MAX_POLL_INTERVAL_MS: u64 = 60_000;
/// 라인 길이 상한 (1MB)
const MAX_LINE_LENGTH: usize = 1024 * 1024;
/// 채널 용량 상한
const MAX_CHANNEL_CAPACITY: usize = 1_000_000;

/// 로그 파이프라인 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 추적할 로그 파일 경로
    pub log_path: PathBuf,
    /// 파일 폴링 주기 (밀리초)
    pub poll_interval_ms: u64,
    /// 최대 라인 길이 (바이트)
    pub max_line_length: usize,
    /// 이벤트 채널 용량
    pub channel_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_path: PathBuf::from("/var/log/syslog"),
            poll_interval_ms: 250,
            max_line_length: 64 * 1024,
            channel_capacity: 1024,
        }
    }
}

impl PipelineConfig {
    /// core의 `LogPipelineConfig`에서 파이프라인 설정을 생성합니다.
    pub fn from_core(core: &netwatch_core::config::LogPipelineConfig) -> Self {
        Self {
            enabled: core.enabled,
            log_path: PathBuf::from(&core.log_path),
            poll_interval_ms: core.poll_interval_ms,
            max_line_length: core.max_line_length,
            channel_capacity: core.channel_capacity,
        }
    }

    /// 폴링 주기를 `Duration`으로 반환합니다.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// 이벤트 메타데이터에 기록할 스트림 식별자
    pub fn source_label(&self) -> String {
        format!("file:{}", self.log_path.display())
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LogPipelineError> {
        if self.poll_interval_ms == 0 || self.poll_interval_ms > MAX_POLL_INTERVAL_MS {
            return Err(LogPipelineError::Config {
                field: "poll_interval_ms".to_owned(),
                reason: format!("must be 1-{}", MAX_POLL_INTERVAL_MS),
            });
        }

        if self.max_line_length == 0 || self.max_line_length > MAX_LINE_LENGTH {
            return Err(LogPipelineError::Config {
                field: "max_line_length".to_owned(),
                reason: format!("must be 1-{}", MAX_LINE_LENGTH),
            });
        }

        if self.channel_capacity == 0 || self.channel_capacity > MAX_CHANNEL_CAPACITY {
            return Err(LogPipelineError::Config {
                field: "channel_capacity".to_owned(),
                reason: format!("must be 1-{}", MAX_CHANNEL_CAPACITY),
            });
        }

        if self.enabled {
            validate_log_path(&self.log_path)?;
        }

        Ok(())
    }
}

/// 로그 경로 형식을 검증합니다.
///
/// 파일 존재 여부는 여기서 확인하지 않습니다. 존재하지 않는 파일은
/// 파이프라인 초기화 시 [`LogPipelineError::Open`]으로 보고됩니다.
fn validate_log_path(path: &Path) -> Result<(), LogPipelineError> {
    if path.as_os_str().is_empty() {
        return Err(LogPipelineError::Config {
            field: "log_path".to_owned(),
            reason: "log path must not be empty".to_owned(),
        });
    }

    if path.components().any(|c| c == Component::ParentDir) {
        return Err(LogPipelineError::Config {
            field: "log_path".to_owned(),
            reason: format!(
                "log path '{}' contains path traversal pattern '..'",
                path.display()
            ),
        });
    }

    Ok(())
}

/// 파이프라인 설정 빌더
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 활성화 여부를 설정합니다.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// 추적할 로그 파일을 설정합니다.
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.log_path = path.into();
        self
    }

    /// 폴링 주기(밀리초)를 설정합니다.
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// 최대 라인 길이를 설정합니다.
    pub fn max_line_length(mut self, len: usize) -> Self {
        self.config.max_line_length = len;
        self
    }

    /// 이벤트 채널 용량을 설정합니다.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// 설정을 검증하고 `PipelineConfig`를 생성합니다.
    pub fn build(self) -> Result<PipelineConfig, LogPipelineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
