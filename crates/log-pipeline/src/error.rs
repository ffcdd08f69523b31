//! 로그 파이프라인 에러 타입
//!
//! [`LogPipelineError`]는 로그 파이프라인 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<LogPipelineError> for NetwatchError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use netwatch_core::error::{ConfigError, NetwatchError, PipelineError};

/// 로그 파이프라인 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// 추적 대상 로그 파일을 열 수 없음 (기동 실패)
    #[error("failed to open log file {path}: {reason}")]
    Open {
        /// 로그 파일 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl From<LogPipelineError> for NetwatchError {
    fn from(err: LogPipelineError) -> Self {
        match err {
            LogPipelineError::Config { field, reason } => {
                NetwatchError::Config(ConfigError::InvalidValue { field, reason })
            }
            LogPipelineError::Channel(msg) => {
                NetwatchError::Pipeline(PipelineError::ChannelSend(msg))
            }
            LogPipelineError::Io(e) => NetwatchError::Io(e),
            other => NetwatchError::Pipeline(PipelineError::InitFailed(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_error_display() {
        let err = LogPipelineError::Open {
            path: "/var/log/missing.log".to_owned(),
            reason: "No such file or directory".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/var/log/missing.log"));
        assert!(msg.contains("No such file"));
    }

    #[test]
    fn open_error_becomes_init_failure() {
        let err: NetwatchError = LogPipelineError::Open {
            path: "/tmp/a path/that does/not exist".to_owned(),
            reason: "not found".to_owned(),
        }
        .into();
        assert!(matches!(
            err,
            NetwatchError::Pipeline(PipelineError::InitFailed(_))
        ));
    }

    #[test]
    fn config_error_keeps_field() {
        let err: NetwatchError = LogPipelineError::Config {
            field: "poll_interval_ms".to_owned(),
            reason: "must be greater than 0".to_owned(),
        }
        .into();
        assert!(matches!(
            err,
            NetwatchError::Config(ConfigError::InvalidValue { .. })
        ));
        assert!(err.to_string().contains("poll_interval_ms"));
    }

    #[test]
    fn channel_error_converts_to_channel_send() {
        let err: NetwatchError = LogPipelineError::Channel("receiver closed".to_owned()).into();
        assert!(matches!(
            err,
            NetwatchError::Pipeline(PipelineError::ChannelSend(_))
        ));
    }
}
