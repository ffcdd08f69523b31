//! 에러 타입: 도메인별 에러 정의
//!
//! 하위 크레이트의 도메인 에러(`LogPipelineError`, `StoreError`)는
//! `From` 구현을 통해 [`NetwatchError`]로 변환되어 `?`로 전파됩니다.

/// netwatch 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum NetwatchError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 스토리지 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// 플러그인 생명주기 에러
    #[error("plugin error: {0}")]
    Plugin(#[from] PluginError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 채널 수신 실패
    #[error("channel receive failed: {0}")]
    ChannelRecv(String),

    /// 파이프라인 초기화 실패 (로그 파일 열기 실패 등)
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 이미 실행 중
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline not running")]
    NotRunning,
}

/// 스토리지 에러
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 백엔드 저장소를 열 수 없음 (기동 실패)
    #[error("failed to open store at {path}: {reason}")]
    Open { path: String, reason: String },

    /// 개별 읽기/쓰기 실패
    #[error("store operation failed: {0}")]
    Backend(String),
}

/// 플러그인 생명주기 에러
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// 같은 이름의 플러그인이 이미 등록됨
    #[error("plugin already registered: {name}")]
    AlreadyRegistered { name: String },

    /// 플러그인을 찾을 수 없음
    #[error("plugin not found: {name}")]
    NotFound { name: String },

    /// 허용되지 않는 상태 전환
    #[error("invalid state for plugin '{name}': {current}, expected {expected}")]
    InvalidState {
        name: String,
        current: String,
        expected: String,
    },

    /// 하나 이상의 플러그인 정지 실패
    #[error("failed to stop plugins: {0}")]
    StopFailed(String),
}
