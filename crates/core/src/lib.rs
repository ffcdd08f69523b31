#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod pipeline;
pub mod plugin;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{ConfigError, NetwatchError, PipelineError, PluginError, StorageError};

// 설정
pub use config::NetwatchConfig;

// 이벤트
pub use event::{DeviceEvent, EventMetadata, NetworkEvent, RequestEvent};

// 파이프라인 / 플러그인
pub use pipeline::{BoxFuture, HealthStatus};
pub use plugin::{DynPlugin, Plugin, PluginInfo, PluginRegistry, PluginState, PluginType};
