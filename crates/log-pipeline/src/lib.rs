#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`parser`]: dnsmasq 라인 파서 (query / reply / DHCPACK)
//! - [`correlator`]: query-reply 상관 및 이벤트 방출
//! - [`collector`]: 파일 추적기 (tail -f 방식, 로테이션 감지)
//! - [`pipeline`]: 전체 파이프라인 오케스트레이션 (Plugin trait 구현)
//! - [`config`]: 파이프라인 설정 (core 설정 확장)
//! - [`error`]: 도메인 에러 타입

pub mod collector;
pub mod config;
pub mod correlator;
pub mod error;
pub mod parser;
pub mod pipeline;

// --- 주요 타입 re-export ---

pub use collector::FileTailer;
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use correlator::Correlator;
pub use error::LogPipelineError;
pub use parser::{DnsmasqParser, ParsedLine};
pub use pipeline::{LogPipeline, LogPipelineBuilder};
