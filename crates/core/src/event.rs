//! 이벤트 시스템: 로그 스트림에서 추출된 구조화 이벤트
//!
//! 로그 파이프라인은 dnsmasq 로그 라인에서 두 종류의 이벤트를 만듭니다.
//!
//! - [`DeviceEvent`]: DHCP ACK 라인. 어떤 장치(MAC)가 어떤 주소(IP)를 받았는지
//! - [`RequestEvent`]: DNS query 라인. 어떤 주소가 어떤 호스트명을 조회했는지
//!
//! 두 이벤트는 로그 순서를 보존하기 위해 [`NetworkEvent`] 하나의 채널로 전달됩니다.

use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- 모듈명 상수 ---

/// 로그 파이프라인 모듈명
pub const MODULE_LOG_PIPELINE: &str = "log-pipeline";
/// 이벤트 라우터 모듈명
pub const MODULE_EVENT_ROUTER: &str = "event-router";
/// 운영자 API 모듈명
pub const MODULE_OPERATOR_API: &str = "operator-api";
/// 다이제스트 내보내기 모듈명
pub const MODULE_DIGEST: &str = "digest-exporter";

/// 이벤트 메타데이터: 어느 스트림에서 언제 수신되었는지
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// 수신 시각 (로그 라인의 타임스탬프와 별개)
    pub received_at: SystemTime,
    /// 스트림 식별자 (예: "file:/var/log/syslog")
    pub source: String,
    /// 추적 ID: 라우터 로그와 파이프라인 로그를 연결합니다
    pub trace_id: String,
}

impl EventMetadata {
    /// 새 trace_id로 메타데이터를 생성합니다.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            received_at: SystemTime::now(),
            source: source.into(),
            trace_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// DHCP ACK에서 관찰된 장치
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEvent {
    /// 로그 라인 타임스탬프 (파싱 실패 시 `None`)
    pub at: Option<DateTime<Utc>>,
    /// 장치가 알린 호스트명
    pub hostname: String,
    /// 하드웨어 주소
    pub mac: String,
    /// 할당된 네트워크 주소
    pub ip: String,
}

impl fmt::Display for DeviceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) at {}", self.hostname, self.mac, self.ip)
    }
}

/// DNS 조회 요청
///
/// `aliases`는 이 요청 직후의 reply 라인에서 발견된 `별칭 -> 정규 호스트명` 매핑입니다.
/// 상관기(correlator)가 요청을 닫은 뒤에 방출하므로 수신 측에서는 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEvent {
    /// 로그 라인 타임스탬프 (파싱 실패 시 `None`)
    pub at: Option<DateTime<Utc>>,
    /// 조회된 호스트명
    pub host: String,
    /// 요청을 보낸 네트워크 주소
    pub source: String,
    /// 별칭 -> 정규 호스트명
    pub aliases: BTreeMap<String, String>,
}

impl RequestEvent {
    /// 별칭이 없는 요청을 생성합니다.
    pub fn new(at: Option<DateTime<Utc>>, host: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            at,
            host: host.into(),
            source: source.into(),
            aliases: BTreeMap::new(),
        }
    }
}

impl fmt::Display for RequestEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {}", self.host, self.source)
    }
}

/// 로그 순서대로 라우터에 전달되는 이벤트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NetworkEvent {
    /// 장치 관찰
    Device {
        metadata: EventMetadata,
        event: DeviceEvent,
    },
    /// DNS 조회
    Request {
        metadata: EventMetadata,
        event: RequestEvent,
    },
}

impl NetworkEvent {
    /// 장치 이벤트를 감쌉니다.
    pub fn device(source: impl Into<String>, event: DeviceEvent) -> Self {
        Self::Device {
            metadata: EventMetadata::new(source),
            event,
        }
    }

    /// 요청 이벤트를 감쌉니다.
    pub fn request(source: impl Into<String>, event: RequestEvent) -> Self {
        Self::Request {
            metadata: EventMetadata::new(source),
            event,
        }
    }

    /// 메타데이터를 반환합니다.
    pub fn metadata(&self) -> &EventMetadata {
        match self {
            Self::Device { metadata, .. } | Self::Request { metadata, .. } => metadata,
        }
    }

    /// 이벤트 종류 이름 ("device" / "request")
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Device { .. } => "device",
            Self::Request { .. } => "request",
        }
    }
}
