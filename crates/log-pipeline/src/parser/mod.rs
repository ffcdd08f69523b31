//! 로그 파싱 모듈 -- dnsmasq syslog 라인 분류
//!
//! [`DnsmasqParser`]는 한 라인을 세 가지 패턴 중 하나로 분류합니다.
//! 패턴은 고정된 우선순위로 시도됩니다.
//!
//! 1. DNS query → [`ParsedLine::Query`]
//! 2. DNS reply → [`ParsedLine::Reply`]
//! 3. DHCPACK → [`ParsedLine::Ack`]
//!
//! 어느 패턴과도 일치하지 않는 라인은 `None`이며 에러가 아닙니다.

pub mod dnsmasq;

pub use dnsmasq::{DnsmasqParser, parse_timestamp};

use netwatch_core::event::{DeviceEvent, RequestEvent};

/// 파싱된 라인
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    /// DNS 조회 -- 별칭이 비어 있는 요청
    Query(RequestEvent),
    /// DNS 응답 -- `alias`가 `canonical`로 해석됨
    Reply {
        /// 응답 라인의 이름 (조회된 쪽)
        canonical: String,
        /// `is` 뒤의 값
        alias: String,
    },
    /// DHCP 할당 확인
    Ack(DeviceEvent),
}

impl ParsedLine {
    /// 라인 종류 이름 (로그/메트릭용)
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Query(_) => "query",
            Self::Reply { .. } => "reply",
            Self::Ack(_) => "ack",
        }
    }
}
