//! query/reply 상관기
//!
//! dnsmasq는 query 라인을 먼저 기록하고, 그 직후 0개 이상의 reply 라인을 기록합니다.
//! [`Correlator`]는 reply 라인의 별칭을 직전 요청에 붙이고,
//! 요청이 닫힌 뒤에야 완성된 [`NetworkEvent::Request`]로 방출합니다.
//!
//! 요청이 닫히는 시점:
//! - 다음 query 라인
//! - [`Correlator::flush`] 호출 (유휴 폴링 또는 스트림 종료)
//!
//! DHCPACK 라인은 상관 상태와 무관하게 즉시 장치 이벤트로 방출되며, 대기 중인 요청은
//! 열린 채로 남아 이후의 reply 라인을 계속 받습니다.
//!
//! 상관 상태는 스트림 순서에 의존하므로 로그 스트림 하나당 인스턴스 하나를 사용합니다.

use netwatch_core::event::{NetworkEvent, RequestEvent};
use tracing::{debug, trace};

use crate::parser::{DnsmasqParser, ParsedLine};

/// 단일 로그 스트림용 상관기
pub struct Correlator {
    parser: DnsmasqParser,
    /// 이벤트 메타데이터에 기록할 스트림 식별자
    source: String,
    /// 아직 닫히지 않은 요청
    pending: Option<RequestEvent>,
}

impl Correlator {
    /// 새 상관기를 생성합니다.
    pub fn new(parser: DnsmasqParser, source: impl Into<String>) -> Self {
        Self {
            parser,
            source: source.into(),
            pending: None,
        }
    }

    /// 라인 하나를 처리하고 방출할 이벤트를 로그 순서대로 반환합니다.
    pub fn feed(&mut self, line: &str) -> Vec<NetworkEvent> {
        let Some(parsed) = self.parser.parse(line) else {
            return Vec::new();
        };
        self.apply(parsed)
    }

    /// 이미 파싱된 라인을 처리합니다.
    pub fn apply(&mut self, parsed: ParsedLine) -> Vec<NetworkEvent> {
        let mut out = Vec::with_capacity(2);
        match parsed {
            ParsedLine::Query(request) => {
                trace!(host = %request.host, source = %request.source, "query");
                out.extend(self.flush());
                self.pending = Some(request);
            }
            ParsedLine::Reply { canonical, alias } => match self.pending.as_mut() {
                Some(request) => {
                    request.aliases.insert(alias, canonical);
                }
                None => {
                    debug!(
                        canonical = %canonical,
                        alias = %alias,
                        "reply without preceding query, dropping"
                    );
                }
            },
            ParsedLine::Ack(device) => {
                debug!(device = %device, "found device");
                out.push(NetworkEvent::device(&self.source, device));
            }
        }
        out
    }

    /// 대기 중인 요청을 닫고 방출합니다.
    pub fn flush(&mut self) -> Option<NetworkEvent> {
        let request = self.pending.take()?;
        debug!(request = %request, aliases = request.aliases.len(), "found request");
        Some(NetworkEvent::request(&self.source, request))
    }

    /// 닫히지 않은 요청이 있는지 확인합니다.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}
