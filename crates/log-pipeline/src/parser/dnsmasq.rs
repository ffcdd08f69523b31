//! dnsmasq syslog 라인 파서
//!
//! # 지원 라인 형식
//! ```text
//! May 24 12:00:03 router dnsmasq[126]: query[A] www.example.com from 192.168.0.10
//! May 24 12:00:03 router dnsmasq[126]: reply www.example.com is 93.184.216.34
//! May 24 12:00:00 router dnsmasq-dhcp[123]: DHCPACK(eth0) 192.168.0.10 00:11:22:33:44:55 laptop
//! ```
//!
//! 타임스탬프는 연도가 없는 `MMM D HH:MM:SS` 형식이며, 파싱에 실패해도
//! 라인 전체를 버리지 않고 타임스탬프만 `None`으로 둡니다.

use chrono::{DateTime, Datelike, NaiveDateTime, TimeDelta, Utc};
use netwatch_core::event::{DeviceEvent, RequestEvent};
use regex::Regex;

use super::ParsedLine;
use crate::error::LogPipelineError;

const QUERY_PATTERN: &str =
    r"^(?P<ts>.+) \S+ dnsmasq[^:]*: query\[A\] (?P<host>\S+) from (?P<source>\S+)";
const REPLY_PATTERN: &str = r"^(?P<ts>.+) \S+ dnsmasq[^:]*: reply (?P<name>\S+) is (?P<target>\S+)";
const ACK_PATTERN: &str = r"^(?P<ts>.+) \S+ dnsmasq-dhcp[^:]*: DHCPACK\S* (?P<ip>\S+) (?P<mac>\S+) (?P<hostname>\S+)";

/// 타임스탬프 형식 (연도를 앞에 붙인 뒤 파싱)
const TIMESTAMP_FORMAT: &str = "%Y %b %d %H:%M:%S";

/// dnsmasq 라인 파서
///
/// 상태가 없으므로 여러 상관기가 복제본을 공유해도 됩니다.
#[derive(Debug, Clone)]
pub struct DnsmasqParser {
    query: Regex,
    reply: Regex,
    ack: Regex,
}

impl DnsmasqParser {
    /// 정규식을 컴파일하여 파서를 생성합니다.
    pub fn new() -> Result<Self, LogPipelineError> {
        Ok(Self {
            query: Regex::new(QUERY_PATTERN)?,
            reply: Regex::new(REPLY_PATTERN)?,
            ack: Regex::new(ACK_PATTERN)?,
        })
    }

    /// 현재 시각을 기준으로 라인을 분류합니다.
    pub fn parse(&self, line: &str) -> Option<ParsedLine> {
        self.parse_at(line, Utc::now())
    }

    /// `now`를 기준 시각으로 라인을 분류합니다.
    ///
    /// `now`는 연도가 없는 타임스탬프의 연도를 결정하는 데만 쓰입니다.
    pub fn parse_at(&self, line: &str, now: DateTime<Utc>) -> Option<ParsedLine> {
        if let Some(caps) = self.query.captures(line) {
            return Some(ParsedLine::Query(RequestEvent::new(
                parse_timestamp(&caps["ts"], now),
                &caps["host"],
                &caps["source"],
            )));
        }

        if let Some(caps) = self.reply.captures(line) {
            return Some(ParsedLine::Reply {
                canonical: caps["name"].to_owned(),
                alias: caps["target"].to_owned(),
            });
        }

        if let Some(caps) = self.ack.captures(line) {
            return Some(ParsedLine::Ack(DeviceEvent {
                at: parse_timestamp(&caps["ts"], now),
                hostname: caps["hostname"].to_owned(),
                mac: caps["mac"].to_owned(),
                ip: caps["ip"].to_owned(),
            }));
        }

        None
    }
}

/// BSD syslog 타임스탬프를 파싱합니다.
///
/// 형식: `MMM D HH:MM:SS` (예: `Jan  2 15:04:05`)
/// 연도 정보가 없으므로 `now`의 연도를 가정하고, 그 결과가 `now`보다
/// 하루 이상 미래라면 (연말 로그를 연초에 읽는 경우) 전년도로 해석합니다.
pub fn parse_timestamp(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    // syslog는 한 자리 날짜를 공백으로 패딩함 ("Jan  2")
    let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    let at = with_year(&normalized, now.year())?;
    if at > now + TimeDelta::days(1) {
        with_year(&normalized, now.year() - 1)
    } else {
        Some(at)
    }
}

fn with_year(timestamp: &str, year: i32) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(&format!("{} {}", year, timestamp), TIMESTAMP_FORMAT)
        .ok()
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn parser() -> DnsmasqParser {
        DnsmasqParser::new().unwrap()
    }

    #[test]
    fn parse_query_line() {
        let line = "May 24 12:00:03 something dnsmasq[126]: query[A] www.google.com from 192.168.0.0";
        let parsed = parser().parse_at(line, now()).unwrap();

        let ParsedLine::Query(request) = parsed else {
            panic!("expected query, got {parsed:?}");
        };
        assert_eq!(request.host, "www.google.com");
        assert_eq!(request.source, "192.168.0.0");
        assert!(request.aliases.is_empty());
        assert_eq!(
            request.at,
            Some(Utc.with_ymd_and_hms(2024, 5, 24, 12, 0, 3).unwrap())
        );
    }

    #[test]
    fn parse_reply_line() {
        let line = "May 24 12:00:03 something dnsmasq[126]: reply www.google.com is 142.250.74.36";
        let parsed = parser().parse_at(line, now()).unwrap();
        assert_eq!(
            parsed,
            ParsedLine::Reply {
                canonical: "www.google.com".to_owned(),
                alias: "142.250.74.36".to_owned(),
            }
        );
        assert_eq!(parsed.kind(), "reply");
    }

    #[test]
    fn parse_ack_line() {
        let line = "May 24 12:00:00 something dnsmasq-dhcp[123]: DHCPACK(eth0) 192.168.0.0 00:11:22:33:44:55 host1";
        let parsed = parser().parse_at(line, now()).unwrap();

        let ParsedLine::Ack(device) = parsed else {
            panic!("expected ack, got {parsed:?}");
        };
        assert_eq!(device.ip, "192.168.0.0");
        assert_eq!(device.mac, "00:11:22:33:44:55");
        assert_eq!(device.hostname, "host1");
        assert!(device.at.is_some());
    }

    #[test]
    fn unrelated_lines_yield_nothing() {
        let p = parser();
        for line in [
            "",
            "May 24 12:00:00 something kernel: eth0: link up",
            "May 24 12:00:00 something dnsmasq[1]: cached www.google.com is 1.2.3.4",
            "May 24 12:00:00 something dnsmasq[1]: forwarded www.google.com to 8.8.8.8",
            "May 24 12:00:00 something dnsmasq-dhcp[1]: DHCPREQUEST(eth0) 192.168.0.4 00:11:22:33:44:55",
            "May 24 12:00:00 something dnsmasq-dhcp[1]: DHCPACK(eth0) 192.168.0.4 00:11:22:33:44:55",
        ] {
            assert_eq!(p.parse_at(line, now()), None, "line: {line:?}");
        }
    }

    #[test]
    fn aaaa_queries_are_not_requests() {
        let line = "May 24 12:00:03 something dnsmasq[126]: query[AAAA] www.google.com from 192.168.0.0";
        assert_eq!(parser().parse_at(line, now()), None);
    }

    #[test]
    fn invalid_timestamp_still_yields_event() {
        let line = "Foo 99 xx:yy:zz something dnsmasq[126]: query[A] www.google.com from 192.168.0.0";
        let Some(ParsedLine::Query(request)) = parser().parse_at(line, now()) else {
            panic!("expected query");
        };
        assert_eq!(request.at, None);
        assert_eq!(request.host, "www.google.com");
    }

    #[test]
    fn non_ascii_hostname_is_preserved() {
        let line = "May 24 12:00:00 something dnsmasq-dhcp[123]: DHCPACK(eth0) 192.168.0.9 00:11:22:33:44:99 café-laptop";
        let Some(ParsedLine::Ack(device)) = parser().parse_at(line, now()) else {
            panic!("expected ack");
        };
        assert_eq!(device.hostname, "café-laptop");
    }

    #[test]
    fn timestamp_with_padded_day() {
        let at = parse_timestamp("Jan  2 15:04:05", now()).unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2024, 1, 2, 15, 4, 5).unwrap());
    }

    #[test]
    fn timestamp_in_future_rolls_back_a_year() {
        let new_year = Utc.with_ymd_and_hms(2025, 1, 1, 0, 10, 0).unwrap();
        let at = parse_timestamp("Dec 31 23:59:58", new_year).unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 58).unwrap());
    }

    #[test]
    fn timestamp_slightly_ahead_keeps_current_year() {
        // 로그 호스트 시계가 약간 앞선 경우
        let at = parse_timestamp("Jun  1 12:30:00", now()).unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap());
    }

    #[test]
    fn timestamp_garbage_is_none() {
        assert_eq!(parse_timestamp("not a time", now()), None);
        assert_eq!(parse_timestamp("May 32 12:00:00", now()), None);
    }
}
