//! 장치/방문 데이터 모델

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 한 장치가 특정 호스트를 조회한 기록
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostVisit {
    /// 조회된 호스트명
    pub host: String,
    /// 방문 시각 (기록 순서, 타임스탬프 파싱 실패 시 `None`)
    pub times: Vec<Option<DateTime<Utc>>>,
}

impl HostVisit {
    /// 방문 기록이 없는 항목을 생성합니다.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            times: Vec::new(),
        }
    }

    /// 방문 횟수
    pub fn count(&self) -> usize {
        self.times.len()
    }
}

/// 방문 로그의 한 줄
///
/// 장치 레코드와 별도로 추가 전용 테이블에 쌓이며, 기동 시 기록 순서대로 재생됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitRecord {
    /// 방문한 장치의 MAC
    pub mac: String,
    /// 조회된 호스트명
    pub host: String,
    /// 방문 시각
    pub at: Option<DateTime<Utc>>,
}

impl VisitRecord {
    /// 방문 한 건을 생성합니다.
    pub fn new(mac: impl Into<String>, host: impl Into<String>, at: Option<DateTime<Utc>>) -> Self {
        Self {
            mac: mac.into(),
            host: host.into(),
            at,
        }
    }
}

/// 네트워크에서 관찰된 장치
///
/// MAC 주소가 식별자입니다. `ip`와 `hostname`은 가장 최근 관찰값입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// 하드웨어 주소 (식별 키)
    pub mac: String,
    /// 가장 최근 네트워크 주소
    pub ip: String,
    /// 가장 최근 호스트명
    pub hostname: String,
    /// 마지막 관찰 시각
    pub last_seen: Option<DateTime<Utc>>,
    /// 호스트명 → 방문 기록
    #[serde(default)]
    pub hosts: BTreeMap<String, HostVisit>,
}

impl Device {
    /// 방문 기록이 없는 장치를 생성합니다.
    pub fn new(
        last_seen: Option<DateTime<Utc>>,
        hostname: impl Into<String>,
        ip: impl Into<String>,
        mac: impl Into<String>,
    ) -> Self {
        Self {
            mac: mac.into(),
            ip: ip.into(),
            hostname: hostname.into(),
            last_seen,
            hosts: BTreeMap::new(),
        }
    }

    /// 알 수 없는 주소용 임시 장치 -- 주소를 호스트명/MAC/IP로 모두 사용합니다.
    pub fn placeholder(address: &str) -> Self {
        Self::new(None, address, address, address)
    }

    /// `host` 방문을 기록합니다.
    pub fn record_visit(&mut self, at: Option<DateTime<Utc>>, host: &str) {
        self.hosts
            .entry(host.to_owned())
            .or_insert_with(|| HostVisit::new(host))
            .times
            .push(at);
    }

    /// 방문 기록을 [`VisitRecord`]로 펼칩니다 (호스트명 순, 호스트 안에서는 기록 순).
    pub fn visit_records(&self) -> impl Iterator<Item = VisitRecord> + '_ {
        self.hosts.values().flat_map(move |visit| {
            visit
                .times
                .iter()
                .map(move |at| VisitRecord::new(&self.mac, &visit.host, *at))
        })
    }

    /// 모든 호스트에 대한 방문 횟수 합계
    pub fn visit_count(&self) -> usize {
        self.hosts.values().map(HostVisit::count).sum()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) at {}", self.hostname, self.mac, self.ip)
    }
}
