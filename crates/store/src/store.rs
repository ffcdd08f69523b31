//! 장치 집계 저장소
//!
//! [`DeviceStore`]는 메모리 인덱스와 [`StoreBackend`]를 함께 관리합니다.
//!
//! - 장치 인덱스: MAC → [`Device`], IP → MAC (IP 조회는 시점 별칭일 뿐 별도 식별자가 아님)
//! - 허용 호스트 집합 / 무시 장치 집합
//!
//! 라우터와 운영자 API가 서로 다른 태스크에서 호출하므로 모든 상태는
//! `parking_lot::RwLock`으로 보호됩니다. 조회 메서드는 복제본을 반환합니다.
//!
//! # 영속화
//!
//! 변경은 메모리에 먼저 반영하고, `writes` 뮤텍스를 잡은 뒤 메모리 락을 풀고 나서 백엔드에 기록합니다.
//! 조회는 디스크 쓰기를 기다리지 않고, 디스크 반영 순서는 메모리 변경 순서와 같습니다.
//! `writes`를 잡은 상태에서는 다른 락을 잡지 않습니다.
//!
//! 개별 쓰기가 실패하면 경고 로그와 `STORE_WRITE_FAILURES_TOTAL` 카운터만 남기고
//! 메모리 상태는 그대로 진행합니다. 인덱스 갱신과 레코드 쓰기는 하나의 트랜잭션으로 묶이지 않습니다.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use netwatch_core::metrics as m;

use crate::backend::{KeySet, RedbBackend, StoreBackend};
use crate::error::StoreError;
use crate::model::{Device, HostVisit, VisitRecord};

/// MAC/IP 인덱스
///
/// IP 재지정은 반드시 [`DeviceIndex::point_address`]를 거칩니다.
#[derive(Default)]
struct DeviceIndex {
    by_mac: BTreeMap<String, Device>,
    /// IP → MAC
    by_ip: HashMap<String, String>,
}

impl DeviceIndex {
    /// `ip`를 `mac`으로 재지정하고, `previous_ip`가 아직 `mac`을 가리키면 제거합니다.
    fn point_address(&mut self, ip: &str, mac: &str, previous_ip: Option<&str>) {
        if let Some(old) = previous_ip.filter(|old| *old != ip) {
            if self.by_ip.get(old).is_some_and(|owner| owner == mac) {
                self.by_ip.remove(old);
            }
        }
        self.by_ip.insert(ip.to_owned(), mac.to_owned());
    }

    fn by_address(&self, ip: &str) -> Option<&Device> {
        self.by_ip.get(ip).and_then(|mac| self.by_mac.get(mac))
    }

    fn visit_records(&self) -> Vec<VisitRecord> {
        self.by_mac.values().flat_map(|d| d.visit_records()).collect()
    }
}

/// 장치/방문 집계 저장소
pub struct DeviceStore {
    backend: Box<dyn StoreBackend>,
    index: RwLock<DeviceIndex>,
    authorized: RwLock<BTreeSet<String>>,
    ignored: RwLock<BTreeSet<String>>,
    /// 백엔드 쓰기 순서
    writes: Mutex<()>,
}

impl DeviceStore {
    /// redb 저장소를 열고 영속 상태를 메모리로 읽어 들입니다.
    ///
    /// # Errors
    ///
    /// 경로가 유효하지 않거나 데이터베이스를 읽을 수 없으면 에러를 반환합니다.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::with_backend(Box::new(RedbBackend::open(path)?))
    }

    /// 주어진 백엔드에서 영속 상태를 읽어 저장소를 구성합니다.
    ///
    /// 같은 IP를 가진 장치가 여럿이면 `last_seen`이 가장 최근인 장치가
    /// IP 인덱스를 차지합니다 (`None`은 가장 오래된 것으로 취급).
    /// 방문 로그는 기록 순서대로 재생되며, 알 수 없는 MAC의 방문은 건너뜁니다.
    ///
    /// # Errors
    ///
    /// 백엔드 읽기가 실패하면 에러를 반환합니다.
    pub fn with_backend(backend: Box<dyn StoreBackend>) -> Result<Self, StoreError> {
        let loaded = backend.load()?;

        let mut devices = loaded.devices;
        devices.sort_by_key(|d| Reverse(d.last_seen));

        let mut index = DeviceIndex::default();
        for device in devices {
            index
                .by_ip
                .entry(device.ip.clone())
                .or_insert_with(|| device.mac.clone());
            index.by_mac.insert(device.mac.clone(), device);
        }

        let mut orphaned = 0usize;
        for visit in &loaded.visits {
            match index.by_mac.get_mut(&visit.mac) {
                Some(device) => device.record_visit(visit.at, &visit.host),
                None => orphaned += 1,
            }
        }
        if orphaned > 0 {
            warn!(orphaned, "skipping visits for unknown devices");
        }

        info!(
            path = %backend.path().display(),
            devices = index.by_mac.len(),
            visits = loaded.visits.len() - orphaned,
            authorized = loaded.authorized.len(),
            ignored = loaded.ignored.len(),
            "store loaded"
        );
        metrics::gauge!(m::STORE_DEVICES_TRACKED).set(index.by_mac.len() as f64);

        Ok(Self {
            backend,
            index: RwLock::new(index),
            authorized: RwLock::new(loaded.authorized),
            ignored: RwLock::new(loaded.ignored),
            writes: Mutex::new(()),
        })
    }

    /// `mac`의 장치를 생성하거나 갱신합니다.
    ///
    /// 기존 방문 기록은 유지하고 IP/호스트명을 갱신합니다.
    /// `at`이 `None`이면 기존 `last_seen`을 유지합니다.
    pub fn upsert_device(
        &self,
        at: Option<DateTime<Utc>>,
        hostname: &str,
        ip: &str,
        mac: &str,
    ) -> Device {
        let mut guard = self.index.write();
        let index = &mut *guard;

        let (device, previous_ip) = match index.by_mac.get_mut(mac) {
            Some(existing) => {
                let previous_ip = std::mem::replace(&mut existing.ip, ip.to_owned());
                existing.hostname = hostname.to_owned();
                existing.last_seen = at.or(existing.last_seen);
                (existing.clone(), Some(previous_ip))
            }
            None => {
                let device = Device::new(at, hostname, ip, mac);
                index.by_mac.insert(mac.to_owned(), device.clone());
                (device, None)
            }
        };
        index.point_address(ip, mac, previous_ip.as_deref());
        metrics::gauge!(m::STORE_DEVICES_TRACKED).set(index.by_mac.len() as f64);

        let _writes = self.writes.lock();
        drop(guard);
        self.persist("upsert device", self.backend.put_device(&device));
        debug!(device = %device, "device upserted");
        device
    }

    /// 현재 `ip`를 사용하는 장치를 찾습니다.
    pub fn find_by_address(&self, ip: &str) -> Option<Device> {
        self.index.read().by_address(ip).cloned()
    }

    /// `mac` 장치를 찾습니다.
    pub fn find_by_hardware_address(&self, mac: &str) -> Option<Device> {
        self.index.read().by_mac.get(mac).cloned()
    }

    /// `device`의 `host` 방문 목록에 `at`을 추가합니다.
    ///
    /// 저장소에 없는 장치면 아무것도 하지 않고 `false`를 반환합니다.
    pub fn record_visit(&self, device: &Device, at: Option<DateTime<Utc>>, host: &str) -> bool {
        let mut index = self.index.write();
        let Some(stored) = index.by_mac.get_mut(&device.mac) else {
            warn!(mac = %device.mac, host, "visit for unknown device, dropping");
            return false;
        };

        stored.record_visit(at, host);
        debug!(device = %stored, host, visits = stored.visit_count(), "visit recorded");
        let visit = VisitRecord::new(&stored.mac, host, at);

        let _writes = self.writes.lock();
        drop(index);
        self.persist("record visit", self.backend.append_visit(&visit));
        true
    }

    /// 허용 호스트를 추가합니다. 새로 추가되면 `true`.
    pub fn authorize(&self, host: &str) -> bool {
        self.insert_key(&self.authorized, KeySet::Authorized, host)
    }

    /// 허용 호스트를 제거합니다. 실제로 제거되면 `true`.
    pub fn deauthorize(&self, host: &str) -> bool {
        self.remove_key(&self.authorized, KeySet::Authorized, host)
    }

    /// 무시 장치를 추가합니다. 새로 추가되면 `true`.
    pub fn ignore(&self, mac: &str) -> bool {
        self.insert_key(&self.ignored, KeySet::Ignored, mac)
    }

    /// 무시 장치를 제거합니다. 실제로 제거되면 `true`.
    pub fn unignore(&self, mac: &str) -> bool {
        self.remove_key(&self.ignored, KeySet::Ignored, mac)
    }

    /// 허용 호스트인지 확인합니다.
    pub fn is_authorized(&self, host: &str) -> bool {
        self.authorized.read().contains(host)
    }

    /// 무시 장치인지 확인합니다.
    pub fn is_ignored(&self, mac: &str) -> bool {
        self.ignored.read().contains(mac)
    }

    /// 허용 호스트 목록 (정렬됨)
    pub fn authorized_hosts(&self) -> Vec<String> {
        self.authorized.read().iter().cloned().collect()
    }

    /// 무시 장치 목록 (정렬됨)
    pub fn ignored_devices(&self) -> Vec<String> {
        self.ignored.read().iter().cloned().collect()
    }

    /// 추적 중인 장치 수
    pub fn device_count(&self) -> usize {
        self.index.read().by_mac.len()
    }

    /// 모든 장치의 복제본을 MAC 순으로 반환합니다.
    ///
    /// `reset`이 `true`면 같은 락 안에서 모든 장치의 방문 기록을 비우고
    /// 방문 로그를 한 번의 트랜잭션으로 비웁니다.
    pub fn snapshot_and_reset(&self, reset: bool) -> Vec<Device> {
        if !reset {
            return self.index.read().by_mac.values().cloned().collect();
        }

        let mut index = self.index.write();
        let snapshot: Vec<Device> = index.by_mac.values().cloned().collect();

        let mut cleared = 0usize;
        for device in index.by_mac.values_mut() {
            if !device.hosts.is_empty() {
                device.hosts.clear();
                cleared += 1;
            }
        }

        let _writes = self.writes.lock();
        drop(index);
        if cleared > 0 {
            self.persist("reset visits", self.backend.replace_visits(&[]));
        }

        debug!(devices = snapshot.len(), reset = cleared, "snapshot taken");
        snapshot
    }

    /// 소비된 스냅샷의 방문 기록을 되돌립니다.
    ///
    /// 다이제스트 파일 쓰기가 실패했을 때 사용합니다. 되돌린 방문은 호스트별로
    /// 스냅샷 이후에 쌓인 방문보다 앞에 놓이며, 그 사이 사라진 장치의 방문은 버립니다.
    /// 방문 로그는 병합된 메모리 상태로 교체됩니다.
    pub fn restore_visits(&self, snapshot: &[Device]) {
        let mut index = self.index.write();
        let mut restored = 0usize;
        for taken in snapshot.iter().filter(|d| !d.hosts.is_empty()) {
            let Some(stored) = index.by_mac.get_mut(&taken.mac) else {
                continue;
            };
            let newer = std::mem::replace(&mut stored.hosts, taken.hosts.clone());
            for (host, visit) in newer {
                stored
                    .hosts
                    .entry(host)
                    .or_insert_with_key(|host| HostVisit::new(host.as_str()))
                    .times
                    .extend(visit.times);
            }
            restored += taken.visit_count();
        }
        if restored == 0 {
            return;
        }
        let visits = index.visit_records();

        let _writes = self.writes.lock();
        drop(index);
        self.persist("restore visits", self.backend.replace_visits(&visits));
        info!(restored, "visits restored");
    }

    fn insert_key(&self, set: &RwLock<BTreeSet<String>>, kind: KeySet, key: &str) -> bool {
        let mut guard = set.write();
        if !guard.insert(key.to_owned()) {
            return false;
        }
        let _writes = self.writes.lock();
        drop(guard);
        self.persist(kind.name(), self.backend.put_key(kind, key));
        info!(set = kind.name(), key, "added");
        true
    }

    fn remove_key(&self, set: &RwLock<BTreeSet<String>>, kind: KeySet, key: &str) -> bool {
        let mut guard = set.write();
        if !guard.remove(key) {
            return false;
        }
        let _writes = self.writes.lock();
        drop(guard);
        self.persist(kind.name(), self.backend.remove_key(kind, key));
        info!(set = kind.name(), key, "removed");
        true
    }

    fn persist(&self, operation: &str, result: Result<(), StoreError>) {
        if let Err(e) = result {
            warn!(operation, error = %e, "store write failed, keeping in-memory state");
            metrics::counter!(m::STORE_WRITE_FAILURES_TOTAL).increment(1);
        }
    }
}

impl std::fmt::Debug for DeviceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceStore")
            .field("path", &self.backend.path())
            .field("devices", &self.device_count())
            .finish()
    }
}
