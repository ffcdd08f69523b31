//! 저장소 백엔드
//!
//! [`DeviceStore`](crate::DeviceStore)는 [`StoreBackend`] 트레이트를 통해서만 디스크에 접근합니다.
//!
//! - [`RedbBackend`]: redb 기반 운영 구현
//! - 테스트는 쓰기 실패나 지연을 흉내 내는 구현을 주입할 수 있습니다.
//!
//! # 테이블
//!
//! - `devices`: MAC → JSON 직렬화된 [`Device`] (방문 기록 제외)
//! - `visits`: 일련번호 → JSON 직렬화된 [`VisitRecord`] (추가 전용)
//! - `authorized`: 호스트명 → 1바이트 존재 표시
//! - `ignored`: MAC → 1바이트 존재 표시
//!
//! 방문을 장치 레코드와 분리해 두었으므로 방문 한 건의 쓰기 비용은 누적 기록 크기와 무관합니다.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::model::{Device, VisitRecord};

const DEVICES: TableDefinition<&str, &[u8]> = TableDefinition::new("devices");
const VISITS: TableDefinition<u64, &[u8]> = TableDefinition::new("visits");
const AUTHORIZED: TableDefinition<&str, &[u8]> = TableDefinition::new("authorized");
const IGNORED: TableDefinition<&str, &[u8]> = TableDefinition::new("ignored");

/// 집합 버킷의 값
const PRESENT: &[u8] = &[1];

/// 키 집합 버킷
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySet {
    /// 허용 호스트
    Authorized,
    /// 무시 장치
    Ignored,
}

impl KeySet {
    fn table(self) -> TableDefinition<'static, &'static str, &'static [u8]> {
        match self {
            Self::Authorized => AUTHORIZED,
            Self::Ignored => IGNORED,
        }
    }

    /// 버킷 이름
    pub fn name(self) -> &'static str {
        match self {
            Self::Authorized => "authorized",
            Self::Ignored => "ignored",
        }
    }
}

/// 시작 시 읽어 들인 영속 상태
#[derive(Debug, Default)]
pub struct Loaded {
    /// 저장된 장치 (순서 없음)
    pub devices: Vec<Device>,
    /// 기록 순서대로 정렬된 방문 로그
    pub visits: Vec<VisitRecord>,
    /// 허용 호스트
    pub authorized: BTreeSet<String>,
    /// 무시 장치
    pub ignored: BTreeSet<String>,
}

/// 저장소 영속 계층
///
/// 모든 메서드는 동기 호출이며 호출자가 쓰기 순서를 직렬화합니다.
/// 실패는 [`StoreError`]로 반환되고, 저장소는 이를 경고로만 남깁니다.
pub trait StoreBackend: Send + Sync + 'static {
    /// 모든 테이블을 읽습니다.
    ///
    /// # Errors
    ///
    /// 데이터베이스를 읽을 수 없으면 에러를 반환합니다 (기동 실패).
    fn load(&self) -> Result<Loaded, StoreError>;

    /// 장치 레코드를 기록합니다. 방문 기록은 포함하지 않습니다.
    fn put_device(&self, device: &Device) -> Result<(), StoreError>;

    /// 방문 로그 끝에 한 건을 추가합니다.
    fn append_visit(&self, visit: &VisitRecord) -> Result<(), StoreError>;

    /// 방문 로그 전체를 `visits`로 교체합니다. 빈 슬라이스면 로그를 비웁니다.
    fn replace_visits(&self, visits: &[VisitRecord]) -> Result<(), StoreError>;

    /// 집합 버킷에 키를 추가합니다.
    fn put_key(&self, set: KeySet, key: &str) -> Result<(), StoreError>;

    /// 집합 버킷에서 키를 제거합니다. 없는 키는 에러가 아닙니다.
    fn remove_key(&self, set: KeySet, key: &str) -> Result<(), StoreError>;

    /// 데이터베이스 위치 (로그/디버그 출력용)
    fn path(&self) -> &Path;
}

/// `devices` 테이블에 기록되는 장치 필드
#[derive(Serialize)]
struct DeviceRecord<'a> {
    mac: &'a str,
    ip: &'a str,
    hostname: &'a str,
    last_seen: Option<DateTime<Utc>>,
}

impl<'a> From<&'a Device> for DeviceRecord<'a> {
    fn from(device: &'a Device) -> Self {
        Self {
            mac: &device.mac,
            ip: &device.ip,
            hostname: &device.hostname,
            last_seen: device.last_seen,
        }
    }
}

/// redb 데이터베이스 핸들
pub struct RedbBackend {
    db: Database,
    path: PathBuf,
}

impl RedbBackend {
    /// 데이터베이스를 열고 (없으면 생성) 테이블을 준비합니다.
    ///
    /// 상위 디렉토리가 없거나 경로가 디렉토리면 [`StoreError::Open`]을 반환합니다.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let open_err = |reason: String| StoreError::Open {
            path: path.display().to_string(),
            reason,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                return Err(open_err(format!(
                    "parent directory {} does not exist",
                    parent.display()
                )));
            }
        }
        if path.is_dir() {
            return Err(open_err("path is a directory".to_owned()));
        }

        let db = Database::create(&path).map_err(|e| open_err(e.to_string()))?;
        create_tables(&db).map_err(|e| open_err(e.to_string()))?;

        debug!(path = %path.display(), "store opened");
        Ok(Self { db, path })
    }

    fn load_inner(&self) -> Result<Loaded, redb::Error> {
        let txn = self.db.begin_read()?;
        let mut loaded = Loaded::default();

        let devices = txn.open_table(DEVICES)?;
        for entry in devices.iter()? {
            let (key, value) = entry?;
            match serde_json::from_slice::<Device>(value.value()) {
                Ok(device) => loaded.devices.push(device),
                Err(e) => warn!(mac = key.value(), error = %e, "skipping unreadable device record"),
            }
        }

        // u64 키 순회 = 기록 순서
        let visits = txn.open_table(VISITS)?;
        for entry in visits.iter()? {
            let (seq, value) = entry?;
            match serde_json::from_slice::<VisitRecord>(value.value()) {
                Ok(visit) => loaded.visits.push(visit),
                Err(e) => warn!(seq = seq.value(), error = %e, "skipping unreadable visit record"),
            }
        }

        for (set, target) in [
            (KeySet::Authorized, &mut loaded.authorized),
            (KeySet::Ignored, &mut loaded.ignored),
        ] {
            let table = txn.open_table(set.table())?;
            for entry in table.iter()? {
                let (key, _) = entry?;
                target.insert(key.value().to_owned());
            }
        }

        Ok(loaded)
    }

    fn put_device_inner(&self, mac: &str, bytes: &[u8]) -> Result<(), redb::Error> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(DEVICES)?;
            table.insert(mac, bytes)?;
        }
        txn.commit()?;
        Ok(())
    }

    fn append_visit_inner(&self, bytes: &[u8]) -> Result<(), redb::Error> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(VISITS)?;
            let next = table.last()?.map_or(0, |(seq, _)| seq.value() + 1);
            table.insert(next, bytes)?;
        }
        txn.commit()?;
        Ok(())
    }

    fn replace_visits_inner(&self, encoded: &[Vec<u8>]) -> Result<(), redb::Error> {
        let txn = self.db.begin_write()?;
        txn.delete_table(VISITS)?;
        {
            let mut table = txn.open_table(VISITS)?;
            for (seq, bytes) in (0u64..).zip(encoded) {
                table.insert(seq, bytes.as_slice())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    fn put_key_inner(&self, set: KeySet, key: &str) -> Result<(), redb::Error> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(set.table())?;
            table.insert(key, PRESENT)?;
        }
        txn.commit()?;
        Ok(())
    }

    fn remove_key_inner(&self, set: KeySet, key: &str) -> Result<(), redb::Error> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(set.table())?;
            table.remove(key)?;
        }
        txn.commit()?;
        Ok(())
    }
}

impl StoreBackend for RedbBackend {
    fn load(&self) -> Result<Loaded, StoreError> {
        Ok(self.load_inner()?)
    }

    fn put_device(&self, device: &Device) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(&DeviceRecord::from(device))?;
        Ok(self.put_device_inner(&device.mac, &bytes)?)
    }

    fn append_visit(&self, visit: &VisitRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(visit)?;
        Ok(self.append_visit_inner(&bytes)?)
    }

    fn replace_visits(&self, visits: &[VisitRecord]) -> Result<(), StoreError> {
        let encoded = visits
            .iter()
            .map(serde_json::to_vec)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.replace_visits_inner(&encoded)?)
    }

    fn put_key(&self, set: KeySet, key: &str) -> Result<(), StoreError> {
        Ok(self.put_key_inner(set, key)?)
    }

    fn remove_key(&self, set: KeySet, key: &str) -> Result<(), StoreError> {
        Ok(self.remove_key_inner(set, key)?)
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

fn create_tables(db: &Database) -> Result<(), redb::Error> {
    let txn = db.begin_write()?;
    txn.open_table(DEVICES)?;
    txn.open_table(VISITS)?;
    txn.open_table(AUTHORIZED)?;
    txn.open_table(IGNORED)?;
    txn.commit()?;
    Ok(())
}
