//! 저장소 재시작(reload) 통합 테스트
//!
//! 각 테스트는 저장소를 닫고 같은 경로로 다시 열어 영속 상태를 확인합니다.

use chrono::{TimeZone, Utc};
use netwatch_store::{DeviceStore, StoreError};

fn db_path(dir: &tempfile::TempDir) -> std::path::PathBuf {
    dir.path().join("network-log.db")
}

#[test]
fn authorize_sequence_survives_reload() {
    let dir = tempfile::tempdir().unwrap();

    // Given: authorize -> deauthorize -> authorize
    {
        let store = DeviceStore::open(db_path(&dir)).unwrap();
        store.authorize("www.example.com");
        store.deauthorize("www.example.com");
        store.authorize("www.example.com");

        // 반대 순서로 끝나는 호스트
        store.deauthorize("ads.example.net");
        store.authorize("ads.example.net");
        store.deauthorize("ads.example.net");
    }

    // When: reopen
    let store = DeviceStore::open(db_path(&dir)).unwrap();

    // Then
    assert!(store.is_authorized("www.example.com"));
    assert!(!store.is_authorized("ads.example.net"));
    assert_eq!(store.authorized_hosts(), vec!["www.example.com"]);
}

#[test]
fn ignore_sequence_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = DeviceStore::open(db_path(&dir)).unwrap();
        store.ignore("aa:aa:aa:aa:aa:aa");
        store.unignore("aa:aa:aa:aa:aa:aa");
        store.ignore("aa:aa:aa:aa:aa:aa");

        store.unignore("bb:bb:bb:bb:bb:bb");
        store.ignore("bb:bb:bb:bb:bb:bb");
        store.unignore("bb:bb:bb:bb:bb:bb");
    }

    let store = DeviceStore::open(db_path(&dir)).unwrap();
    assert!(store.is_ignored("aa:aa:aa:aa:aa:aa"));
    assert!(!store.is_ignored("bb:bb:bb:bb:bb:bb"));
}

#[test]
fn non_ascii_hostname_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let at = Some(Utc.with_ymd_and_hms(2024, 5, 24, 12, 0, 3).unwrap());

    let original = {
        let store = DeviceStore::open(db_path(&dir)).unwrap();
        let device = store.upsert_device(at, "거실 TV ü", "192.168.0.30", "cc:cc:cc:cc:cc:cc");
        store.record_visit(&device, at, "例え.jp");
        store.find_by_hardware_address("cc:cc:cc:cc:cc:cc").unwrap()
    };

    let store = DeviceStore::open(db_path(&dir)).unwrap();
    let reloaded = store.find_by_hardware_address("cc:cc:cc:cc:cc:cc").unwrap();
    assert_eq!(reloaded, original);
    assert_eq!(reloaded.hostname, "거실 TV ü");
    assert_eq!(reloaded.hosts["例え.jp"].times, vec![at]);
    assert_eq!(store.find_by_address("192.168.0.30"), Some(original));
}

#[test]
fn newest_device_wins_shared_address_on_reload() {
    let dir = tempfile::tempdir().unwrap();
    let older = Some(Utc.with_ymd_and_hms(2024, 5, 24, 8, 0, 0).unwrap());
    let newer = Some(Utc.with_ymd_and_hms(2024, 5, 24, 9, 0, 0).unwrap());

    {
        let store = DeviceStore::open(db_path(&dir)).unwrap();
        // 최신 장치를 먼저 기록해 저장 순서와 무관함을 확인
        store.upsert_device(newer, "new-owner", "192.168.0.40", "ff:ff:ff:ff:ff:ff");
        store.upsert_device(older, "old-owner", "192.168.0.40", "00:00:00:00:00:01");
        store.upsert_device(None, "unknown-time", "192.168.0.40", "00:00:00:00:00:02");
    }

    let store = DeviceStore::open(db_path(&dir)).unwrap();
    assert_eq!(store.device_count(), 3);
    assert_eq!(
        store.find_by_address("192.168.0.40").unwrap().mac,
        "ff:ff:ff:ff:ff:ff"
    );
}

#[test]
fn reset_visits_are_not_resurrected_on_reload() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = DeviceStore::open(db_path(&dir)).unwrap();
        let device = store.upsert_device(None, "laptop", "192.168.0.10", "aa:aa:aa:aa:aa:aa");
        store.record_visit(&device, None, "example.com");
        let taken = store.snapshot_and_reset(true);
        assert_eq!(taken[0].visit_count(), 1);
    }

    let store = DeviceStore::open(db_path(&dir)).unwrap();
    let devices = store.snapshot_and_reset(false);
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].visit_count(), 0);
}

#[test]
fn open_at_invalid_path_is_an_error() {
    let result = DeviceStore::open("/tmp/a path/that does/not exist");
    assert!(matches!(result, Err(StoreError::Open { .. })));
}

#[test]
fn long_visit_history_survives_reload_in_order() {
    // Given: thousands of visits on one device, spread over two hosts
    let dir = tempfile::tempdir().unwrap();
    let at = |second: u32| Some(Utc.with_ymd_and_hms(2024, 5, 24, 12, 0, second % 60).unwrap());
    {
        let store = DeviceStore::open(db_path(&dir)).unwrap();
        let device = store.upsert_device(at(0), "laptop", "192.168.0.10", "aa:aa:aa:aa:aa:aa");
        for i in 0..2000 {
            let host = if i % 2 == 0 { "www.example.com" } else { "api.example.com" };
            store.record_visit(&device, at(i), host);
        }
    }

    // When
    let store = DeviceStore::open(db_path(&dir)).unwrap();

    // Then: every visit is replayed in recording order
    let device = store.find_by_hardware_address("aa:aa:aa:aa:aa:aa").unwrap();
    assert_eq!(device.visit_count(), 2000);
    let www = &device.hosts["www.example.com"].times;
    assert_eq!(www.len(), 1000);
    assert_eq!(www[..3].to_vec(), vec![at(0), at(2), at(4)]);
}

#[test]
fn visits_after_reset_are_kept_on_reload() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = DeviceStore::open(db_path(&dir)).unwrap();
        let device = store.upsert_device(None, "laptop", "192.168.0.10", "aa:aa:aa:aa:aa:aa");
        store.record_visit(&device, None, "before.example");
        store.snapshot_and_reset(true);
        store.record_visit(&device, None, "after.example");
    }

    let store = DeviceStore::open(db_path(&dir)).unwrap();
    let device = store.find_by_hardware_address("aa:aa:aa:aa:aa:aa").unwrap();
    assert_eq!(device.visit_count(), 1);
    assert!(device.hosts.contains_key("after.example"));
}

#[test]
fn restored_visits_survive_reload() {
    // Given: a consumed snapshot that is handed back
    let dir = tempfile::tempdir().unwrap();
    {
        let store = DeviceStore::open(db_path(&dir)).unwrap();
        let device = store.upsert_device(None, "laptop", "192.168.0.10", "aa:aa:aa:aa:aa:aa");
        store.record_visit(&device, None, "example.com");
        let taken = store.snapshot_and_reset(true);
        store.record_visit(&device, None, "example.com");

        // When
        store.restore_visits(&taken);
    }

    // Then
    let store = DeviceStore::open(db_path(&dir)).unwrap();
    let device = store.find_by_hardware_address("aa:aa:aa:aa:aa:aa").unwrap();
    assert_eq!(device.hosts["example.com"].count(), 2);
}
