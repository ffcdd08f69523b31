//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `netwatch_`
//! - 모듈명: `log_pipeline_`, `router_`, `store_`, `digest_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds`, 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! metrics::counter!(netwatch_core::metrics::ROUTER_VISITS_RECORDED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 이벤트 종류 레이블 키 (device, request)
pub const LABEL_KIND: &str = "kind";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Log Pipeline 메트릭 ────────────────────────────────────────────

/// Log Pipeline: 읽은 로그 라인 수 (counter)
pub const LOG_PIPELINE_LINES_READ_TOTAL: &str = "netwatch_log_pipeline_lines_read_total";

/// Log Pipeline: 방출된 이벤트 수 (counter, label: kind)
pub const LOG_PIPELINE_EVENTS_EMITTED_TOTAL: &str = "netwatch_log_pipeline_events_emitted_total";

/// Log Pipeline: 길이 초과로 버려진 라인 수 (counter)
pub const LOG_PIPELINE_LINES_DROPPED_TOTAL: &str = "netwatch_log_pipeline_lines_dropped_total";

/// Log Pipeline: 로테이션/truncation 감지 횟수 (counter)
pub const LOG_PIPELINE_ROTATIONS_TOTAL: &str = "netwatch_log_pipeline_rotations_total";

// ─── Router 메트릭 ──────────────────────────────────────────────────

/// Router: 기록된 방문 수 (counter)
pub const ROUTER_VISITS_RECORDED_TOTAL: &str = "netwatch_router_visits_recorded_total";

/// Router: 허용 호스트라서 건너뛴 요청 수 (counter)
pub const ROUTER_REQUESTS_AUTHORIZED_TOTAL: &str = "netwatch_router_requests_authorized_total";

/// Router: 무시 장치라서 건너뛴 요청 수 (counter)
pub const ROUTER_REQUESTS_IGNORED_TOTAL: &str = "netwatch_router_requests_ignored_total";

/// Router: 알 수 없는 주소로 생성된 임시 장치 수 (counter)
pub const ROUTER_PLACEHOLDER_DEVICES_TOTAL: &str = "netwatch_router_placeholder_devices_total";

// ─── Store 메트릭 ───────────────────────────────────────────────────

/// Store: 추적 중인 장치 수 (gauge)
pub const STORE_DEVICES_TRACKED: &str = "netwatch_store_devices_tracked";

/// Store: 실패한 영속화 쓰기 수 (counter)
pub const STORE_WRITE_FAILURES_TOTAL: &str = "netwatch_store_write_failures_total";

// ─── Digest 메트릭 ──────────────────────────────────────────────────

/// Digest: 내보낸 다이제스트 수 (counter, label: result)
pub const DIGEST_EXPORTS_TOTAL: &str = "netwatch_digest_exports_total";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "netwatch_daemon_uptime_seconds";

/// Daemon: 등록된 플러그인 수 (gauge)
pub const DAEMON_PLUGINS_REGISTERED: &str = "netwatch_daemon_plugins_registered";

/// Daemon: 빌드 정보 (gauge, 항상 1)
pub const DAEMON_BUILD_INFO: &str = "netwatch_daemon_build_info";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    // Log Pipeline
    describe_counter!(
        LOG_PIPELINE_LINES_READ_TOTAL,
        "Total number of log lines read from the tailed file"
    );
    describe_counter!(
        LOG_PIPELINE_EVENTS_EMITTED_TOTAL,
        "Total number of device/request events emitted by the correlator"
    );
    describe_counter!(
        LOG_PIPELINE_LINES_DROPPED_TOTAL,
        "Total number of log lines dropped for exceeding the maximum length"
    );
    describe_counter!(
        LOG_PIPELINE_ROTATIONS_TOTAL,
        "Total number of log rotations or truncations detected"
    );

    // Router
    describe_counter!(
        ROUTER_VISITS_RECORDED_TOTAL,
        "Total number of host visits recorded against devices"
    );
    describe_counter!(
        ROUTER_REQUESTS_AUTHORIZED_TOTAL,
        "Requests skipped because the host is authorized"
    );
    describe_counter!(
        ROUTER_REQUESTS_IGNORED_TOTAL,
        "Requests skipped because the device is ignored"
    );
    describe_counter!(
        ROUTER_PLACEHOLDER_DEVICES_TOTAL,
        "Placeholder devices created for unrecognized source addresses"
    );

    // Store
    describe_gauge!(STORE_DEVICES_TRACKED, "Number of devices currently tracked");
    describe_counter!(
        STORE_WRITE_FAILURES_TOTAL,
        "Persistence writes that failed (in-memory state still advanced)"
    );

    // Digest
    describe_counter!(DIGEST_EXPORTS_TOTAL, "Digest exports attempted, by result");

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "netwatch daemon uptime in seconds");
    describe_gauge!(
        DAEMON_PLUGINS_REGISTERED,
        "Number of plugins registered in the daemon"
    );
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        LOG_PIPELINE_LINES_READ_TOTAL,
        LOG_PIPELINE_EVENTS_EMITTED_TOTAL,
        LOG_PIPELINE_LINES_DROPPED_TOTAL,
        LOG_PIPELINE_ROTATIONS_TOTAL,
        ROUTER_VISITS_RECORDED_TOTAL,
        ROUTER_REQUESTS_AUTHORIZED_TOTAL,
        ROUTER_REQUESTS_IGNORED_TOTAL,
        ROUTER_PLACEHOLDER_DEVICES_TOTAL,
        STORE_DEVICES_TRACKED,
        STORE_WRITE_FAILURES_TOTAL,
        DIGEST_EXPORTS_TOTAL,
        DAEMON_UPTIME_SECONDS,
        DAEMON_PLUGINS_REGISTERED,
        DAEMON_BUILD_INFO,
    ];

    #[test]
    fn all_metrics_start_with_netwatch_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("netwatch_"),
                "Metric '{}' does not start with 'netwatch_' prefix",
                name
            );
        }
    }

    #[test]
    fn counters_end_with_total() {
        for name in ALL_METRIC_NAMES {
            let is_gauge = [
                STORE_DEVICES_TRACKED,
                DAEMON_UPTIME_SECONDS,
                DAEMON_PLUGINS_REGISTERED,
                DAEMON_BUILD_INFO,
            ]
            .contains(name);
            assert_eq!(!is_gauge, name.ends_with("_total"), "metric {}", name);
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        // 레코더 없이도 패닉하지 않아야 함
        describe_all();
    }

    #[test]
    fn label_keys_are_lowercase() {
        for label in [LABEL_KIND, LABEL_RESULT] {
            assert_eq!(label.to_lowercase(), label);
        }
    }
}
