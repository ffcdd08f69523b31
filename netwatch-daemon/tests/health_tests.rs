//! Health aggregation tests.
//!
//! Tests the health status aggregation logic and the serialized report.

use netwatch_core::pipeline::HealthStatus;
use netwatch_daemon::health::{DaemonHealth, ModuleHealth, aggregate_status};

fn module(name: &str, status: HealthStatus) -> ModuleHealth {
    ModuleHealth {
        name: name.to_owned(),
        state: "running".to_owned(),
        status,
    }
}

#[test]
fn test_aggregate_status_all_healthy() {
    // Given: All modules are healthy
    let modules = vec![
        module("log-pipeline", HealthStatus::Healthy),
        module("event-router", HealthStatus::Healthy),
        module("operator-api", HealthStatus::Healthy),
    ];

    // When
    let status = aggregate_status(&modules);

    // Then
    assert!(status.is_healthy(), "all healthy modules should be healthy");
}

#[test]
fn test_aggregate_status_one_degraded() {
    // Given: The router lost its event channel
    let modules = vec![
        module("log-pipeline", HealthStatus::Healthy),
        module(
            "event-router",
            HealthStatus::Degraded("event channel closed".to_owned()),
        ),
    ];

    // When
    let status = aggregate_status(&modules);

    // Then: Degraded, with the module name in the reason
    match status {
        HealthStatus::Degraded(reason) => {
            assert_eq!(reason, "event-router: event channel closed");
        }
        other => panic!("expected degraded, got {other:?}"),
    }
}

#[test]
fn test_aggregate_status_unhealthy_wins_over_degraded() {
    let modules = vec![
        module(
            "event-router",
            HealthStatus::Degraded("event channel closed".to_owned()),
        ),
        module(
            "log-pipeline",
            HealthStatus::Unhealthy("log tailer exited".to_owned()),
        ),
        module("operator-api", HealthStatus::Unhealthy("stopped".to_owned())),
    ];

    let status = aggregate_status(&modules);

    match status {
        HealthStatus::Unhealthy(reason) => {
            assert!(reason.contains("log-pipeline: log tailer exited"));
            assert!(reason.contains("operator-api: stopped"));
            assert!(!reason.contains("event-router"));
        }
        other => panic!("expected unhealthy, got {other:?}"),
    }
}

#[test]
fn test_aggregate_status_no_modules_is_healthy() {
    assert!(aggregate_status(&[]).is_healthy());
}

#[test]
fn test_daemon_health_serializes_for_api() {
    // Given: A report with one module
    let health = DaemonHealth {
        status: HealthStatus::Healthy,
        uptime_secs: 42,
        modules: vec![module("event-router", HealthStatus::Healthy)],
    };

    // When
    let json = serde_json::to_value(&health).expect("should serialize");

    // Then
    assert_eq!(json["uptime_secs"], 42);
    assert_eq!(json["modules"][0]["name"], "event-router");
    assert_eq!(json["modules"][0]["state"], "running");

    let back: DaemonHealth = serde_json::from_value(json).expect("should deserialize");
    assert!(back.status.is_healthy());
}

#[test]
fn test_starting_report_is_not_healthy() {
    let health = DaemonHealth::starting();
    assert!(!health.status.is_healthy());
    assert!(!health.status.is_unhealthy());
    assert!(health.modules.is_empty());
}
