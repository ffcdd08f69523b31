//! Aggregated health reporting.
//!
//! The orchestrator polls each plugin's `health_check()` and publishes a
//! unified [`DaemonHealth`] report, which the operator API serves on `/health`.
//!
//! # Aggregation Rule
//!
//! - All Healthy -> Healthy
//! - Any Degraded, none Unhealthy -> Degraded(reason)
//! - Any Unhealthy -> Unhealthy(reason)

use serde::{Deserialize, Serialize};

use netwatch_core::pipeline::HealthStatus;

/// Aggregated health report for the entire daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonHealth {
    /// Overall daemon health status (worst of all modules).
    pub status: HealthStatus,
    /// Daemon uptime in seconds since start.
    pub uptime_secs: u64,
    /// Per-module health reports.
    pub modules: Vec<ModuleHealth>,
}

impl DaemonHealth {
    /// Report published before the first health poll completes.
    pub fn starting() -> Self {
        Self {
            status: HealthStatus::Degraded("starting".to_owned()),
            uptime_secs: 0,
            modules: Vec::new(),
        }
    }
}

/// Health status for a single module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleHealth {
    /// Module name (e.g., "log-pipeline", "event-router").
    pub name: String,
    /// Lifecycle state as reported by the plugin registry.
    pub state: String,
    /// Current health status of the module.
    pub status: HealthStatus,
}

/// Aggregate multiple module health statuses into a single status.
///
/// Returns the worst status found: Unhealthy > Degraded > Healthy.
pub fn aggregate_status(modules: &[ModuleHealth]) -> HealthStatus {
    let mut degraded = Vec::new();
    let mut unhealthy = Vec::new();

    for module in modules {
        match &module.status {
            HealthStatus::Healthy => {}
            HealthStatus::Degraded(reason) => {
                degraded.push(format!("{}: {}", module.name, reason));
            }
            HealthStatus::Unhealthy(reason) => {
                unhealthy.push(format!("{}: {}", module.name, reason));
            }
        }
    }

    if !unhealthy.is_empty() {
        HealthStatus::Unhealthy(unhealthy.join("; "))
    } else if !degraded.is_empty() {
        HealthStatus::Degraded(degraded.join("; "))
    } else {
        HealthStatus::Healthy
    }
}
