//! 파이프라인 공통 타입: 헬스 상태와 dyn 호환 future 별칭

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

/// `dyn` trait 객체에서 async 메서드를 반환하기 위한 boxed future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 모듈 헬스 상태
///
/// 심각도 순서: `Healthy` < `Degraded` < `Unhealthy`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 동작하지만 성능/일관성 저하
    Degraded(String),
    /// 동작 불가
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 동작 불가 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_predicates() {
        assert!(HealthStatus::Healthy.is_healthy());
        assert!(!HealthStatus::Degraded("slow".to_owned()).is_healthy());
        assert!(!HealthStatus::Degraded("slow".to_owned()).is_unhealthy());
        assert!(HealthStatus::Unhealthy("stopped".to_owned()).is_unhealthy());
    }

    #[test]
    fn health_serializes_with_reason() {
        let json = serde_json::to_string(&HealthStatus::Degraded("lagging".to_owned())).unwrap();
        assert!(json.contains("Degraded"));
        assert!(json.contains("lagging"));
    }
}
