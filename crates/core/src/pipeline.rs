//! 파이프라인 trait -- 수명 주기 확장 포인트 정의
//!
//! 데몬은 [`Pipeline`] trait을 통해 tail 세션을 시작/정지하고
//! [`HealthStatus`]로 상태를 보고합니다.

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::DroptrackError;

/// 파이프라인 상태 보고
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum HealthStatus {
    /// 정상 동작
    Healthy,
    /// 동작 중이지만 문제가 있음 (예: 대상 파일 없음)
    Degraded(String),
    /// 동작하지 않음
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 비정상 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

/// 수명 주기를 가진 파이프라인
///
/// 구현체는 `async fn`으로 작성할 수 있습니다.
pub trait Pipeline: Send {
    /// 파이프라인을 시작합니다. 이미 실행 중이면 에러를 반환합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), DroptrackError>> + Send;

    /// 파이프라인을 정지합니다. 정지 후에는 더 이상 라인이 처리되지 않습니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), DroptrackError>> + Send;

    /// 현재 상태를 보고합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_status_predicates() {
        assert!(HealthStatus::Healthy.is_healthy());
        assert!(!HealthStatus::Degraded("x".to_owned()).is_healthy());
        assert!(!HealthStatus::Degraded("x".to_owned()).is_unhealthy());
        assert!(HealthStatus::Unhealthy("x".to_owned()).is_unhealthy());
    }

    #[test]
    fn health_status_serializes_with_reason() {
        let json = serde_json::to_string(&HealthStatus::Degraded("file missing".to_owned()))
            .unwrap_or_default();
        assert!(json.contains("degraded"));
        assert!(json.contains("file missing"));
    }

    #[test]
    fn health_status_display() {
        assert_eq!(HealthStatus::Healthy.to_string(), "healthy");
        assert_eq!(
            HealthStatus::Unhealthy("stopped".to_owned()).to_string(),
            "unhealthy: stopped"
        );
    }
}
