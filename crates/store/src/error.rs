//! 저장소 에러 타입
//!
//! `From<StoreError> for NetwatchError` 변환으로 데몬에서 `?`로 전파합니다.

use netwatch_core::error::{NetwatchError, StorageError};

/// 저장소 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// 데이터베이스를 열 수 없음 (기동 실패)
    #[error("failed to open store at {path}: {reason}")]
    Open {
        /// 데이터베이스 경로
        path: String,
        /// 실패 사유
        reason: String,
    },

    /// redb 읽기/쓰기 실패
    #[error("backend error: {0}")]
    Backend(#[from] redb::Error),

    /// 장치 레코드 직렬화 실패
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<StoreError> for NetwatchError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Open { path, reason } => {
                NetwatchError::Storage(StorageError::Open { path, reason })
            }
            other => NetwatchError::Storage(StorageError::Backend(other.to_string())),
        }
    }
}
