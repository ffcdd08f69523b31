#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`model`]: `Device` / `HostVisit` / `VisitRecord` 데이터 모델
//! - [`backend`]: [`StoreBackend`] 트레이트와 redb 구현
//! - [`store`]: 인덱스와 정책 집합을 관리하는 [`DeviceStore`]
//! - [`error`]: 도메인 에러 타입

pub mod backend;
pub mod error;
pub mod model;
pub mod store;

pub use backend::{KeySet, Loaded, RedbBackend, StoreBackend};
pub use error::StoreError;
pub use model::{Device, HostVisit, VisitRecord};
pub use store::DeviceStore;
