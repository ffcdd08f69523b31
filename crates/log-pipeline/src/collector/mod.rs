//! 로그 수집 모듈 -- 파일 추적기
//!
//! [`FileTailer`]는 `tail -F`처럼 로그 파일의 끝에서부터 새로 추가된 라인을 읽고,
//! 로테이션(inode 변경)과 truncation(크기 축소)을 감지하면 파일을 다시 엽니다.
//! 읽은 라인은 [`Correlator`](crate::correlator::Correlator)에 순서대로 전달됩니다.

pub mod file;

pub use file::FileTailer;
