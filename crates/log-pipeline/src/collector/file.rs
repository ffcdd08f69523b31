//! 파일 기반 로그 추적기
//!
//! 로그 파일의 현재 끝에서 시작하여 새로 추가된 라인만 읽습니다.
//! `tail -F`와 유사한 동작을 비동기 폴링 방식으로 구현합니다.
//!
//! # 로테이션 감지
//! - inode 변경 감지 (logrotate 등) → 새 파일을 처음부터 읽음
//! - 파일 크기 축소 감지 (truncation) → 처음부터 다시 읽음
//! - 경로에 파일이 잠시 없으면 기존 핸들을 유지하고 다음 폴링에서 재확인

use std::path::{Path, PathBuf};
use std::time::Duration;

use netwatch_core::event::NetworkEvent;
use netwatch_core::metrics as m;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::correlator::Correlator;
use crate::error::LogPipelineError;

/// 한 번의 폴링에서 읽을 최대 바이트 수
const MAX_READ_BYTES: u64 = 1024 * 1024;

/// 진행 상황을 기록하는 라인 간격
const PROGRESS_EVERY: u64 = 100;

/// 파일 추적기
///
/// [`FileTailer::open`]은 파일을 열고 끝으로 이동합니다. 기존 내용은 다시 처리하지 않습니다.
/// 이후 [`FileTailer::poll`]을 호출할 때마다 새로 추가된 완전한 라인을 반환합니다.
pub struct FileTailer {
    /// 파일 경로
    path: PathBuf,
    /// 현재 열린 핸들
    file: File,
    /// 마지막 읽기 위치 (바이트 오프셋)
    offset: u64,
    /// 현재 파일의 inode (Unix 전용, 그 외는 `None`)
    inode: Option<u64>,
    /// 최대 라인 길이 (바이트)
    max_line_length: usize,
    /// 개행을 아직 만나지 못한 라인 조각
    partial: Vec<u8>,
    /// 너무 긴 라인의 나머지를 버리는 중
    discarding: bool,
    /// 지금까지 읽은 라인 수
    lines_read: u64,
}

impl FileTailer {
    /// 파일을 열고 끝으로 이동합니다.
    ///
    /// 파일을 열 수 없으면 [`LogPipelineError::Open`]을 반환합니다.
    pub async fn open(
        path: impl AsRef<Path>,
        max_line_length: usize,
    ) -> Result<Self, LogPipelineError> {
        let path = path.as_ref().to_path_buf();
        let open_err = |reason: String| LogPipelineError::Open {
            path: path.display().to_string(),
            reason,
        };

        let mut file = File::open(&path)
            .await
            .map_err(|e| open_err(e.to_string()))?;
        let meta = file.metadata().await.map_err(|e| open_err(e.to_string()))?;
        if !meta.is_file() {
            return Err(open_err("not a regular file".to_owned()));
        }
        let offset = file.seek(SeekFrom::End(0)).await?;

        info!(path = %path.display(), offset, "tailing log file");

        Ok(Self {
            inode: inode_of(&meta),
            path,
            file,
            offset,
            max_line_length,
            partial: Vec::new(),
            discarding: false,
            lines_read: 0,
        })
    }

    /// 추적 중인 파일 경로
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 지금까지 읽은 라인 수
    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    /// 새로 추가된 완전한 라인을 읽습니다.
    ///
    /// 새 바이트가 전혀 없으면 `None`을 반환합니다 (유휴 폴링).
    pub async fn poll(&mut self) -> Result<Option<Vec<String>>, LogPipelineError> {
        let mut lines = Vec::new();

        // 로테이션 전에 기존 핸들에 남은 내용을 먼저 읽음
        let mut read = self.read_available(&mut lines).await?;
        if self.reopen_if_rotated().await? {
            read += self.read_available(&mut lines).await?;
        }

        Ok((read > 0).then_some(lines))
    }

    /// 취소될 때까지 폴링하며 라인을 상관기에 전달하고 이벤트를 채널로 보냅니다.
    ///
    /// 종료 시 상관기에 남은 요청을 방출한 뒤 `tx`를 놓아 채널을 닫습니다.
    /// 수신 측이 먼저 닫히면 즉시 종료합니다.
    pub async fn run(
        mut self,
        poll_interval: Duration,
        mut correlator: Correlator,
        tx: mpsc::Sender<NetworkEvent>,
        cancel: CancellationToken,
    ) -> Result<(), LogPipelineError> {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(path = %self.path.display(), "log tailer received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {}
            }

            let mut events = Vec::new();
            match self.poll().await {
                Ok(Some(lines)) => {
                    for line in &lines {
                        events.extend(correlator.feed(line));
                    }
                }
                Ok(None) => events.extend(correlator.flush()),
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "failed to read log file, retrying");
                    continue;
                }
            }

            for event in events {
                if !emit(&tx, event).await {
                    info!("event receiver closed, stopping log tailer");
                    return Ok(());
                }
            }
        }

        if let Some(event) = correlator.flush() {
            emit(&tx, event).await;
        }
        info!(lines = self.lines_read, "log tailer stopped");
        Ok(())
    }

    /// 현재 핸들에서 읽을 수 있는 만큼 읽어 라인으로 나눕니다.
    async fn read_available(&mut self, lines: &mut Vec<String>) -> Result<usize, LogPipelineError> {
        let mut buf = Vec::new();
        let n = (&mut self.file)
            .take(MAX_READ_BYTES)
            .read_to_end(&mut buf)
            .await?;
        self.offset += n as u64;
        self.split_lines(&buf, lines);
        Ok(n)
    }

    /// 경로의 파일이 교체되었거나 잘렸으면 처음부터 다시 읽도록 준비합니다.
    async fn reopen_if_rotated(&mut self) -> Result<bool, LogPipelineError> {
        let meta = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let replaced = inode_of(&meta) != self.inode;
        let truncated = !replaced && meta.len() < self.offset;
        if !replaced && !truncated {
            return Ok(false);
        }

        if replaced {
            let file = File::open(&self.path).await?;
            self.inode = inode_of(&file.metadata().await?);
            self.file = file;
        } else {
            self.file.seek(SeekFrom::Start(0)).await?;
        }

        self.offset = 0;
        self.partial.clear();
        self.discarding = false;

        info!(
            path = %self.path.display(),
            replaced,
            truncated,
            "log file rotated, reading from start"
        );
        metrics::counter!(m::LOG_PIPELINE_ROTATIONS_TOTAL).increment(1);
        Ok(true)
    }

    /// 바이트를 개행 단위로 나눕니다. 마지막 불완전한 조각은 다음 읽기까지 보관합니다.
    fn split_lines(&mut self, data: &[u8], lines: &mut Vec<String>) {
        let mut rest = data;
        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            let (chunk, tail) = rest.split_at(pos);
            rest = &tail[1..];

            if self.discarding {
                // 너무 긴 라인의 끝
                self.discarding = false;
                continue;
            }

            self.partial.extend_from_slice(chunk);
            let line = std::mem::take(&mut self.partial);
            self.push_line(line, lines);
        }

        if !rest.is_empty() && !self.discarding {
            self.partial.extend_from_slice(rest);
            if self.partial.len() > self.max_line_length {
                self.drop_line(self.partial.len());
                self.partial.clear();
                self.discarding = true;
            }
        }
    }

    fn push_line(&mut self, mut line: Vec<u8>, lines: &mut Vec<String>) {
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        if line.is_empty() {
            return;
        }
        if line.len() > self.max_line_length {
            self.drop_line(line.len());
            return;
        }

        self.lines_read += 1;
        metrics::counter!(m::LOG_PIPELINE_LINES_READ_TOTAL).increment(1);
        if self.lines_read % PROGRESS_EVERY == 0 {
            debug!(lines = self.lines_read, "lines read");
        }

        lines.push(String::from_utf8_lossy(&line).into_owned());
    }

    fn drop_line(&self, len: usize) {
        warn!(
            path = %self.path.display(),
            len,
            max = self.max_line_length,
            "log line exceeds maximum length, dropping"
        );
        metrics::counter!(m::LOG_PIPELINE_LINES_DROPPED_TOTAL).increment(1);
    }
}

/// 이벤트를 채널로 보냅니다. 수신 측이 닫혔으면 `false`.
async fn emit(tx: &mpsc::Sender<NetworkEvent>, event: NetworkEvent) -> bool {
    let kind = event.kind();
    match tx.send(event).await {
        Ok(()) => {
            metrics::counter!(m::LOG_PIPELINE_EVENTS_EMITTED_TOTAL, m::LABEL_KIND => kind)
                .increment(1);
            true
        }
        Err(_) => false,
    }
}

#[cfg(unix)]
fn inode_of(meta: &std::fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(meta.ino())
}

#[cfg(not(unix))]
fn inode_of(_meta: &std::fs::Metadata) -> Option<u64> {
    None
}
