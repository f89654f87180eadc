//! 파일 tailer -- 로그 파일을 폴링하며 새 라인을 전달합니다.
//!
//! `tail -F`와 유사하게 동작합니다. 한 인스턴스는 한 번에 하나의 파일만 따라갑니다.
//! 워커는 전용 스레드의 current-thread 런타임에서 돌기 때문에 `start()`는
//! tokio 런타임 밖의 스레드에서도 호출할 수 있습니다.
//!
//! # 로테이션 감지
//! 매 폴링마다 새 데이터를 읽기 전에 확인합니다.
//! - 파일 크기 축소 (truncation): 처음부터 다시 읽음
//! - 파일 앞부분 내용 변경 (제자리 truncation 후 다시 커진 경우): 처음부터 다시 읽음
//! - 크기는 같은데 마지막으로 따라잡은 뒤 수정 시각이 바뀐 상태가 두 폴링 연속 유지: 처음부터 다시 읽음
//! - inode 변경 (Unix, 새 파일로 교체): 새 파일을 처음부터 읽음
//! - 파일 삭제 후 재생성: 다시 나타나면 처음부터 읽음
//!
//! 로테이션이 감지되면 라인 번호가 리셋되어 다음 라인이 1번이 됩니다.
//! 파일이 없으면 에러를 기록하고 다음 폴링에서 재시도합니다.

use std::fs::Metadata;
use std::io::{self, SeekFrom};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, SystemTime};

use bytes::BytesMut;
use droptrack_core::metrics as m;
use droptrack_core::types::LogEntry;
use parking_lot::Mutex;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::error::LogPipelineError;
use crate::notifier::panic_message;

const ROTATION_TRUNCATED: &str = "truncated";
const ROTATION_REWRITTEN: &str = "rewritten";
const ROTATION_REPLACED: &str = "replaced";
const ROTATION_RECREATED: &str = "recreated";

/// 로테이션 비교에 쓰는 파일 앞부분 길이
const FINGERPRINT_BYTES: usize = 512;

/// 개행 없이 쌓일 수 있는 최대 라인 길이
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// tail된 라인을 받는 쪽
///
/// tailer 워커에서 파일 순서대로 동기 호출됩니다.
pub trait LineSink: Send + Sync {
    /// 라인 하나를 받습니다.
    fn deliver(&self, entry: LogEntry);
}

impl<F> LineSink for F
where
    F: Fn(LogEntry) + Send + Sync,
{
    fn deliver(&self, entry: LogEntry) {
        self(entry)
    }
}

/// tailer 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailerStatus {
    /// 시작 전
    Idle,
    /// 실행 중
    Running,
    /// 워커가 예기치 않게 종료됨
    Error(String),
    /// 정지됨
    Stopped,
}

impl std::fmt::Display for TailerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Error(reason) => write!(f, "error: {reason}"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

#[derive(Debug, Default)]
struct TailState {
    line_number: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl TailState {
    fn record_error(&self, reason: String) {
        *self.last_error.lock() = Some(reason);
    }

    fn clear_error(&self) {
        self.last_error.lock().take();
    }
}

struct Session {
    path: PathBuf,
    cancel: CancellationToken,
    thread: thread::JoinHandle<()>,
    /// 워커가 끝나면 완료됩니다. 워커가 panic하면 송신 측이 버려집니다.
    done: oneshot::Receiver<()>,
}

/// 파일 tailer
pub struct Tailer {
    poll_interval: Duration,
    read_buffer_size: usize,
    max_line_bytes: usize,
    sink: Arc<dyn LineSink>,
    state: Arc<TailState>,
    session: Option<Session>,
    stopped: bool,
}

impl Tailer {
    /// 새 tailer를 생성합니다.
    pub fn new(poll_interval: Duration, read_buffer_size: usize, sink: Arc<dyn LineSink>) -> Self {
        Self {
            poll_interval,
            read_buffer_size: read_buffer_size.max(1),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            sink,
            state: Arc::new(TailState::default()),
            session: None,
            stopped: false,
        }
    }

    /// 파이프라인 설정으로 tailer를 생성합니다.
    pub fn from_config(config: &PipelineConfig, sink: Arc<dyn LineSink>) -> Self {
        Self::new(config.poll_interval(), config.read_buffer_size, sink)
    }

    /// 라인 최대 길이를 지정합니다. 이보다 긴 라인은 버리고 라인 번호만 증가합니다.
    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes.max(1);
        self
    }

    /// tail을 시작합니다.
    ///
    /// 전용 워커 스레드를 띄우고 바로 반환하며, 어느 스레드에서든 호출할 수 있습니다.
    /// 이미 실행 중이면 경고를 남기고 아무것도 바꾸지 않은 채 `AlreadyTailing`을 반환합니다.
    pub fn start(&mut self, path: impl Into<PathBuf>, from_end: bool) -> Result<(), LogPipelineError> {
        let path = path.into();

        if let Some(session) = &self.session
            && !session.thread.is_finished()
        {
            warn!(
                current = %session.path.display(),
                requested = %path.display(),
                "tailer already running, ignoring start"
            );
            return Err(LogPipelineError::AlreadyTailing {
                path: session.path.display().to_string(),
            });
        }

        let tail_err = |reason: String| LogPipelineError::Tail {
            path: path.display().to_string(),
            reason,
        };
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| tail_err(format!("failed to build worker runtime: {e}")))?;

        let cancel = CancellationToken::new();
        let worker = TailWorker {
            path: path.clone(),
            from_end,
            poll_interval: self.poll_interval,
            read_buffer_size: self.read_buffer_size,
            max_line_bytes: self.max_line_bytes,
            sink: Arc::clone(&self.sink),
            state: Arc::clone(&self.state),
            cancel: cancel.clone(),
        };

        // 이전 세션의 카운터가 새 워커와 섞이지 않도록 스레드를 띄우기 전에 리셋
        self.state.line_number.store(0, Ordering::SeqCst);
        self.state.clear_error();
        metrics::gauge!(m::CURRENT_LINE_NUMBER).set(0.0);

        let (done_tx, done) = oneshot::channel();
        let thread = thread::Builder::new()
            .name("droptrack-tailer".to_owned())
            .spawn(move || {
                runtime.block_on(worker.run());
                let _ = done_tx.send(());
            })
            .map_err(|e| tail_err(format!("failed to spawn worker thread: {e}")))?;

        info!(path = %path.display(), from_end, "tailing started");
        self.session = Some(Session {
            path,
            cancel,
            thread,
            done,
        });
        self.stopped = false;
        Ok(())
    }

    /// tail을 정지합니다.
    ///
    /// 반환 이후에는 라인이 더 전달되지 않습니다. 여러 번 호출해도 안전합니다.
    pub async fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            debug!("tailer not running, stop ignored");
            return;
        };

        session.cancel.cancel();
        if session.done.await.is_err() {
            error!(path = %session.path.display(), "tail worker ended abnormally");
            if self.last_error().is_none() {
                self.state
                    .record_error("tail worker ended abnormally".to_owned());
            }
        }
        self.stopped = true;
        info!(
            path = %session.path.display(),
            lines = self.current_line_number(),
            "tailing stopped"
        );
    }

    /// 워커가 실행 중인지 확인합니다.
    pub fn is_running(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| !s.thread.is_finished())
    }

    /// 마지막으로 전달한 라인 번호 (아직 없으면 0)
    pub fn current_line_number(&self) -> u64 {
        self.state.line_number.load(Ordering::SeqCst)
    }

    /// 현재 tail 대상 경로
    pub fn path(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.path.as_path())
    }

    /// 마지막으로 기록된 에러
    pub fn last_error(&self) -> Option<String> {
        self.state.last_error.lock().clone()
    }

    /// 현재 상태를 반환합니다.
    pub fn status(&self) -> TailerStatus {
        match &self.session {
            Some(session) if session.thread.is_finished() => TailerStatus::Error(
                self.last_error()
                    .unwrap_or_else(|| "tail worker exited".to_owned()),
            ),
            Some(_) => TailerStatus::Running,
            None if self.stopped => TailerStatus::Stopped,
            None => TailerStatus::Idle,
        }
    }
}

impl Drop for Tailer {
    fn drop(&mut self) {
        if let Some(session) = &self.session {
            session.cancel.cancel();
        }
    }
}

/// 열려 있는 파일과 읽기 위치
struct Cursor {
    file: File,
    offset: u64,
    identity: Option<u64>,
    /// 지금까지 읽은 파일 앞부분 (최대 `FINGERPRINT_BYTES`)
    head: Vec<u8>,
    /// 마지막으로 EOF까지 따라잡았을 때의 수정 시각
    caught_up_at: Option<SystemTime>,
    /// 직전 폴링에서 같은 길이인데 수정 시각이 바뀐 것을 봤는지
    rewrite_suspected: bool,
}

impl Cursor {
    /// `start` 위치에서 읽은 바이트 중 앞부분에 해당하는 만큼 기록합니다.
    fn record_read(&mut self, start: u64, data: &[u8]) {
        if self.head.len() < FINGERPRINT_BYTES && self.head.len() as u64 == start {
            let take = data.len().min(FINGERPRINT_BYTES - self.head.len());
            self.head.extend_from_slice(&data[..take]);
        }
        self.caught_up_at = None;
        self.rewrite_suspected = false;
    }

    fn rewind(&mut self) {
        self.offset = 0;
        self.head.clear();
        self.caught_up_at = None;
        self.rewrite_suspected = false;
    }
}

/// 개행 단위로 라인을 잘라내는 버퍼
///
/// 개행 탐색은 이전에 확인한 위치부터 이어서 합니다. 개행 없이 `max_line`을
/// 넘으면 그 라인은 다음 개행까지 버립니다.
struct LineBuffer {
    buf: BytesMut,
    scanned: usize,
    max_line: usize,
    /// 현재 라인을 버리는 중이면 지금까지 버린 바이트 수
    discarded: Option<usize>,
}

enum Line {
    Complete(BytesMut),
    Oversized(usize),
}

impl LineBuffer {
    fn new(capacity: usize, max_line: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            scanned: 0,
            max_line,
            discarded: None,
        }
    }

    fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    fn next_line(&mut self) -> Option<Line> {
        if let Some(found) = self.buf[self.scanned..].iter().position(|&b| b == b'\n') {
            let pos = self.scanned + found;
            let mut line = self.buf.split_to(pos + 1);
            self.scanned = 0;

            if let Some(discarded) = self.discarded.take() {
                return Some(Line::Oversized(discarded + line.len()));
            }
            line.truncate(pos);
            if line.last() == Some(&b'\r') {
                line.truncate(pos - 1);
            }
            return Some(Line::Complete(line));
        }

        if self.buf.len() > self.max_line {
            *self.discarded.get_or_insert(0) += self.buf.len();
            self.buf.clear();
            self.scanned = 0;
        } else {
            self.scanned = self.buf.len();
        }
        None
    }

    fn clear(&mut self) {
        self.buf.clear();
        self.scanned = 0;
        self.discarded = None;
    }
}

enum Drain {
    Eof,
    Cancelled,
}

enum Rotation {
    None,
    Truncated(&'static str),
    Replaced,
    Missing,
}

struct TailWorker {
    path: PathBuf,
    from_end: bool,
    poll_interval: Duration,
    read_buffer_size: usize,
    max_line_bytes: usize,
    sink: Arc<dyn LineSink>,
    state: Arc<TailState>,
    cancel: CancellationToken,
}

impl TailWorker {
    async fn run(self) {
        let mut cursor: Option<Cursor> = None;
        let mut opened_once = false;
        let mut pending_rotation: Option<&'static str> = None;
        let mut missing_reported = false;
        let mut chunk = vec![0u8; self.read_buffer_size];
        let mut lines = LineBuffer::new(self.read_buffer_size, self.max_line_bytes);

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            if cursor.is_none() {
                match open_cursor(&self.path, self.from_end && !opened_once).await {
                    Ok(opened) => {
                        info!(path = %self.path.display(), offset = opened.offset, "log file opened");
                        if let Some(cause) = pending_rotation.take() {
                            self.rotated(cause, &mut lines);
                        }
                        opened_once = true;
                        missing_reported = false;
                        self.state.clear_error();
                        cursor = Some(opened);
                    }
                    Err(e) => {
                        self.open_failed(&e, &mut missing_reported);
                        if !self.pause().await {
                            break;
                        }
                        continue;
                    }
                }
            }

            let Some(current) = cursor.as_mut() else {
                continue;
            };

            // 읽기 전에 확인해야 교체된 내용을 이전 오프셋부터 읽지 않습니다.
            match detect_rotation(&self.path, current).await {
                Rotation::None => {}
                Rotation::Truncated(cause) => {
                    if let Err(e) = current.file.seek(SeekFrom::Start(0)).await {
                        warn!(path = %self.path.display(), error = %e, "rewind failed, reopening");
                        cursor = None;
                        pending_rotation = Some(cause);
                        continue;
                    }
                    current.rewind();
                    self.rotated(cause, &mut lines);
                }
                Rotation::Replaced => {
                    cursor = None;
                    pending_rotation = Some(ROTATION_REPLACED);
                    continue;
                }
                Rotation::Missing => {
                    debug!(path = %self.path.display(), "log file disappeared, waiting");
                    cursor = None;
                    pending_rotation = Some(ROTATION_RECREATED);
                    if !self.pause().await {
                        break;
                    }
                    continue;
                }
            }

            match self.drain(current, &mut chunk, &mut lines).await {
                Ok(Drain::Cancelled) => break,
                Ok(Drain::Eof) => {}
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "read failed, retrying");
                    metrics::counter!(m::TAIL_ERRORS_TOTAL).increment(1);
                    self.state.record_error(e.to_string());
                }
            }

            if !self.pause().await {
                break;
            }
        }

        debug!(path = %self.path.display(), "tail worker exiting");
    }

    /// EOF까지 읽으며 완성된 라인을 전달합니다.
    async fn drain(
        &self,
        cursor: &mut Cursor,
        chunk: &mut [u8],
        lines: &mut LineBuffer,
    ) -> io::Result<Drain> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(Drain::Cancelled);
            }

            let n = cursor.file.read(chunk).await?;
            if n == 0 {
                return Ok(Drain::Eof);
            }
            cursor.record_read(cursor.offset, &chunk[..n]);
            cursor.offset += n as u64;
            lines.extend(&chunk[..n]);

            while let Some(line) = lines.next_line() {
                if self.cancel.is_cancelled() {
                    return Ok(Drain::Cancelled);
                }
                match line {
                    Line::Complete(line) => self.emit(String::from_utf8_lossy(&line).into_owned()),
                    Line::Oversized(len) => self.skip_oversized(len),
                }
            }
        }
    }

    fn emit(&self, raw_line: String) {
        let line_number = self.next_line_number();

        let entry = LogEntry::new(raw_line, line_number);
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| self.sink.deliver(entry))) {
            let reason = format!("line sink panicked: {}", panic_message(payload.as_ref()));
            warn!(line = line_number, reason = %reason, "line delivery failed");
            self.state.record_error(reason);
        }
    }

    fn skip_oversized(&self, len: usize) {
        let line_number = self.next_line_number();
        warn!(
            path = %self.path.display(),
            line = line_number,
            bytes = len,
            limit = self.max_line_bytes,
            "line exceeds maximum length, skipped"
        );
        metrics::counter!(m::TAIL_ERRORS_TOTAL).increment(1);
    }

    fn next_line_number(&self) -> u64 {
        let line_number = self.state.line_number.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::counter!(m::LINES_READ_TOTAL).increment(1);
        metrics::gauge!(m::CURRENT_LINE_NUMBER).set(line_number as f64);
        line_number
    }

    fn rotated(&self, cause: &'static str, lines: &mut LineBuffer) {
        let previous = self.state.line_number.swap(0, Ordering::SeqCst);
        lines.clear();
        metrics::counter!(m::ROTATIONS_TOTAL, m::LABEL_ROTATION => cause).increment(1);
        metrics::gauge!(m::CURRENT_LINE_NUMBER).set(0.0);
        info!(
            path = %self.path.display(),
            cause,
            previous_lines = previous,
            "log rotation detected, line counter reset"
        );
    }

    fn open_failed(&self, e: &io::Error, missing_reported: &mut bool) {
        if e.kind() == io::ErrorKind::NotFound {
            if !*missing_reported {
                warn!(path = %self.path.display(), "log file not found, will retry");
                metrics::counter!(m::TAIL_ERRORS_TOTAL).increment(1);
                *missing_reported = true;
            }
        } else {
            warn!(path = %self.path.display(), error = %e, "failed to open log file, will retry");
            metrics::counter!(m::TAIL_ERRORS_TOTAL).increment(1);
        }
        self.state
            .record_error(format!("{}: {e}", self.path.display()));
    }

    /// 폴링 간격만큼 대기합니다. 취소되면 `false`를 반환합니다.
    async fn pause(&self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.poll_interval) => true,
        }
    }
}

async fn open_cursor(path: &Path, seek_end: bool) -> io::Result<Cursor> {
    let mut file = File::open(path).await?;
    let identity = file_identity(&file.metadata().await?);

    let (offset, head) = if seek_end {
        let head = read_head(&mut file, FINGERPRINT_BYTES).await?;
        (file.seek(SeekFrom::End(0)).await?, head)
    } else {
        (0, Vec::new())
    };

    Ok(Cursor {
        file,
        offset,
        identity,
        head,
        caught_up_at: None,
        rewrite_suspected: false,
    })
}

async fn read_head(file: &mut File, len: usize) -> io::Result<Vec<u8>> {
    let mut head = Vec::with_capacity(len);
    file.take(len as u64).read_to_end(&mut head).await?;
    Ok(head)
}

async fn detect_rotation(path: &Path, cursor: &mut Cursor) -> Rotation {
    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Rotation::Missing,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "metadata unavailable, retrying");
            return Rotation::None;
        }
    };

    if let (Some(current), Some(seen)) = (file_identity(&meta), cursor.identity)
        && current != seen
    {
        return Rotation::Replaced;
    }
    if meta.len() < cursor.offset {
        return Rotation::Truncated(ROTATION_TRUNCATED);
    }

    if !cursor.head.is_empty() {
        match File::open(path).await {
            Ok(mut file) => match read_head(&mut file, cursor.head.len()).await {
                Ok(head) if head != cursor.head => {
                    return Rotation::Truncated(ROTATION_REWRITTEN);
                }
                Ok(_) => {}
                Err(e) => debug!(path = %path.display(), error = %e, "fingerprint read failed"),
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Rotation::Missing,
            Err(e) => debug!(path = %path.display(), error = %e, "fingerprint open failed"),
        }
    }

    // 이미 끝까지 읽었는데 그 뒤로 같은 길이로 다시 쓰인 경우.
    // 쓰기 도중에는 수정 시각이 크기보다 먼저 바뀔 수 있어 두 번 연속 확인합니다.
    if meta.len() == cursor.offset
        && let Ok(modified) = meta.modified()
    {
        match cursor.caught_up_at {
            Some(seen) if modified > seen => {
                if cursor.rewrite_suspected {
                    return Rotation::Truncated(ROTATION_REWRITTEN);
                }
                cursor.rewrite_suspected = true;
            }
            Some(_) => cursor.rewrite_suspected = false,
            None => cursor.caught_up_at = Some(modified),
        }
    }

    Rotation::None
}

#[cfg(unix)]
fn file_identity(meta: &Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(meta.ino())
}

#[cfg(not(unix))]
fn file_identity(_meta: &Metadata) -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Instant;

    #[derive(Default)]
    struct Collector {
        lines: Mutex<Vec<(u64, String)>>,
    }

    impl LineSink for Collector {
        fn deliver(&self, entry: LogEntry) {
            self.lines.lock().push((entry.line_number, entry.raw_line));
        }
    }

    impl Collector {
        fn snapshot(&self) -> Vec<(u64, String)> {
            self.lines.lock().clone()
        }
    }

    fn tailer(sink: Arc<Collector>) -> Tailer {
        Tailer::new(Duration::from_millis(10), 64, sink)
    }

    fn append(path: &Path, text: &str) {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file.flush().unwrap();
    }

    async fn wait_for(mut cond: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not met within 5s");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn numbered(lines: &[(u64, &str)]) -> Vec<(u64, String)> {
        lines.iter().map(|(n, s)| (*n, (*s).to_owned())).collect()
    }

    #[test]
    fn new_tailer_is_idle() {
        let t = tailer(Arc::new(Collector::default()));
        assert!(!t.is_running());
        assert_eq!(t.status(), TailerStatus::Idle);
        assert_eq!(t.current_line_number(), 0);
    }

    #[test]
    fn starts_from_thread_without_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.log");
        append(&path, "first\nsecond\n");

        let sink = Arc::new(Collector::default());
        let mut t = tailer(sink.clone());
        assert!(tokio::runtime::Handle::try_current().is_err());
        t.start(&path, false).unwrap();
        assert_eq!(t.status(), TailerStatus::Running);

        let deadline = Instant::now() + Duration::from_secs(5);
        while sink.snapshot().len() < 2 {
            assert!(Instant::now() < deadline, "lines not delivered within 5s");
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(sink.snapshot(), numbered(&[(1, "first"), (2, "second")]));

        tokio::runtime::Runtime::new().unwrap().block_on(t.stop());
        assert_eq!(t.status(), TailerStatus::Stopped);
    }

    #[tokio::test]
    async fn starts_from_plain_thread_inside_async_app() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.log");
        append(&path, "hello\n");

        let sink = Arc::new(Collector::default());
        let collector = Arc::clone(&sink);
        let start_path = path.clone();
        let mut t = std::thread::spawn(move || {
            let mut t = tailer(collector);
            t.start(&start_path, false).map(|_| t)
        })
        .join()
        .unwrap()
        .unwrap();

        wait_for(|| sink.snapshot().len() == 1).await;
        append(&path, "world\n");
        wait_for(|| sink.snapshot().len() == 2).await;
        assert_eq!(sink.snapshot(), numbered(&[(1, "hello"), (2, "world")]));
        t.stop().await;
    }

    #[test]
    fn line_buffer_resumes_scan_and_strips_cr() {
        let mut lines = LineBuffer::new(16, 64);
        lines.extend(b"par");
        assert!(lines.next_line().is_none());
        assert_eq!(lines.scanned, 3);

        lines.extend(b"tial\r\nnext");
        match lines.next_line() {
            Some(Line::Complete(line)) => assert_eq!(&line[..], b"partial"),
            _ => panic!("expected a complete line"),
        }
        assert!(lines.next_line().is_none());
        assert_eq!(&lines.buf[..], b"next");
    }

    #[test]
    fn line_buffer_drops_oversized_line() {
        let mut lines = LineBuffer::new(16, 8);
        lines.extend(b"0123456789");
        assert!(lines.next_line().is_none());
        assert!(lines.buf.is_empty());

        lines.extend(b"abc\nok\n");
        assert!(matches!(lines.next_line(), Some(Line::Oversized(14))));
        match lines.next_line() {
            Some(Line::Complete(line)) => assert_eq!(&line[..], b"ok"),
            _ => panic!("expected a complete line"),
        }
        assert!(lines.next_line().is_none());
    }

    #[tokio::test]
    async fn oversized_line_is_skipped_but_counted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.log");
        append(&path, &format!("short\n{}\nafter\n", "x".repeat(300)));

        let sink = Arc::new(Collector::default());
        let mut t = tailer(sink.clone()).with_max_line_bytes(128);
        t.start(&path, false).unwrap();

        wait_for(|| sink.snapshot().len() == 2).await;
        assert_eq!(sink.snapshot(), numbered(&[(1, "short"), (3, "after")]));
        assert_eq!(t.current_line_number(), 3);
        t.stop().await;
    }

    #[tokio::test]
    async fn reads_from_beginning_with_line_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.log");
        append(&path, "first\nsecond\r\n");

        let sink = Arc::new(Collector::default());
        let mut t = tailer(sink.clone());
        t.start(&path, false).unwrap();
        assert_eq!(t.status(), TailerStatus::Running);

        wait_for(|| sink.snapshot().len() == 2).await;
        append(&path, "third\n");
        wait_for(|| sink.snapshot().len() == 3).await;

        assert_eq!(
            sink.snapshot(),
            numbered(&[(1, "first"), (2, "second"), (3, "third")])
        );
        assert_eq!(t.current_line_number(), 3);
        t.stop().await;
    }

    #[tokio::test]
    async fn from_end_skips_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.log");
        append(&path, "old line\n");

        let sink = Arc::new(Collector::default());
        let mut t = tailer(sink.clone());
        t.start(&path, true).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        append(&path, "new line\n");
        wait_for(|| !sink.snapshot().is_empty()).await;
        assert_eq!(sink.snapshot(), numbered(&[(1, "new line")]));
        t.stop().await;
    }

    #[tokio::test]
    async fn partial_line_waits_for_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.log");
        append(&path, "");

        let sink = Arc::new(Collector::default());
        let mut t = tailer(sink.clone());
        t.start(&path, false).unwrap();

        append(&path, "half");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(sink.snapshot().is_empty());

        append(&path, " and rest\n");
        wait_for(|| sink.snapshot().len() == 1).await;
        assert_eq!(sink.snapshot(), numbered(&[(1, "half and rest")]));
        t.stop().await;
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.log");
        append(&path, "");

        let mut t = tailer(Arc::new(Collector::default()));
        t.start(&path, false).unwrap();
        let err = t.start(dir.path().join("other.log"), false).unwrap_err();
        assert!(matches!(err, LogPipelineError::AlreadyTailing { .. }));
        assert_eq!(t.path(), Some(path.as_path()));
        t.stop().await;
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_halts_delivery() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.log");
        append(&path, "a\n");

        let sink = Arc::new(Collector::default());
        let mut t = tailer(sink.clone());
        t.stop().await;
        t.start(&path, false).unwrap();
        wait_for(|| sink.snapshot().len() == 1).await;

        t.stop().await;
        t.stop().await;
        assert!(!t.is_running());
        assert_eq!(t.status(), TailerStatus::Stopped);

        append(&path, "b\n");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(sink.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn restart_resets_line_counter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.log");
        append(&path, "a\nb\n");

        let sink = Arc::new(Collector::default());
        let mut t = tailer(sink.clone());
        t.start(&path, false).unwrap();
        wait_for(|| sink.snapshot().len() == 2).await;
        t.stop().await;

        t.start(&path, false).unwrap();
        wait_for(|| sink.snapshot().len() == 4).await;
        assert_eq!(sink.snapshot()[2], (1, "a".to_owned()));
        t.stop().await;
    }

    #[tokio::test]
    async fn truncation_resets_line_counter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.log");
        append(&path, "one long line before rotation\ntwo long line before rotation\n");

        let sink = Arc::new(Collector::default());
        let mut t = tailer(sink.clone());
        t.start(&path, false).unwrap();
        wait_for(|| sink.snapshot().len() == 2).await;

        std::fs::File::create(&path).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        append(&path, "after\n");

        wait_for(|| sink.snapshot().len() == 3).await;
        assert_eq!(sink.snapshot()[2], (1, "after".to_owned()));
        t.stop().await;
    }

    #[tokio::test]
    async fn rewrite_in_place_within_one_poll_restarts_from_top() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.log");
        append(&path, "old-1\nold-2\n");

        let sink = Arc::new(Collector::default());
        let mut t = Tailer::new(Duration::from_millis(300), 64, sink.clone());
        t.start(&path, false).unwrap();
        wait_for(|| sink.snapshot().len() == 2).await;

        // 한 폴링 간격 안에 잘라낸 뒤 이전보다 길게 다시 씀
        std::fs::write(&path, "new-1 session start\nnew-2 more\n").unwrap();

        wait_for(|| sink.snapshot().len() == 4).await;
        assert_eq!(
            sink.snapshot(),
            numbered(&[
                (1, "old-1"),
                (2, "old-2"),
                (1, "new-1 session start"),
                (2, "new-2 more"),
            ])
        );
        t.stop().await;
    }

    #[tokio::test]
    async fn changed_head_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.log");
        append(&path, "aaaa\n");

        let sink = Arc::new(Collector::default());
        let mut t = tailer(sink.clone());
        t.start(&path, false).unwrap();
        wait_for(|| sink.snapshot().len() == 1).await;

        std::fs::write(&path, "bbbb\ncccc\n").unwrap();
        wait_for(|| sink.snapshot().len() == 3).await;
        assert_eq!(
            sink.snapshot()[1..],
            numbered(&[(1, "bbbb"), (2, "cccc")])[..]
        );
        t.stop().await;
    }

    #[tokio::test]
    async fn newer_file_at_same_length_is_reread() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.log");
        append(&path, "same\n");

        let sink = Arc::new(Collector::default());
        let mut t = tailer(sink.clone());
        t.start(&path, false).unwrap();
        wait_for(|| sink.snapshot().len() == 1).await;
        // 따라잡은 시점의 수정 시각이 기록될 때까지 몇 번 폴링
        tokio::time::sleep(Duration::from_millis(100)).await;

        std::fs::write(&path, "same\n").unwrap();
        wait_for(|| sink.snapshot().len() == 2).await;
        assert_eq!(sink.snapshot(), numbered(&[(1, "same"), (1, "same")]));
        t.stop().await;
    }

    #[tokio::test]
    async fn from_end_detects_rewrite_of_skipped_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.log");
        append(&path, "skipped-1\nskipped-2\n");

        let sink = Arc::new(Collector::default());
        let mut t = tailer(sink.clone());
        t.start(&path, true).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        std::fs::write(&path, "fresh session line one\n").unwrap();
        wait_for(|| !sink.snapshot().is_empty()).await;
        assert_eq!(sink.snapshot(), numbered(&[(1, "fresh session line one")]));
        t.stop().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn replaced_file_is_read_from_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.log");
        append(&path, "x\n");

        let sink = Arc::new(Collector::default());
        let mut t = tailer(sink.clone());
        t.start(&path, false).unwrap();
        wait_for(|| sink.snapshot().len() == 1).await;

        let staged = dir.path().join("game.log.new");
        append(&staged, "fresh 1\nfresh 2\n");
        std::fs::rename(&staged, &path).unwrap();

        wait_for(|| sink.snapshot().len() == 3).await;
        assert_eq!(
            sink.snapshot()[1..],
            numbered(&[(1, "fresh 1"), (2, "fresh 2")])[..]
        );
        t.stop().await;
    }

    #[tokio::test]
    async fn missing_file_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("later.log");

        let sink = Arc::new(Collector::default());
        let mut t = tailer(sink.clone());
        t.start(&path, false).unwrap();

        wait_for(|| t.last_error().is_some()).await;
        assert!(t.is_running());

        append(&path, "hello\n");
        wait_for(|| sink.snapshot().len() == 1).await;
        assert!(t.last_error().is_none());
        t.stop().await;
    }

    #[tokio::test]
    async fn panicking_sink_does_not_kill_worker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.log");
        append(&path, "boom\nok\n");

        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = Arc::clone(&seen);
        let sink = move |entry: LogEntry| {
            if entry.raw_line == "boom" {
                panic!("sink failure");
            }
            record.lock().push(entry.line_number);
        };

        let mut t = Tailer::new(Duration::from_millis(10), 64, Arc::new(sink));
        t.start(&path, false).unwrap();
        wait_for(|| seen.lock().len() == 1).await;

        assert_eq!(*seen.lock(), vec![2]);
        assert!(t.is_running());
        assert!(t.last_error().unwrap_or_default().contains("sink failure"));
        t.stop().await;
    }
}
