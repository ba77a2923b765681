// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container log reader.
//!
//! Streams one container's timestamped log, splitting runner instructions
//! from plain output. The API server ends a log stream on rotation as well
//! as on termination, so EOF only ends the reader when nothing new arrived
//! since the last reopen, the container's last hint was seen, or the
//! container is known to be done. Otherwise the stream is reopened one
//! nanosecond after the last timestamp read.

mod buffer;
mod timestamp;

pub use buffer::{FLUSH_SIZE, HARD_FLUSH, SOFT_FLUSH};

use crate::client::{ApiError, LogSource, LogStream};
use buffer::LogBuffer;
use chrono::Utc;
use futures_util::io::{AsyncBufRead, AsyncBufReadExt};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use timestamp::{Prefix, TimestampReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use twc_core::instruction::{detect, may_be_instruction};
use twc_core::{Instruction, InstructionKind, Timestamp};

/// Longest slice of a line read at once.
pub const READ_CHUNK: usize = 65_536;
pub const RECONNECT_DELAY: Duration = Duration::from_millis(300);
pub const WAITING_TO_START_DELAY: Duration = Duration::from_millis(100);
pub const MAX_OPEN_RETRIES: u32 = 10;
pub const PROXY_RETRY_INITIAL: Duration = Duration::from_millis(500);
pub const PROXY_RETRY_MAX: Duration = Duration::from_secs(5);
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// One item read from a container log.
#[derive(Debug, Clone, PartialEq)]
pub enum ContainerLog {
    /// Batched plain output, timestamp prefixes included.
    Log { time: Timestamp, bytes: Vec<u8> },
    Hint { time: Timestamp, instruction: Instruction },
    Output { time: Timestamp, instruction: Instruction },
}

impl ContainerLog {
    pub fn time(&self) -> Timestamp {
        match self {
            Self::Log { time, .. } | Self::Hint { time, .. } | Self::Output { time, .. } => *time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LogError {
    #[error("failed to open logs of container {container}: {source}")]
    Open { container: String, source: ApiError },
    #[error("failed to read logs of container {container}: {message}")]
    Read { container: String, message: String },
    #[error("log stream idle timeout after {0:?}")]
    IdleTimeout(Duration),
}

/// Why opening a log stream failed, as far as retrying is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpenFailure {
    WaitingToStart,
    ConnectionLost,
    Proxy,
    Fatal,
}

impl OpenFailure {
    pub(crate) fn classify(message: &str) -> Self {
        if message.contains("is waiting to start") {
            Self::WaitingToStart
        } else if message.contains("connection lost") || message.contains("tls: internal error") {
            Self::ConnectionLost
        } else if message.contains("proxy error") {
            Self::Proxy
        } else {
            Self::Fatal
        }
    }

    /// Delay before the `attempt`-th retry (1-based).
    pub(crate) fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::WaitingToStart => WAITING_TO_START_DELAY,
            Self::ConnectionLost | Self::Fatal => RECONNECT_DELAY,
            Self::Proxy => {
                let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
                PROXY_RETRY_INITIAL.saturating_mul(factor).min(PROXY_RETRY_MAX)
            }
        }
    }
}

type DoneCheck = Arc<dyn Fn() -> bool + Send + Sync>;
type LastHintCheck = Arc<dyn Fn(&Instruction) -> bool + Send + Sync>;

/// Reader of one container's log.
pub struct LogReader {
    source: Arc<dyn LogSource>,
    pod: String,
    container: String,
    capacity: usize,
    idle_timeout: Duration,
    is_done: DoneCheck,
    is_last_hint: LastHintCheck,
}

impl LogReader {
    pub fn new(source: Arc<dyn LogSource>, pod: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            source,
            pod: pod.into(),
            container: container.into(),
            capacity: 64,
            idle_timeout: IDLE_TIMEOUT,
            is_done: Arc::new(|| false),
            is_last_hint: Arc::new(|_| false),
        }
    }

    twc_core::setters! {
        set {
            capacity: usize,
            idle_timeout: Duration,
        }
    }

    /// Whether the container is known to be terminated.
    pub fn done_when(mut self, check: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.is_done = Arc::new(check);
        self
    }

    /// Whether a hint is the last one the container prints.
    pub fn last_hint_when(mut self, check: impl Fn(&Instruction) -> bool + Send + Sync + 'static) -> Self {
        self.is_last_hint = Arc::new(check);
        self
    }

    /// Start reading. The channel closes once the log is exhausted, after a
    /// fatal error item, or when `cancel` fires.
    pub fn spawn(self, cancel: &CancellationToken) -> mpsc::Receiver<Result<ContainerLog, LogError>> {
        let (tx, rx) = mpsc::channel(self.capacity.max(1));
        let cancel = cancel.child_token();
        tokio::spawn(async move {
            let buffer = LogBuffer::spawn(tx, &cancel);
            if let Err(err) = self.run(&buffer, &cancel).await {
                tracing::debug!(pod = %self.pod, container = %self.container, error = %err, "log reader stopped");
                buffer.send(Err(err)).await;
            }
            buffer.close().await;
        });
        rx
    }

    async fn run(&self, buffer: &LogBuffer, cancel: &CancellationToken) -> Result<(), LogError> {
        let mut since: Option<Timestamp> = None;
        let Some(mut stream) = self.open(since, cancel).await? else {
            return Ok(());
        };

        let mut prefix = TimestampReader::new();
        let mut line = Vec::with_capacity(READ_CHUNK);
        let mut last_ts: Option<Timestamp> = None;
        let mut any_content = false;
        let mut completed = false;
        let mut pending_newline = false;

        loop {
            let read = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                read = self.read_prefix(&mut prefix, &mut stream) => read?,
            };
            let eof = match read {
                Ok(Prefix::Eof) => true,
                Err(err) if err.to_string().contains("GOAWAY") => true,
                Err(err) => return Err(self.read_error(err)),
                Ok(Prefix::Valid(ts)) => {
                    if !any_content && since.is_some_and(|since| ts < since) {
                        self.skip_line(&mut stream, &mut line).await?;
                        continue;
                    }
                    any_content = true;
                    last_ts = Some(ts);
                    false
                }
                Ok(Prefix::Invalid) => {
                    // Unprefixed output, e.g. errors injected by the kubelet.
                    let ts = last_ts.unwrap_or_else(Utc::now);
                    let rendered = prefix.format(ts);
                    if pending_newline {
                        buffer.append(ts, &[b"\n"]).await;
                    }
                    buffer.append(ts, &[rendered.as_bytes(), b" ", prefix.raw()]).await;
                    if prefix.raw().last() != Some(&b'\n') {
                        self.copy_line(&mut stream, &mut line, buffer, ts).await?;
                        buffer.append(ts, &[b"\n"]).await;
                    }
                    pending_newline = false;
                    continue;
                }
            };

            if eof {
                if !any_content || completed || (self.is_done)() {
                    return Ok(());
                }
                since = last_ts.map(|ts| ts + chrono::Duration::nanoseconds(1));
                tracing::debug!(pod = %self.pod, container = %self.container, ?since, "log stream ended early, reopening");
                stream = match self.open(since, cancel).await? {
                    Some(stream) => stream,
                    None => return Ok(()),
                };
                any_content = false;
                continue;
            }

            let ts = last_ts.unwrap_or_else(Utc::now);
            line.clear();
            let mut part = read_part(&mut stream, &mut line, READ_CHUNK).await.map_err(|e| self.read_error(e))?;

            // Blank lines separate instructions from output.
            if part != LinePart::Partial && line.is_empty() {
                if pending_newline {
                    buffer.append(ts, &[b"\n"]).await;
                }
                continue;
            }

            if !may_be_instruction(&line) {
                if pending_newline {
                    buffer.append(ts, &[b"\n"]).await;
                }
                buffer.append(ts, &[prefix.raw(), &line]).await;
                while part == LinePart::Partial {
                    line.clear();
                    part = read_part(&mut stream, &mut line, READ_CHUNK).await.map_err(|e| self.read_error(e))?;
                    buffer.append(ts, &[&line]).await;
                }
                pending_newline = true;
                continue;
            }

            while part == LinePart::Partial {
                part = read_part(&mut stream, &mut line, READ_CHUNK).await.map_err(|e| self.read_error(e))?;
            }

            let Some((kind, instruction)) = detect(&line) else {
                if pending_newline {
                    buffer.append(ts, &[b"\n"]).await;
                }
                buffer.append(ts, &[prefix.raw(), &line]).await;
                pending_newline = true;
                continue;
            };
            let item = match kind {
                InstructionKind::Hint => {
                    if !completed && (self.is_last_hint)(&instruction) {
                        completed = true;
                    }
                    ContainerLog::Hint { time: ts, instruction }
                }
                InstructionKind::Output => ContainerLog::Output { time: ts, instruction },
            };
            if !buffer.send(Ok(item)).await {
                return Ok(());
            }
            pending_newline = false;
        }
    }

    /// Open the stream, retrying transient failures. `None` when there is
    /// nothing to read: the container finished before it started, or the
    /// reader was cancelled.
    async fn open(
        &self,
        since: Option<Timestamp>,
        cancel: &CancellationToken,
    ) -> Result<Option<LogStream<'_>>, LogError> {
        let mut attempts = 0;
        loop {
            let follow = !(self.is_done)();
            let err = match self.source.open(&self.pod, &self.container, since, follow).await {
                Ok(stream) => return Ok(Some(stream)),
                Err(err) => err,
            };

            let failure = OpenFailure::classify(&err.to_string());
            let delay = match failure {
                OpenFailure::WaitingToStart if (self.is_done)() => return Ok(None),
                OpenFailure::WaitingToStart => failure.delay(0),
                OpenFailure::Fatal => return Err(self.open_error(err)),
                OpenFailure::ConnectionLost | OpenFailure::Proxy => {
                    attempts += 1;
                    if attempts > MAX_OPEN_RETRIES {
                        return Err(self.open_error(err));
                    }
                    let delay = failure.delay(attempts);
                    tracing::warn!(
                        pod = %self.pod,
                        container = %self.container,
                        attempt = attempts,
                        ?delay,
                        error = %err,
                        "failed to open container logs, retrying"
                    );
                    delay
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Read the next prefix. Waiting on a stream whose container is done
    /// fails after the idle timeout.
    async fn read_prefix(
        &self,
        prefix: &mut TimestampReader,
        stream: &mut LogStream<'_>,
    ) -> Result<io::Result<Prefix>, LogError> {
        let read = prefix.read(stream);
        tokio::pin!(read);
        loop {
            tokio::select! {
                result = &mut read => return Ok(result),
                _ = tokio::time::sleep(self.idle_timeout) => {
                    if (self.is_done)() {
                        return Err(LogError::IdleTimeout(self.idle_timeout));
                    }
                }
            }
        }
    }

    async fn skip_line(&self, stream: &mut LogStream<'_>, scratch: &mut Vec<u8>) -> Result<(), LogError> {
        loop {
            scratch.clear();
            if read_part(stream, scratch, READ_CHUNK).await.map_err(|e| self.read_error(e))? != LinePart::Partial {
                return Ok(());
            }
        }
    }

    async fn copy_line(
        &self,
        stream: &mut LogStream<'_>,
        scratch: &mut Vec<u8>,
        buffer: &LogBuffer,
        ts: Timestamp,
    ) -> Result<(), LogError> {
        loop {
            scratch.clear();
            let part = read_part(stream, scratch, READ_CHUNK).await.map_err(|e| self.read_error(e))?;
            buffer.append(ts, &[scratch.as_slice()]).await;
            if part != LinePart::Partial {
                return Ok(());
            }
        }
    }

    fn open_error(&self, source: ApiError) -> LogError {
        LogError::Open { container: self.container.clone(), source }
    }

    fn read_error(&self, err: io::Error) -> LogError {
        LogError::Read { container: self.container.clone(), message: err.to_string() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinePart {
    /// The line ended (newline stripped).
    Complete,
    /// `limit` bytes were read and the line goes on.
    Partial,
    Eof,
}

/// Append up to `limit` bytes of the current line to `out`.
async fn read_part<R>(reader: &mut R, out: &mut Vec<u8>, limit: usize) -> io::Result<LinePart>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    let start = out.len();
    loop {
        let (taken, part) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(if out.len() > start { LinePart::Complete } else { LinePart::Eof });
            }
            let room = limit.saturating_sub(out.len() - start);
            let window = &available[..available.len().min(room)];
            match window.iter().position(|b| *b == b'\n') {
                Some(i) => {
                    out.extend_from_slice(&window[..i]);
                    (i + 1, Some(LinePart::Complete))
                }
                None => {
                    out.extend_from_slice(window);
                    let full = out.len() - start >= limit;
                    (window.len(), full.then_some(LinePart::Partial))
                }
            }
        };
        reader.consume_unpin(taken);
        if let Some(part) = part {
            if part == LinePart::Complete && out.len() > start && out.last() == Some(&b'\r') {
                out.pop();
            }
            return Ok(part);
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
