// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Batching of plain container output.
//!
//! Output is flushed as one [`ContainerLog::Log`] once it grows past
//! [`FLUSH_SIZE`], after [`SOFT_FLUSH`] without new output, or at most
//! [`HARD_FLUSH`] after the first pending byte. Other items go through
//! [`LogBuffer::send`], which flushes first so the stream keeps its order.

use super::{ContainerLog, LogError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio_util::sync::CancellationToken;
use twc_core::Timestamp;

pub const FLUSH_SIZE: usize = 100_000;
pub const SOFT_FLUSH: Duration = Duration::from_millis(50);
pub const HARD_FLUSH: Duration = Duration::from_millis(100);

pub(crate) type LogSender = mpsc::Sender<Result<ContainerLog, LogError>>;

struct Pending {
    bytes: Vec<u8>,
    time: Option<Timestamp>,
    tx: LogSender,
}

#[derive(Clone)]
pub(crate) struct LogBuffer {
    pending: Arc<Mutex<Pending>>,
    wake: Arc<Notify>,
    cancel: CancellationToken,
    flusher: CancellationToken,
}

impl LogBuffer {
    /// Wrap `tx` and start the timed flusher. Delivery stops once `cancel` fires.
    pub(crate) fn spawn(tx: LogSender, cancel: &CancellationToken) -> Self {
        let buffer = Self {
            pending: Arc::new(Mutex::new(Pending { bytes: Vec::new(), time: None, tx })),
            wake: Arc::new(Notify::new()),
            cancel: cancel.clone(),
            flusher: cancel.child_token(),
        };
        tokio::spawn(buffer.clone().flush_loop());
        buffer
    }

    /// Queue output observed at `ts`.
    pub(crate) async fn append(&self, ts: Timestamp, parts: &[&[u8]]) {
        let mut pending = self.pending.lock().await;
        if pending.bytes.is_empty() {
            pending.time = Some(ts);
        }
        for part in parts {
            pending.bytes.extend_from_slice(part);
        }
        if pending.bytes.len() > FLUSH_SIZE {
            self.flush_locked(&mut pending).await;
        }
        drop(pending);
        self.wake.notify_one();
    }

    pub(crate) async fn flush(&self) {
        let mut pending = self.pending.lock().await;
        self.flush_locked(&mut pending).await;
    }

    /// Flush pending output, then deliver `item`. Returns false once the consumer is gone.
    pub(crate) async fn send(&self, item: Result<ContainerLog, LogError>) -> bool {
        let mut pending = self.pending.lock().await;
        self.flush_locked(&mut pending).await;
        self.deliver(&pending.tx, item).await
    }

    /// Flush what is left and stop the flusher.
    pub(crate) async fn close(&self) {
        self.flush().await;
        self.flusher.cancel();
    }

    async fn flush_locked(&self, pending: &mut Pending) {
        if pending.bytes.is_empty() {
            return;
        }
        let bytes = std::mem::take(&mut pending.bytes);
        let Some(time) = pending.time.take() else {
            return;
        };
        self.deliver(&pending.tx, Ok(ContainerLog::Log { time, bytes })).await;
    }

    async fn deliver(&self, tx: &LogSender, item: Result<ContainerLog, LogError>) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            sent = tx.send(item) => sent.is_ok(),
        }
    }

    async fn flush_loop(self) {
        loop {
            tokio::select! {
                _ = self.flusher.cancelled() => return,
                _ = self.wake.notified() => {}
            }
            let hard = tokio::time::sleep(HARD_FLUSH);
            tokio::pin!(hard);
            loop {
                tokio::select! {
                    _ = self.flusher.cancelled() => return,
                    _ = &mut hard => break,
                    _ = tokio::time::sleep(SOFT_FLUSH) => break,
                    _ = self.wake.notified() => {}
                }
            }
            self.flush().await;
        }
    }
}

#[cfg(test)]
#[path = "buffer_tests.rs"]
mod tests;
