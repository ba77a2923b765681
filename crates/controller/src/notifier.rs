// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ordered notification stream of one execution.
//!
//! Wraps the [`ResultState`] and pushes a fresh result after every change,
//! interleaved with log lines, outputs and errors in the order they were
//! observed. Sends stop silently once the stream is cancelled.

use crate::result_state::ResultState;
use crate::state::ExecutionState;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use twc_core::time::format_precise;
use twc_core::{Clock, Instruction, Notification, TestWorkflowResult, Timestamp, INIT_REF};

/// Event level rendered as a temporary line.
const NORMAL_LEVEL: &str = "Normal";

pub struct Notifier<C: Clock> {
    results: Arc<ResultState>,
    tx: mpsc::Sender<Notification>,
    cancel: CancellationToken,
    clock: C,
}

impl<C: Clock> Notifier<C> {
    pub fn new(
        initial: TestWorkflowResult,
        tx: mpsc::Sender<Notification>,
        cancel: CancellationToken,
        clock: C,
    ) -> Self {
        Self { results: Arc::new(ResultState::new(initial)), tx, cancel, clock }
    }

    pub fn results(&self) -> &Arc<ResultState> {
        &self.results
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Deliver one notification; `false` when cancelled or nobody listens.
    /// A dropped receiver cancels the stream.
    async fn send(&self, notification: Notification) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        let sent = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return false,
            sent = self.tx.send(notification) => sent.is_ok(),
        };
        if !sent {
            self.cancel.cancel();
        }
        sent
    }

    pub async fn send_result(&self) -> bool {
        let result = self.results.result();
        let ts = result.latest_timestamp().unwrap_or_else(|| self.clock.now());
        self.send(Notification::result(ts, result)).await
    }

    /// Forward a log chunk as is. Empty chunks only advance the last timestamp.
    pub async fn raw(&self, step_ref: &str, ts: Timestamp, message: impl Into<String>, temporary: bool) {
        self.results.register_timestamp(ts);
        let message = message.into();
        if message.is_empty() {
            return;
        }
        let step_ref = if step_ref == INIT_REF { "" } else { step_ref };
        self.send(Notification::log(ts, step_ref, message, temporary)).await;
    }

    /// Empty temporary notification nudging consumers, e.g. on readiness changes.
    pub async fn ping(&self, step_ref: &str) {
        let step_ref = if step_ref == INIT_REF { "" } else { step_ref };
        self.send(Notification::log(self.clock.now(), step_ref, "", true)).await;
    }

    /// Forward a line produced by the controller itself, prefixed with `ts`.
    pub async fn log(&self, step_ref: &str, ts: Timestamp, message: &str) {
        if message.is_empty() {
            return;
        }
        self.raw(step_ref, ts, format!("{} {}", format_precise(ts), message), false).await;
    }

    /// Forward a cluster event. Normal events are temporary.
    pub async fn event(&self, step_ref: &str, ts: Timestamp, level: &str, reason: &str, message: &str) {
        tracing::debug!(step = %step_ref, reason, level, message, "cluster event");
        let line = format!("{} ({}) {}\n", format_precise(ts), reason, message);
        self.raw(step_ref, ts, line, level == NORMAL_LEVEL).await;
    }

    pub async fn error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(error = %message, "execution stream error");
        self.send(Notification::error(self.clock.now(), message)).await;
    }

    /// Forward a runner output. Outputs of unknown steps are dropped.
    pub async fn output(&self, step_ref: &str, ts: Timestamp, output: Instruction) {
        let step_ref = if step_ref == INIT_REF {
            ""
        } else if !step_ref.is_empty() && !self.results.is_known_step(step_ref) {
            return;
        } else {
            step_ref
        };
        self.send(Notification::output(ts, step_ref, output)).await;
    }

    /// Apply a runner hint and publish the result.
    pub async fn instruction(&self, ts: Timestamp, hint: &Instruction) {
        tracing::debug!(step = %hint.step_ref, hint = %hint.name, "runner hint");
        self.results.append(ts, hint);
        self.send_result().await;
    }

    /// Align with the cluster state and publish the result.
    pub async fn align(&self, state: &ExecutionState) {
        self.results.align(state);
        self.send_result().await;
    }

    /// Finalize the result and publish it.
    pub async fn end(&self) {
        self.results.end(self.clock.now());
        self.send_result().await;
    }
}

#[cfg(test)]
#[path = "notifier_tests.rs"]
mod tests;
