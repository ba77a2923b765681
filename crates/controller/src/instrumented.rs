// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Watch sequence of one instrumented execution.
//!
//! Waits for the pod, then walks the containers in order: each one is
//! awaited, its log streamed into the notifier, and the result aligned once
//! it terminates. A failed or aborted container stops the walk. The stream
//! ends with the final result once the execution is complete, or early when
//! cancelled.

use crate::aggregator::{ExecutionWatcher, Updates, GAP_READ_TIMEOUT};
use crate::client::LogSource;
use crate::env;
use crate::logs::{ContainerLog, LogReader};
use crate::notifier::Notifier;
use crate::state::{event_container, event_message, event_reason, event_timestamp, ExecutionState};
use k8s_openapi::api::core::v1::Event;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use twc_core::time::format_precise;
use twc_core::{
    Clock, ContainerRefs, HintName, Notification, StepStatus, TestWorkflowResult, WorkflowStatus, INIT_REF,
};

/// Job event that repeats the failure already reported by the containers.
const HIDDEN_JOB_REASON: &str = "BackoffLimitExceeded";
/// Container events implied by the log stream itself.
const HIDDEN_CONTAINER_REASONS: &[&str] = &["Created", "Started"];

#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Read what is available now instead of following the execution.
    pub disable_follow: bool,
    /// Log the cluster state when the execution ends aborted.
    pub log_aborted_details: bool,
    /// Silence after which the Job and Pod are re-read.
    pub fallback_poll: Duration,
    pub capacity: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self { disable_follow: false, log_aborted_details: false, fallback_poll: env::fallback_poll(), capacity: 64 }
    }
}

impl StreamOptions {
    twc_core::setters! {
        set {
            disable_follow: bool,
            log_aborted_details: bool,
            fallback_poll: Duration,
            capacity: usize,
        }
    }
}

/// Stream notifications of the execution behind `watcher`. The channel
/// closes once the stream is over.
pub fn watch_instrumented<C: Clock>(
    watcher: ExecutionWatcher,
    logs: Arc<dyn LogSource>,
    initial: TestWorkflowResult,
    options: StreamOptions,
    clock: C,
    parent: &CancellationToken,
) -> mpsc::Receiver<Notification> {
    let (tx, rx) = mpsc::channel(options.capacity.max(1));
    let cancel = parent.child_token();
    let notifier = Arc::new(Notifier::new(initial, tx, cancel.clone(), clock));
    let sequence = Sequence {
        notifier: Arc::clone(&notifier),
        watcher: watcher.clone(),
        logs,
        options: options.clone(),
        cancel: cancel.clone(),
    };
    let updates = watcher.updated();
    let task = tokio::spawn(sequence.run(updates));

    tokio::spawn(async move {
        if let Err(err) = task.await {
            if err.is_panic() {
                notifier.error(format!("fatal error watching data: {}", err)).await;
            }
        }
        let state = watcher.state();
        notifier.align(&state).await;
        let id = state.resource_id();
        if cancel.is_cancelled() {
            tracing::warn!(execution = %id, "canceled watching execution");
            return;
        }
        if !state.completed() {
            tracing::warn!(execution = %id, "execution was not detected as complete");
            return;
        }
        notifier.end().await;
        cancel.cancel();
        if options.log_aborted_details && notifier.results().result().status == WorkflowStatus::Aborted {
            tracing::warn!(execution = %id, error = %state.execution_error(), "execution detected as aborted");
        }
    });

    rx
}

struct Sequence<C: Clock> {
    notifier: Arc<Notifier<C>>,
    watcher: ExecutionWatcher,
    logs: Arc<dyn LogSource>,
    options: StreamOptions,
    cancel: CancellationToken,
}

impl<C: Clock> Sequence<C> {
    async fn run(self, mut updates: Updates) {
        tokio::select! {
            _ = self.cancel.cancelled() => return,
            _ = self.watcher.wait_started() => {}
        }
        let n = &self.notifier;
        n.align(&self.watcher.state()).await;

        let (mut job_seen, mut pod_seen) = (0, 0);
        loop {
            let state = self.watcher.state();
            job_seen = self.emit_job_events(&state, job_seen).await;
            pod_seen = self.emit_pod_events(&state, pod_seen, None, "").await;
            if state.pod_started() || state.completed() || self.options.disable_follow {
                break;
            }
            if !self.next_update(&mut updates).await {
                break;
            }
        }
        if self.cancel.is_cancelled() {
            return;
        }

        let state = self.watcher.state();
        let id = state.resource_id();
        if !state.pod_started() && (state.completed() || self.options.disable_follow) {
            n.align(&state).await;
            tracing::warn!(execution = %id, "execution complete without pod start");
            return;
        }
        if state.estimated_pod_start_timestamp().is_none() {
            n.error("cannot estimate Pod start").await;
            return;
        }
        n.align(&state).await;

        let actions = match state.action_groups() {
            Ok(actions) => actions,
            Err(err) => {
                n.error(format!("cannot read execution instructions: {}", err)).await;
                return;
            }
        };

        let mut last_started = INIT_REF.to_string();
        for (index, refs) in actions.container_refs().iter().enumerate() {
            let container = (index + 1).to_string();
            let initial_ref = match refs.started.first() {
                Some(r) if r != INIT_REF => r.as_str(),
                _ => "",
            };

            let mut seen = 0;
            loop {
                let state = self.watcher.state();
                seen = self.emit_pod_events(&state, seen, Some(&container), initial_ref).await;
                if state.container_started(&container) || state.completed() || self.options.disable_follow {
                    break;
                }
                if !self.next_update(&mut updates).await {
                    break;
                }
            }
            if self.cancel.is_cancelled() {
                return;
            }

            if let Some(first) = refs.started.first() {
                last_started = first.clone();
            }
            let aborted = self.stream_container(&mut updates, &container, refs, &mut last_started).await;
            if self.cancel.is_cancelled() {
                return;
            }

            loop {
                let state = self.watcher.state();
                if state.container_finished(&container) || state.completed() || self.options.disable_follow {
                    break;
                }
                if !self.next_update(&mut updates).await {
                    break;
                }
            }
            if self.cancel.is_cancelled() {
                return;
            }

            let state = self.watcher.state();
            n.align(&state).await;
            if aborted || state.container_failed(&container) {
                tracing::debug!(execution = %id, container = %container, "container did not succeed, stopping");
                break;
            }
        }

        loop {
            if self.watcher.state().completed() || self.options.disable_follow {
                break;
            }
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                more = updates.next() => {
                    if !more || self.watcher.state().completed() {
                        break;
                    }
                }
                _ = tokio::time::sleep(self.options.fallback_poll) => {
                    tracing::debug!(execution = %id, "no updates, refreshing job and pod");
                    self.watcher.refresh(GAP_READ_TIMEOUT).await;
                }
            }
        }
        if self.cancel.is_cancelled() {
            return;
        }
        n.align(&self.watcher.state()).await;
    }

    /// Wait for the next commit; `false` when cancelled or the watcher is finished.
    async fn next_update(&self, updates: &mut Updates) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            more = updates.next() => more,
        }
    }

    async fn emit_job_events(&self, state: &ExecutionState, seen: usize) -> usize {
        let events = state.job_events().list();
        for event in events.iter().skip(seen) {
            if event_reason(event) != HIDDEN_JOB_REASON {
                self.emit(event, "").await;
            }
        }
        events.len().max(seen)
    }

    /// Emit pod events of `container`, or container-less ones when `None`.
    async fn emit_pod_events(
        &self,
        state: &ExecutionState,
        seen: usize,
        container: Option<&str>,
        step_ref: &str,
    ) -> usize {
        let events = state.pod_events().list();
        for event in events.iter().skip(seen) {
            let visible = match container {
                None => event_container(event).is_none(),
                Some(name) => {
                    event_container(event) == Some(name) && !HIDDEN_CONTAINER_REASONS.contains(&event_reason(event))
                }
            };
            if visible {
                self.emit(event, step_ref).await;
            }
        }
        events.len().max(seen)
    }

    async fn emit(&self, event: &Event, step_ref: &str) {
        let ts = event_timestamp(event).unwrap_or_else(|| self.notifier.now());
        let level = event.type_.as_deref().unwrap_or_default();
        self.notifier.event(step_ref, ts, level, event_reason(event), event_message(event)).await;
    }

    /// Stream one container's log. Returns whether the runner reported an abort.
    async fn stream_container(
        &self,
        updates: &mut Updates,
        container: &str,
        refs: &ContainerRefs,
        last_started: &mut String,
    ) -> bool {
        let n = &self.notifier;
        let state = self.watcher.state();
        let last_ref = refs.last_ended().unwrap_or_default().to_string();

        let watcher = self.watcher.clone();
        let name = container.to_string();
        let disable_follow = self.options.disable_follow;
        let last = last_ref.clone();
        let mut logs = LogReader::new(Arc::clone(&self.logs), state.pod_name(), container)
            .done_when(move || {
                let state = watcher.state();
                disable_follow || state.container_finished(&name) || state.completed()
            })
            .last_hint_when(move |hint| hint.step_ref == last && hint.hint_name() == Some(HintName::End))
            .spawn(&self.cancel);

        let mut ready = state.containers_ready();
        let mut updates_open = true;
        let mut aborted = false;
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                more = updates.next(), if updates_open => {
                    if !more {
                        updates_open = false;
                        continue;
                    }
                    let next = self.watcher.state().containers_ready();
                    if next != ready {
                        ready = next;
                        n.ping(last_started.as_str()).await;
                    }
                }
                item = logs.recv() => {
                    let Some(item) = item else {
                        break;
                    };
                    match item {
                        Err(err) => {
                            let now = n.now();
                            let line = format!("{} error while fetching container logs: {}\n", format_precise(now), err);
                            n.raw(&last_ref, now, line, false).await;
                        }
                        Ok(ContainerLog::Log { time, bytes }) => {
                            n.raw(last_started.as_str(), time, String::from_utf8_lossy(&bytes).into_owned(), false).await;
                        }
                        Ok(ContainerLog::Output { time, instruction }) => {
                            let step_ref = instruction.step_ref.clone();
                            n.output(&step_ref, time, instruction).await;
                        }
                        Ok(ContainerLog::Hint { time, instruction }) => {
                            match instruction.hint_name() {
                                Some(HintName::Start) => *last_started = instruction.step_ref.clone(),
                                Some(HintName::End)
                                    if StepStatus::parse(instruction.value_str()) == Some(StepStatus::Aborted) =>
                                {
                                    aborted = true;
                                }
                                _ => {}
                            }
                            n.instruction(time, &instruction).await;
                        }
                    }
                }
            }
        }
        aborted
    }
}

#[cfg(test)]
#[path = "instrumented_tests.rs"]
mod tests;
