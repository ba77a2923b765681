// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Controller of one test workflow execution.
//!
//! Connects to the resources of an execution, streams its progress, and
//! forwards pause, resume and cleanup requests.

use crate::aggregator::ExecutionWatcher;
use crate::cleanup::cleanup;
use crate::client::ExecutionSources;
use crate::control::ControlClient;
use crate::error::ControllerError;
use crate::instrumented::{watch_instrumented, StreamOptions};
use crate::result_state::ResultState;
use crate::state::ExecutionStateOptions;
use crate::watcher::WatchOptions;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use twc_core::instruction::format_hint;
use twc_core::{
    Clock, HintName, Instruction, LightweightNotification, Notification, Signature, SystemClock,
    TestWorkflowResult, Timestamp, WorkflowStatus,
};

/// Buffer between the log writer task and the reader of [`Controller::logs`].
const LOGS_PIPE_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Default)]
pub struct ControllerOptions {
    pub namespace: Option<String>,
    /// Step tree, when known up front instead of from the Job annotations.
    pub signature: Option<Vec<Signature>>,
    pub scheduled_at: Option<Timestamp>,
    pub watch: WatchOptions,
    pub control: ControlClient,
}

impl ControllerOptions {
    twc_core::setters! {
        set {
            watch: WatchOptions,
            control: ControlClient,
        }
        option {
            namespace: String,
            signature: Vec<Signature>,
            scheduled_at: Timestamp,
        }
    }
}

pub struct Controller<C: Clock = SystemClock> {
    id: String,
    namespace: String,
    signature: Vec<Signature>,
    sources: ExecutionSources,
    watcher: ExecutionWatcher,
    control: ControlClient,
    clock: C,
    cancel: CancellationToken,
}

impl Controller<SystemClock> {
    /// Connect to execution `id`. Waits for the first read of its resources.
    pub async fn new(
        sources: ExecutionSources,
        id: &str,
        options: ControllerOptions,
        parent: &CancellationToken,
    ) -> Result<Self, ControllerError> {
        Self::with_clock(sources, id, options, SystemClock, parent).await
    }
}

impl<C: Clock> Controller<C> {
    pub async fn with_clock(
        sources: ExecutionSources,
        id: &str,
        options: ControllerOptions,
        clock: C,
        parent: &CancellationToken,
    ) -> Result<Self, ControllerError> {
        let cancel = parent.child_token();
        let state = ExecutionStateOptions {
            resource_id: id.to_string(),
            namespace: options.namespace.clone(),
            signature: options.signature.clone(),
            actions: None,
            scheduled_at: options.scheduled_at,
        };
        let watcher = ExecutionWatcher::spawn(&sources, state, options.watch, &cancel);
        watcher.wait_started().await;

        let state = watcher.state();
        if !state.job_exists() && !state.pod_exists() && !state.completed() {
            cancel.cancel();
            if state.job_events().first_timestamp().is_some() || state.pod_events().first_timestamp().is_some() {
                tracing::error!(execution = %id, "connecting to aborted execution");
                return Err(ControllerError::JobAborted);
            }
            return Err(ControllerError::JobTimeout);
        }

        let signature = match state.signature() {
            Ok(signature) => signature,
            Err(err) => {
                cancel.cancel();
                return Err(ControllerError::InvalidSignature(err));
            }
        };

        tracing::debug!(execution = %id, namespace = %state.namespace(), "controller connected");
        Ok(Self {
            id: id.to_string(),
            namespace: options.namespace.unwrap_or_else(|| state.namespace()),
            signature,
            sources,
            watcher,
            control: options.control,
            clock,
            cancel,
        })
    }

    pub fn signature(&self) -> &[Signature] {
        &self.signature
    }

    pub fn has_pod(&self) -> bool {
        self.watcher.state().pod_exists()
    }

    pub fn resource_id(&self) -> &str {
        &self.id
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn node_name(&self) -> Result<String, ControllerError> {
        let name = self.watcher.state().pod_node_name();
        if name.is_empty() {
            return Err(self.watcher.err().map(ControllerError::from).unwrap_or(ControllerError::NoNodeAssigned));
        }
        Ok(name)
    }

    pub fn pod_ip(&self) -> Result<String, ControllerError> {
        let ip = self.watcher.state().pod_ip();
        if ip.is_empty() {
            return Err(self.watcher.err().map(ControllerError::from).unwrap_or(ControllerError::NoIpAssigned));
        }
        Ok(ip)
    }

    pub fn containers_ready(&self) -> Result<bool, ControllerError> {
        self.pod_ip()?;
        Ok(self.watcher.state().containers_ready())
    }

    /// Result as far as the cluster state alone can tell.
    pub fn estimated_result(&self) -> TestWorkflowResult {
        let results = ResultState::new(TestWorkflowResult::default());
        results.align(&self.watcher.state());
        results.result()
    }

    pub async fn pause(&self) -> Result<(), ControllerError> {
        let ip = self.pod_ip()?;
        self.control.pause(&ip).await?;
        tracing::info!(execution = %self.id, "paused");
        Ok(())
    }

    pub async fn resume(&self) -> Result<(), ControllerError> {
        let ip = self.pod_ip()?;
        self.control.resume(&ip).await?;
        tracing::info!(execution = %self.id, "resumed");
        Ok(())
    }

    pub async fn abort(&self) -> Result<(), ControllerError> {
        self.cleanup().await
    }

    pub async fn cleanup(&self) -> Result<(), ControllerError> {
        cleanup(&*self.sources.cleaner, &self.id).await?;
        Ok(())
    }

    /// Stop the watchers and every stream started from this controller.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Full notification stream. Dropping the receiver stops it.
    pub fn watch(&self, options: StreamOptions) -> mpsc::Receiver<Notification> {
        watch_instrumented(
            self.watcher.clone(),
            self.sources.logs.clone(),
            TestWorkflowResult::default(),
            options,
            self.clock.clone(),
            &self.cancel,
        )
    }

    /// Progress stream that only reports changes of node, IP, status or
    /// current step.
    pub fn watch_lightweight(&self) -> mpsc::Receiver<LightweightNotification> {
        let (tx, rx) = mpsc::channel(16);
        let mut notifications = self.watch(StreamOptions::default());
        let watcher = self.watcher.clone();
        let tree = self.signature.clone();
        tokio::spawn(async move {
            let mut prev = LightweightNotification { status: Some(WorkflowStatus::Queued), ..Default::default() };
            while let Some(notification) = notifications.recv().await {
                if let Some(error) = notification.error {
                    if tx.send(LightweightNotification { error: Some(error), ..Default::default() }).await.is_err() {
                        return;
                    }
                    continue;
                }
                let state = watcher.state();
                let mut next = LightweightNotification {
                    node_name: state.pod_node_name(),
                    pod_ip: state.pod_ip(),
                    status: prev.status,
                    current: prev.current.clone(),
                    result: None,
                    error: None,
                };
                if let Some(result) = &notification.result {
                    next.status = Some(result.status);
                    next.current = result.current(&tree).unwrap_or_default();
                }
                if !next.differs_from(&prev) {
                    continue;
                }
                prev = next.clone();
                next.result = notification.result;
                if tx.send(next).await.is_err() {
                    return;
                }
            }
        });
        rx
    }

    /// Plain text log of the execution. A start hint is written whenever
    /// the output switches to another step.
    pub fn logs(&self, follow: bool) -> DuplexStream {
        let (reader, mut writer) = tokio::io::duplex(LOGS_PIPE_SIZE);
        let mut notifications = self.watch(StreamOptions::default().disable_follow(!follow));
        tokio::spawn(async move {
            let mut current = String::new();
            while let Some(notification) = notifications.recv().await {
                if notification.is_error() || notification.log.is_empty() {
                    continue;
                }
                if !notification.step_ref.is_empty() && notification.step_ref != current {
                    current = notification.step_ref.clone();
                    let start = Instruction::hint(current.as_str(), HintName::Start, serde_json::Value::Null);
                    if writer.write_all(format!("{}\n", format_hint(&start)).as_bytes()).await.is_err() {
                        return;
                    }
                }
                if writer.write_all(notification.log.as_bytes()).await.is_err() {
                    return;
                }
            }
            let _ = writer.shutdown().await;
        });
        reader
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
