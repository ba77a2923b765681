// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution watcher: merges the Job, Pod and event watchers into one
//! committed [`ExecutionState`].
//!
//! Deliveries are applied to an uncommitted snapshot; readers only ever see
//! the committed one, which is replaced as a whole after each batch. The
//! pod events watcher starts once the pod name is known.

use crate::client::{ExecutionSources, Selector};
use crate::state::{ExecutionState, ExecutionStateOptions, RESOURCE_ID_LABEL};
use crate::watcher::{ResourceWatcher, SelectorHandoff, WatchError, WatchOptions};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Event, Pod};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// How long a suspected gap may close on its own before a forced read.
pub const GAP_GRACE: Duration = Duration::from_millis(750);
/// Timeout of a forced read that fills a gap.
pub const GAP_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Stream of commit notifications.
pub struct Updates(watch::Receiver<u64>);

impl Updates {
    /// Wait for the next commit; `false` once the watcher is finished.
    pub async fn next(&mut self) -> bool {
        self.0.changed().await.is_ok()
    }
}

struct Receivers {
    jobs: Option<mpsc::Receiver<Job>>,
    pods: Option<mpsc::Receiver<Pod>>,
    job_events: Option<mpsc::Receiver<Event>>,
    pod_events: Option<mpsc::Receiver<Event>>,
}

impl Receivers {
    fn is_empty(&self) -> bool {
        self.jobs.is_none() && self.pods.is_none() && self.job_events.is_none() && self.pod_events.is_none()
    }
}

enum Input {
    Job(Option<Job>),
    Pod(Option<Pod>),
    JobEvent(Option<Event>),
    PodEvent(Option<Event>),
}

async fn next<T>(rx: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn drain<T>(rx: &mut Option<mpsc::Receiver<T>>, mut apply: impl FnMut(T)) {
    while let Some(channel) = rx.as_mut() {
        match channel.try_recv() {
            Ok(item) => apply(item),
            Err(mpsc::error::TryRecvError::Empty) => return,
            Err(mpsc::error::TryRecvError::Disconnected) => *rx = None,
        }
    }
}

struct Shared {
    committed: RwLock<ExecutionState>,
    uncommitted: Mutex<ExecutionState>,
    updates: Mutex<Option<watch::Sender<u64>>>,
    started: watch::Sender<bool>,
    jobs: ResourceWatcher<Job>,
    pods: ResourceWatcher<Pod>,
    job_events: ResourceWatcher<Event>,
    pod_events: ResourceWatcher<Event>,
    pod_events_handoff: Mutex<Option<SelectorHandoff>>,
    cancel: CancellationToken,
}

/// Handle to a running execution watcher.
#[derive(Clone)]
pub struct ExecutionWatcher {
    shared: Arc<Shared>,
}

impl ExecutionWatcher {
    pub fn spawn(
        sources: &ExecutionSources,
        state: ExecutionStateOptions,
        options: WatchOptions,
        parent: &CancellationToken,
    ) -> Self {
        let cancel = parent.child_token();
        let id = state.resource_id.clone();
        let jobs = ResourceWatcher::spawn(
            sources.jobs.clone(),
            Selector::fields(format!("metadata.name={}", id)),
            options.clone(),
            &cancel,
        );
        let pods = ResourceWatcher::spawn(
            sources.pods.clone(),
            Selector::labels(format!("{}={}", RESOURCE_ID_LABEL, id)),
            options.clone(),
            &cancel,
        );
        let job_events = ResourceWatcher::spawn(
            sources.events.clone(),
            Selector::fields(format!("involvedObject.name={},involvedObject.kind=Job", id)),
            options.clone(),
            &cancel,
        );
        let (pod_events, handoff) = ResourceWatcher::spawn_deferred(sources.events.clone(), options, &cancel);

        let receivers = Receivers {
            jobs: jobs.take_channel(),
            pods: pods.take_channel(),
            job_events: job_events.take_channel(),
            pod_events: pod_events.take_channel(),
        };
        let initial = ExecutionState::new(state);
        let shared = Arc::new(Shared {
            committed: RwLock::new(initial.clone()),
            uncommitted: Mutex::new(initial),
            updates: Mutex::new(Some(watch::Sender::new(0))),
            started: watch::Sender::new(false),
            jobs,
            pods,
            job_events,
            pod_events,
            pod_events_handoff: Mutex::new(Some(handoff)),
            cancel,
        });

        let task = tokio::spawn(Arc::clone(&shared).run(receivers));
        let supervisor = Arc::clone(&shared);
        tokio::spawn(async move {
            if let Err(e) = task.await {
                if e.is_panic() {
                    tracing::error!(resource_id = %id, "execution watcher panicked");
                }
            }
            supervisor.cancel.cancel();
            supervisor.started.send_replace(true);
            supervisor.updates.lock().take();
        });

        Self { shared }
    }

    /// Latest committed snapshot.
    pub fn state(&self) -> ExecutionState {
        self.shared.committed.read().clone()
    }

    /// Publish the uncommitted snapshot.
    pub fn commit(&self) {
        self.shared.commit();
    }

    pub fn updated(&self) -> Updates {
        match self.shared.updates.lock().as_ref() {
            Some(tx) => Updates(tx.subscribe()),
            None => {
                let (tx, rx) = watch::channel(0);
                drop(tx);
                Updates(rx)
            }
        }
    }

    /// The first snapshot is committed.
    pub fn started(&self) -> bool {
        *self.shared.started.borrow()
    }

    pub async fn wait_started(&self) {
        let mut started = self.shared.started.subscribe();
        let _ = started.wait_for(|s| *s).await;
    }

    /// All updates are delivered and the watchers stopped.
    pub fn is_done(&self) -> bool {
        self.shared.updates.lock().is_none()
    }

    /// Latest Pod seen, possibly newer than the committed snapshot.
    pub fn latest_pod(&self) -> Option<Pod> {
        self.shared.pods.peek()
    }

    /// Fatal error of the Job or Pod watcher.
    pub fn err(&self) -> Option<WatchError> {
        self.shared.jobs.err().or_else(|| self.shared.pods.err())
    }

    /// Force fresh reads of the Job and Pod and commit the result.
    pub async fn refresh(&self, timeout: Duration) {
        let (jobs, pods) = tokio::join!(self.shared.jobs.update(timeout), self.shared.pods.update(timeout));
        for err in [jobs.err(), pods.err()].into_iter().flatten() {
            tracing::warn!(error = %err, "forced refresh failed");
        }
        self.shared.refresh_objects();
        self.shared.commit();
    }

    pub fn stop(&self) {
        self.shared.cancel.cancel();
    }
}

impl Shared {
    async fn run(self: Arc<Self>, mut rx: Receivers) {
        tokio::join!(self.jobs.wait_started(), self.pods.wait_started(), self.job_events.wait_started());
        self.drain(&mut rx);
        self.fill_gaps(false).await;
        self.commit();
        self.started.send_replace(true);

        loop {
            if self.uncommitted.lock().completed() || rx.is_empty() {
                break;
            }
            let input = tokio::select! {
                _ = self.cancel.cancelled() => break,
                job = next(&mut rx.jobs) => Input::Job(job),
                pod = next(&mut rx.pods) => Input::Pod(pod),
                event = next(&mut rx.job_events) => Input::JobEvent(event),
                event = next(&mut rx.pod_events) => Input::PodEvent(event),
            };
            match input {
                Input::Job(None) => rx.jobs = None,
                Input::Pod(None) => rx.pods = None,
                Input::JobEvent(None) => rx.job_events = None,
                Input::PodEvent(None) => rx.pod_events = None,
                Input::Job(Some(_)) | Input::Pod(Some(_)) => self.refresh_objects(),
                Input::JobEvent(Some(event)) => {
                    self.uncommitted.lock().push_job_event(event);
                }
                Input::PodEvent(Some(event)) => {
                    self.uncommitted.lock().push_pod_event(event);
                }
            }
            self.drain(&mut rx);
            self.fill_gaps(false).await;
            self.commit();
        }

        if !self.cancel.is_cancelled() {
            self.drain(&mut rx);
            self.fill_gaps(true).await;
            self.commit();
        }
        tracing::debug!(resource_id = %self.uncommitted.lock().resource_id(), "execution watcher finished");
        self.cancel.cancel();
    }

    fn commit(&self) {
        let snapshot = self.uncommitted.lock().clone();
        *self.committed.write() = snapshot;
        if let Some(tx) = self.updates.lock().as_ref() {
            tx.send_modify(|v| *v += 1);
        }
    }

    /// Apply whatever is queued without waiting.
    fn drain(&self, rx: &mut Receivers) {
        let mut objects = false;
        drain(&mut rx.jobs, |_| objects = true);
        drain(&mut rx.pods, |_| objects = true);
        {
            let mut state = self.uncommitted.lock();
            drain(&mut rx.job_events, |e| {
                state.push_job_event(e);
            });
            drain(&mut rx.pod_events, |e| {
                state.push_pod_event(e);
            });
        }
        if objects {
            self.refresh_objects();
        }
        self.hand_off_pod_events();
    }

    /// Take the Job and Pod from the watchers' latest values.
    fn refresh_objects(&self) {
        {
            let mut state = self.uncommitted.lock();
            state.set_job(self.jobs.peek());
            if let Some(pod) = self.pods.peek() {
                state.set_pod(Some(pod));
            }
        }
        self.hand_off_pod_events();
    }

    fn hand_off_pod_events(&self) {
        let name = self.uncommitted.lock().pod_name();
        if name.is_empty() {
            return;
        }
        if let Some(handoff) = self.pod_events_handoff.lock().take() {
            tracing::debug!(pod = %name, "watching pod events");
            handoff.send(Selector::fields(format!("involvedObject.name={},involvedObject.kind=Pod", name)));
        }
    }

    /// Whether the Pod or the Job lags behind what the rest of the state says.
    fn gaps(&self) -> (bool, bool) {
        let state = self.uncommitted.lock();
        let pod_finished = state.pod_finished();
        let job_finished = state.job_finished();
        let missing_pod = !pod_finished
            && (state.pod_events().error()
                || (job_finished && state.job_execution_error().is_empty())
                || state.job_events().success());
        let missing_job = state.job_exists() && !job_finished && (pod_finished || state.pod_events().error());
        (missing_pod, missing_job)
    }

    async fn fill_gaps(&self, force: bool) {
        self.refresh_objects();
        let (mut missing_pod, mut missing_job) = self.gaps();
        if !missing_pod && !missing_job {
            return;
        }
        if !force {
            let mut pods = self.pods.subscribe();
            let mut jobs = self.jobs.subscribe();
            let _ = tokio::time::timeout(GAP_GRACE, async {
                tokio::select! {
                    _ = pods.changed(), if missing_pod => {}
                    _ = jobs.changed(), if missing_job => {}
                    _ = self.cancel.cancelled() => {}
                }
            })
            .await;
            self.refresh_objects();
            (missing_pod, missing_job) = self.gaps();
            if !missing_pod && !missing_job {
                return;
            }
        }
        if missing_pod {
            tracing::debug!("pod lags behind, forcing a read");
            if let Err(err) = self.pods.update(GAP_READ_TIMEOUT).await {
                tracing::warn!(error = %err, "forced pod read failed");
            }
        }
        if missing_job {
            tracing::debug!("job lags behind, forcing a read");
            if let Err(err) = self.jobs.update(GAP_READ_TIMEOUT).await {
                tracing::warn!(error = %err, "forced job read failed");
            }
        }
        self.refresh_objects();
    }
}

#[cfg(test)]
#[path = "aggregator_tests.rs"]
mod tests;
