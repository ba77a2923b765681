// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory Kubernetes fakes and object fixtures.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::client::{
    ApiError, ExecutionSources, ListPage, LogSource, LogStream, ResourceCleaner, ResourceClient, Selector,
    WatchEvent, WatchStream,
};
use crate::state::{RESOURCE_ID_LABEL, SIGNATURE_ANNOTATION, SPEC_ANNOTATION};
use async_trait::async_trait;
use futures_util::io::AsyncReadExt;
use futures_util::{StreamExt, TryStreamExt};
use k8s_openapi::api::batch::v1::{Job, JobCondition, JobStatus};
use k8s_openapi::api::core::v1::{
    ContainerState, ContainerStateRunning, ContainerStateTerminated, ContainerStatus, Event, ObjectReference,
    Pod, PodSpec, PodStatus,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use twc_core::{ActionGroups, Signature, Timestamp};

// ── Resource client ─────────────────────────────────────────────────────

fn field<K: Serialize>(object: &K, path: &str) -> Option<String> {
    let value = serde_json::to_value(object).ok()?;
    let pointer = format!("/{}", path.replace('.', "/"));
    value.pointer(&pointer).and_then(|v| v.as_str()).map(str::to_string)
}

fn terms(selector: &Option<String>) -> Vec<(String, String)> {
    selector
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .filter_map(|t| t.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

fn matches<K: kube::Resource + Serialize>(object: &K, selector: &Selector) -> bool {
    let labels = object.meta().labels.clone().unwrap_or_default();
    terms(&selector.label).iter().all(|(k, v)| labels.get(k) == Some(v))
        && terms(&selector.field).iter().all(|(k, v)| field(object, k).as_deref() == Some(v.as_str()))
}

type Sink<K> = mpsc::UnboundedSender<Result<WatchEvent<K>, ApiError>>;

struct FakeState<K> {
    version: u64,
    objects: BTreeMap<String, K>,
    history: Vec<(u64, WatchEvent<K>)>,
    sinks: Vec<(Selector, Sink<K>)>,
    list_errors: VecDeque<ApiError>,
    watch_errors: VecDeque<ApiError>,
    list_calls: usize,
    watch_versions: Vec<String>,
}

/// API server stand-in for one resource kind, with resource versions,
/// watch history and injectable failures.
pub struct FakeResourceClient<K> {
    state: Mutex<FakeState<K>>,
}

impl<K> Default for FakeResourceClient<K> {
    fn default() -> Self {
        Self {
            state: Mutex::new(FakeState {
                version: 100,
                objects: BTreeMap::new(),
                history: Vec::new(),
                sinks: Vec::new(),
                list_errors: VecDeque::new(),
                watch_errors: VecDeque::new(),
                list_calls: 0,
                watch_versions: Vec::new(),
            }),
        }
    }
}

impl<K> FakeResourceClient<K>
where
    K: kube::Resource + Clone + Serialize + Send + Sync + 'static,
{
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn publish(&self, make: impl FnOnce(K) -> WatchEvent<K>, mut object: K, remove: bool) {
        let mut state = self.state.lock();
        state.version += 1;
        let version = state.version;
        object.meta_mut().resource_version = Some(version.to_string());
        let key = object.meta().name.clone().unwrap_or_default();
        if remove {
            state.objects.remove(&key);
        } else {
            state.objects.insert(key, object.clone());
        }
        let event = make(object.clone());
        state.history.push((version, event.clone()));
        state.sinks.retain(|(selector, sink)| !matches(&object, selector) || sink.send(Ok(event.clone())).is_ok());
    }

    /// Create or replace an object, notifying open watches.
    pub fn apply(&self, object: K) {
        let name = object.meta().name.clone().unwrap_or_default();
        let exists = self.state.lock().objects.contains_key(&name);
        if exists {
            self.publish(WatchEvent::Modified, object, false);
        } else {
            self.publish(WatchEvent::Added, object, false);
        }
    }

    /// Change an object without notifying watches, as if the event was lost.
    pub fn apply_silently(&self, mut object: K) {
        let mut state = self.state.lock();
        state.version += 1;
        object.meta_mut().resource_version = Some(state.version.to_string());
        let name = object.meta().name.clone().unwrap_or_default();
        state.objects.insert(name, object);
    }

    pub fn delete(&self, name: &str) {
        let object = self.state.lock().objects.get(name).cloned();
        if let Some(object) = object {
            self.publish(WatchEvent::Deleted, object, true);
        }
    }

    /// End every open watch stream as the server would on timeout.
    pub fn close_watches(&self) {
        self.state.lock().sinks.clear();
    }

    /// Send a bookmark to every open watch.
    pub fn bookmark(&self) {
        let mut state = self.state.lock();
        let version = state.version.to_string();
        state.sinks.retain(|(_, sink)| sink.send(Ok(WatchEvent::Bookmark(version.clone()))).is_ok());
    }

    pub fn fail_next_list(&self, err: ApiError) {
        self.state.lock().list_errors.push_back(err);
    }

    pub fn fail_next_watch(&self, err: ApiError) {
        self.state.lock().watch_errors.push_back(err);
    }

    /// Break every open watch stream with an error.
    pub fn break_watches(&self, err: ApiError) {
        let sinks = std::mem::take(&mut self.state.lock().sinks);
        for (_, sink) in sinks {
            let _ = sink.send(Err(err.clone()));
        }
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().list_calls
    }

    /// Resource versions watches were opened from, in order.
    pub fn watch_versions(&self) -> Vec<String> {
        self.state.lock().watch_versions.clone()
    }

    pub fn open_watches(&self) -> usize {
        let mut state = self.state.lock();
        state.sinks.retain(|(_, s)| !s.is_closed());
        state.sinks.len()
    }
}

#[async_trait]
impl<K> ResourceClient<K> for FakeResourceClient<K>
where
    K: kube::Resource + Clone + Serialize + Send + Sync + 'static,
{
    async fn list(&self, selector: &Selector, _timeout: Duration) -> Result<ListPage<K>, ApiError> {
        let mut state = self.state.lock();
        state.list_calls += 1;
        if let Some(err) = state.list_errors.pop_front() {
            return Err(err);
        }
        let items = state.objects.values().filter(|o| matches(*o, selector)).cloned().collect();
        Ok(ListPage { items, resource_version: state.version.to_string() })
    }

    async fn watch<'a>(
        &'a self,
        selector: &'a Selector,
        resource_version: &'a str,
        _timeout: Duration,
    ) -> Result<WatchStream<'a, K>, ApiError> {
        let mut state = self.state.lock();
        state.watch_versions.push(resource_version.to_string());
        if let Some(err) = state.watch_errors.pop_front() {
            return Err(err);
        }
        let from: u64 = resource_version.parse().unwrap_or(0);
        let (tx, rx) = mpsc::unbounded_channel();
        for (version, event) in &state.history {
            let object = match event {
                WatchEvent::Added(o) | WatchEvent::Modified(o) | WatchEvent::Deleted(o) => o,
                WatchEvent::Bookmark(_) => continue,
            };
            if *version > from && matches(object, selector) {
                let _ = tx.send(Ok(event.clone()));
            }
        }
        state.sinks.push((selector.clone(), tx));
        let stream = futures_util::stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|e| (e, rx)) });
        Ok(stream.boxed())
    }
}

// ── Log source ──────────────────────────────────────────────────────────

/// One scripted answer to a log open request.
#[derive(Debug, Clone)]
pub enum LogSession {
    Lines(Vec<u8>),
    /// Serves the bytes, then never ends.
    Stall(Vec<u8>),
    Error(ApiError),
}

/// Log source serving scripted sessions per container.
#[derive(Default)]
pub struct FakeLogSource {
    sessions: Mutex<HashMap<String, VecDeque<LogSession>>>,
    opens: Mutex<Vec<(String, Option<Timestamp>)>>,
    follows: Mutex<Vec<bool>>,
}

impl FakeLogSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, container: &str, session: LogSession) {
        self.sessions.lock().entry(container.to_string()).or_default().push_back(session);
    }

    pub fn push_lines(&self, container: &str, lines: &[String]) {
        let mut bytes = Vec::new();
        for line in lines {
            bytes.extend_from_slice(line.as_bytes());
            bytes.push(b'\n');
        }
        self.push(container, LogSession::Lines(bytes));
    }

    /// Containers and `since` values of every open request, in order.
    pub fn opens(&self) -> Vec<(String, Option<Timestamp>)> {
        self.opens.lock().clone()
    }

    /// Whether each open request asked to follow the stream.
    pub fn follows(&self) -> Vec<bool> {
        self.follows.lock().clone()
    }
}

#[async_trait]
impl LogSource for FakeLogSource {
    async fn open<'a>(
        &'a self,
        _pod: &'a str,
        container: &'a str,
        since: Option<Timestamp>,
        follow: bool,
    ) -> Result<LogStream<'a>, ApiError> {
        self.opens.lock().push((container.to_string(), since));
        self.follows.lock().push(follow);
        let session = self.sessions.lock().get_mut(container).and_then(VecDeque::pop_front);
        match session {
            Some(LogSession::Lines(bytes)) => Ok(Box::pin(futures_util::io::Cursor::new(bytes))),
            Some(LogSession::Stall(bytes)) => {
                let never = futures_util::stream::pending::<std::io::Result<Vec<u8>>>().into_async_read();
                Ok(Box::pin(futures_util::io::Cursor::new(bytes).chain(never)))
            }
            Some(LogSession::Error(err)) => Err(err),
            None => Ok(Box::pin(futures_util::io::Cursor::new(Vec::new()))),
        }
    }
}

/// Timestamped log line as the API server renders it.
pub fn log_line(ts: Timestamp, text: &str) -> String {
    format!("{} {}", twc_core::time::format_precise(ts), text)
}

// ── Cleaner ─────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeCleaner {
    pub deleted_jobs: Mutex<Vec<String>>,
    pub deleted_pods: Mutex<Vec<Selector>>,
    pub fail: Mutex<Option<ApiError>>,
}

#[async_trait]
impl ResourceCleaner for FakeCleaner {
    async fn delete_job(&self, name: &str) -> Result<(), ApiError> {
        if let Some(err) = self.fail.lock().clone() {
            return Err(err);
        }
        self.deleted_jobs.lock().push(name.to_string());
        Ok(())
    }

    async fn delete_pods(&self, selector: &Selector) -> Result<(), ApiError> {
        if let Some(err) = self.fail.lock().clone() {
            return Err(err);
        }
        self.deleted_pods.lock().push(selector.clone());
        Ok(())
    }
}

/// A complete fake cluster for one execution.
pub struct FakeCluster {
    pub jobs: Arc<FakeResourceClient<Job>>,
    pub pods: Arc<FakeResourceClient<Pod>>,
    pub events: Arc<FakeResourceClient<Event>>,
    pub logs: Arc<FakeLogSource>,
    pub cleaner: Arc<FakeCleaner>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self {
            jobs: FakeResourceClient::new(),
            pods: FakeResourceClient::new(),
            events: FakeResourceClient::new(),
            logs: FakeLogSource::new(),
            cleaner: Arc::new(FakeCleaner::default()),
        }
    }

    pub fn sources(&self) -> ExecutionSources {
        ExecutionSources {
            jobs: self.jobs.clone(),
            pods: self.pods.clone(),
            events: self.events.clone(),
            logs: self.logs.clone(),
            cleaner: self.cleaner.clone(),
        }
    }
}

impl Default for FakeCluster {
    fn default() -> Self {
        Self::new()
    }
}

// ── Fixtures ────────────────────────────────────────────────────────────

pub const NAMESPACE: &str = "default";

fn meta(name: &str, created: Timestamp) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(NAMESPACE.to_string()),
        uid: Some(format!("uid-{}", name)),
        creation_timestamp: Some(Time(created)),
        ..Default::default()
    }
}

/// Annotations carrying the step layout of an execution.
pub fn layout_annotations(signature: &[Signature], actions: &ActionGroups) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    out.insert(SIGNATURE_ANNOTATION.to_string(), serde_json::to_string(signature).unwrap_or_default());
    out.insert(SPEC_ANNOTATION.to_string(), serde_json::to_string(actions).unwrap_or_default());
    out
}

/// A running Job for execution `id`.
pub fn job(id: &str, created: Timestamp) -> Job {
    let mut metadata = meta(id, created);
    metadata.labels = Some(BTreeMap::from([(RESOURCE_ID_LABEL.to_string(), id.to_string())]));
    Job { metadata, status: Some(JobStatus { start_time: Some(Time(created)), ..Default::default() }), ..Default::default() }
}

pub fn with_annotations<K: kube::Resource>(mut object: K, annotations: BTreeMap<String, String>) -> K {
    object.meta_mut().annotations.get_or_insert_with(BTreeMap::new).extend(annotations);
    object
}

/// Mark a Job finished with a `Complete` or `Failed` condition.
pub fn finish_job(mut job: Job, succeeded: bool, at: Timestamp) -> Job {
    let status = job.status.get_or_insert_with(JobStatus::default);
    status.conditions.get_or_insert_with(Vec::new).push(JobCondition {
        type_: if succeeded { "Complete" } else { "Failed" }.to_string(),
        status: "True".to_string(),
        last_transition_time: Some(Time(at)),
        reason: (!succeeded).then(|| "BackoffLimitExceeded".to_string()),
        message: (!succeeded).then(|| "Job has reached the specified backoff limit".to_string()),
        ..Default::default()
    });
    if succeeded {
        status.completion_time = Some(Time(at));
    }
    job
}

/// A pending Pod for execution `id`.
pub fn pod(id: &str, name: &str, created: Timestamp) -> Pod {
    let mut metadata = meta(name, created);
    metadata.labels = Some(BTreeMap::from([(RESOURCE_ID_LABEL.to_string(), id.to_string())]));
    Pod {
        metadata,
        spec: Some(PodSpec::default()),
        status: Some(PodStatus { phase: Some("Pending".to_string()), ..Default::default() }),
    }
}

/// Schedule the pod on `node` and start it.
pub fn start_pod(mut pod: Pod, node: &str, ip: &str, at: Timestamp) -> Pod {
    pod.spec.get_or_insert_with(PodSpec::default).node_name = Some(node.to_string());
    let status = pod.status.get_or_insert_with(PodStatus::default);
    status.phase = Some("Running".to_string());
    status.pod_ip = Some(ip.to_string());
    status.start_time = Some(Time(at));
    pod
}

fn set_container(pod: &mut Pod, status: ContainerStatus) {
    let statuses = pod.status.get_or_insert_with(PodStatus::default).container_statuses.get_or_insert_with(Vec::new);
    statuses.retain(|s| s.name != status.name);
    statuses.push(status);
}

pub fn container_running(mut pod: Pod, name: &str, at: Timestamp) -> Pod {
    set_container(
        &mut pod,
        ContainerStatus {
            name: name.to_string(),
            started: Some(true),
            state: Some(ContainerState {
                running: Some(ContainerStateRunning { started_at: Some(Time(at)) }),
                ..Default::default()
            }),
            ..Default::default()
        },
    );
    pod
}

/// Terminate a container with a termination message.
pub fn container_terminated(
    mut pod: Pod,
    name: &str,
    exit_code: i32,
    reason: &str,
    message: &str,
    started: Timestamp,
    finished: Timestamp,
) -> Pod {
    set_container(
        &mut pod,
        ContainerStatus {
            name: name.to_string(),
            started: Some(false),
            state: Some(ContainerState {
                terminated: Some(ContainerStateTerminated {
                    exit_code,
                    reason: Some(reason.to_string()),
                    message: Some(message.to_string()),
                    started_at: Some(Time(started)),
                    finished_at: Some(Time(finished)),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        },
    );
    pod
}

pub fn pod_phase(mut pod: Pod, phase: &str) -> Pod {
    pod.status.get_or_insert_with(PodStatus::default).phase = Some(phase.to_string());
    pod
}

/// Event about `kind/name`, optionally scoped to a container.
pub fn event(
    uid: &str,
    kind: &str,
    name: &str,
    container: Option<&str>,
    reason: &str,
    message: &str,
    at: Timestamp,
) -> Event {
    let warning = matches!(reason, "Failed" | "Evicted" | "Preempting" | "FailedCreatePodSandBox" | "BackoffLimitExceeded");
    Event {
        metadata: ObjectMeta {
            name: Some(format!("{}.{}", name, uid)),
            namespace: Some(NAMESPACE.to_string()),
            uid: Some(uid.to_string()),
            creation_timestamp: Some(Time(at)),
            ..Default::default()
        },
        involved_object: ObjectReference {
            kind: Some(kind.to_string()),
            name: Some(name.to_string()),
            namespace: Some(NAMESPACE.to_string()),
            field_path: container.map(|c| format!("spec.containers{{{}}}", c)),
            ..Default::default()
        },
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        type_: Some(if warning { "Warning" } else { "Normal" }.to_string()),
        first_timestamp: Some(Time(at)),
        last_timestamp: Some(Time(at)),
        ..Default::default()
    }
}
