// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot of everything known about one execution.
//!
//! An [`ExecutionState`] combines the Job, its Pod, and both event lists,
//! and answers questions about the execution by consulting whichever source
//! has the answer first. Snapshots are cheap to clone.

mod events;
mod job;
mod pod;

pub use events::{
    event_container, event_first_timestamp, event_message, event_reason, event_timestamp, ContainerEvents,
    EventList, JobEvents, PodEvents, JOB_ERROR_REASONS, POD_ERROR_REASONS, POD_FINISH_REASONS,
};
pub use job::JobView;
pub use pod::{PodView, EVICTION_DETAILS};

use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Event, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use std::sync::Arc;
use twc_core::time::{first_set, parse_rfc3339};
use twc_core::{signature, ActionGroups, ContainerResult, Signature, Timestamp, WorkflowStatus};

pub const RESOURCE_ID_LABEL: &str = "testworkflows.testkube.io/resource-id";
pub const SIGNATURE_ANNOTATION: &str = "testworkflows.testkube.io/signature";
pub const SPEC_ANNOTATION: &str = "testworkflows.testkube.io/spec";
pub const SCHEDULED_AT_ANNOTATION: &str = "testworkflows.testkube.io/scheduled-at";
pub const TERMINATION_REASON_ANNOTATION: &str = "testkube.io/termination-reason";
pub const TERMINATION_CODE_ANNOTATION: &str = "testkube.io/termination-code";

pub(crate) fn time(t: &Option<Time>) -> Option<Timestamp> {
    t.as_ref().map(|t| t.0)
}

pub(crate) fn annotation<'a>(meta: &'a ObjectMeta, key: &str) -> Option<&'a str> {
    meta.annotations.as_ref().and_then(|a| a.get(key)).map(String::as_str).filter(|s| !s.is_empty())
}

/// `reason: message`, or whichever half is set.
pub(crate) fn reason_message(reason: &str, message: &str) -> String {
    match (reason.is_empty(), message.is_empty()) {
        (true, true) => String::new(),
        (false, true) => reason.to_string(),
        (true, false) => message.to_string(),
        (false, false) => format!("{}: {}", reason, message),
    }
}

/// Why the step layout of an execution is unavailable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("missing data")]
    MissingData,
    #[error("invalid {what}: {message}")]
    Invalid { what: &'static str, message: String },
}

/// Known facts supplied by the caller, taking precedence over the cluster.
#[derive(Debug, Clone, Default)]
pub struct ExecutionStateOptions {
    pub resource_id: String,
    pub namespace: Option<String>,
    pub signature: Option<Vec<Signature>>,
    pub actions: Option<ActionGroups>,
    pub scheduled_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionState {
    job: Option<Arc<Job>>,
    pod: Option<Arc<Pod>>,
    job_events: JobEvents,
    pod_events: PodEvents,
    options: Arc<ExecutionStateOptions>,
}

impl ExecutionState {
    pub fn new(options: ExecutionStateOptions) -> Self {
        Self { options: Arc::new(options), ..Default::default() }
    }

    pub fn options(&self) -> &ExecutionStateOptions {
        &self.options
    }

    pub fn job(&self) -> Option<&Job> {
        self.job.as_deref()
    }

    pub fn pod(&self) -> Option<&Pod> {
        self.pod.as_deref()
    }

    pub fn job_view(&self) -> Option<JobView<'_>> {
        self.job().map(JobView)
    }

    pub fn pod_view(&self) -> Option<PodView<'_>> {
        self.pod().map(PodView)
    }

    pub fn job_events(&self) -> &JobEvents {
        &self.job_events
    }

    pub fn pod_events(&self) -> &PodEvents {
        &self.pod_events
    }

    pub(crate) fn set_job(&mut self, job: Option<Job>) {
        self.job = job.map(Arc::new);
    }

    pub(crate) fn set_pod(&mut self, pod: Option<Pod>) {
        self.pod = pod.map(Arc::new);
    }

    pub(crate) fn push_job_event(&mut self, event: Event) -> bool {
        self.job_events.0.push(event)
    }

    pub(crate) fn push_pod_event(&mut self, event: Event) -> bool {
        self.pod_events.0.push(event)
    }

    pub fn job_exists(&self) -> bool {
        self.job.is_some()
    }

    pub fn pod_exists(&self) -> bool {
        self.pod.is_some()
    }

    pub fn resource_id(&self) -> String {
        if !self.options.resource_id.is_empty() {
            return self.options.resource_id.clone();
        }
        self.job_view()
            .map(|j| j.resource_id().to_string())
            .or_else(|| self.pod_view().and_then(|p| p.resource_id()).map(str::to_string))
            .unwrap_or_default()
    }

    pub fn namespace(&self) -> String {
        self.options
            .namespace
            .as_deref()
            .or_else(|| self.job_view().and_then(|j| j.namespace()))
            .or_else(|| self.pod_view().and_then(|p| p.namespace()))
            .or_else(|| self.job_events.namespace())
            .or_else(|| self.pod_events.namespace())
            .unwrap_or_default()
            .to_string()
    }

    fn annotation(&self, key: &str) -> Option<&str> {
        self.job_view()
            .and_then(|j| j.annotation(key))
            .or_else(|| self.pod_view().and_then(|p| p.annotation(key)))
    }

    /// Step tree of the workflow.
    pub fn signature(&self) -> Result<Vec<Signature>, StateError> {
        if let Some(sig) = &self.options.signature {
            return Ok(sig.clone());
        }
        let raw = self.annotation(SIGNATURE_ANNOTATION).ok_or(StateError::MissingData)?;
        signature::parse(raw).map_err(|e| StateError::Invalid { what: "signature", message: e.to_string() })
    }

    /// Per-container action groups of the workflow.
    pub fn action_groups(&self) -> Result<ActionGroups, StateError> {
        if let Some(actions) = &self.options.actions {
            return Ok(actions.clone());
        }
        let raw = self.annotation(SPEC_ANNOTATION).ok_or(StateError::MissingData)?;
        ActionGroups::parse(raw).map_err(|e| StateError::Invalid { what: "actions", message: e.to_string() })
    }

    pub fn scheduled_at(&self) -> Option<Timestamp> {
        first_set([
            self.options.scheduled_at,
            self.annotation(SCHEDULED_AT_ANNOTATION).and_then(parse_rfc3339),
            self.job_creation_timestamp(),
        ])
    }

    /// Reason given by whoever stopped the execution, from the Job or Pod.
    pub fn termination_reason(&self) -> Option<&str> {
        self.annotation(TERMINATION_REASON_ANNOTATION)
    }

    /// How the execution was stopped from outside; `aborted` unless annotated.
    pub fn termination_code(&self) -> String {
        self.annotation(TERMINATION_CODE_ANNOTATION)
            .map(str::to_string)
            .unwrap_or_else(|| WorkflowStatus::Aborted.to_string())
    }

    pub fn pod_name(&self) -> String {
        self.pod_view()
            .map(|p| p.name().to_string())
            .or_else(|| self.job_events.pod_name())
            .or_else(|| self.pod_events.pod_name())
            .unwrap_or_default()
    }

    pub fn pod_node_name(&self) -> String {
        self.pod_view()
            .and_then(|p| p.node_name().map(str::to_string))
            .or_else(|| self.pod_events.node_name())
            .unwrap_or_default()
    }

    pub fn pod_ip(&self) -> String {
        self.pod_view().and_then(|p| p.ip()).unwrap_or_default().to_string()
    }

    pub fn containers_ready(&self) -> bool {
        self.pod_view().is_some_and(|p| p.containers_ready())
    }

    pub fn job_creation_timestamp(&self) -> Option<Timestamp> {
        self.job_view().and_then(|j| j.creation_timestamp())
    }

    pub fn estimated_job_creation_timestamp(&self) -> Option<Timestamp> {
        first_set([
            self.job_creation_timestamp(),
            self.job_events.first_timestamp(),
            self.estimated_pod_creation_timestamp(),
        ])
    }

    pub fn pod_creation_timestamp(&self) -> Option<Timestamp> {
        first_set([
            self.pod_view().and_then(|p| p.creation_timestamp()),
            self.job_events.pod_creation_timestamp(),
        ])
    }

    pub fn estimated_pod_creation_timestamp(&self) -> Option<Timestamp> {
        first_set([
            self.pod_creation_timestamp(),
            self.pod_events.first_timestamp(),
            self.estimated_pod_start_timestamp(),
        ])
    }

    pub fn pod_start_timestamp(&self) -> Option<Timestamp> {
        first_set([self.pod_view().and_then(|p| p.start_timestamp()), self.pod_events.start_timestamp()])
    }

    pub fn estimated_pod_start_timestamp(&self) -> Option<Timestamp> {
        first_set([
            self.pod_start_timestamp(),
            self.pod_events.scheduled_timestamp(),
            self.pod_events.container("1").started_at,
        ])
    }

    pub fn pod_deletion_timestamp(&self) -> Option<Timestamp> {
        first_set([
            self.pod_view().and_then(|p| p.deletion_timestamp()),
            self.job_events.pod_deletion_timestamp(),
        ])
    }

    pub fn pod_created(&self) -> bool {
        self.pod_exists() || self.job_events.pod_name().is_some() || !self.pod_events.list().is_empty()
    }

    /// The pod was placed on a node and began running containers.
    pub fn pod_started(&self) -> bool {
        self.pod_start_timestamp().is_some() || self.pod_view().is_some_and(|p| p.is_finished())
    }

    pub fn container_started(&self, name: &str) -> bool {
        self.pod_view().is_some_and(|p| p.container_started(name))
            || self.pod_events.container(name).started_at.is_some()
    }

    pub fn container_start_timestamp(&self, name: &str) -> Option<Timestamp> {
        first_set([
            self.pod_view().and_then(|p| p.container_start_timestamp(name)),
            self.pod_events.container(name).started_at,
        ])
    }

    pub fn container_finished(&self, name: &str) -> bool {
        self.pod_view().is_some_and(|p| p.container_finished(name))
    }

    pub fn container_failed(&self, name: &str) -> bool {
        self.pod_view().is_some_and(|p| p.container_failed(name))
    }

    pub fn job_finished(&self) -> bool {
        self.job_view().is_some_and(|j| j.is_finished())
    }

    pub fn pod_finished(&self) -> bool {
        self.pod_view().is_some_and(|p| p.is_finished())
    }

    /// When the execution stopped, as soon as any source can tell.
    pub fn completion_timestamp(&self) -> Option<Timestamp> {
        if let Some(pod) = self.pod_view().filter(|p| p.is_finished()) {
            return first_set([pod.finish_timestamp(), self.job_view().and_then(|j| j.completion_timestamp())]);
        }
        if let Some(job) = self.job_view().filter(|j| j.is_finished()) {
            return first_set([job.completion_timestamp(), self.job_events.finish_timestamp()]);
        }
        if self.job_events.error() {
            return self.job_events.finish_timestamp();
        }
        self.pod_events.finish_timestamp()
    }

    pub fn completed(&self) -> bool {
        self.completion_timestamp().is_some()
    }

    pub fn job_execution_error(&self) -> String {
        let from_job = self.job_view().map(|j| j.execution_error()).unwrap_or_default();
        if !from_job.is_empty() {
            return from_job;
        }
        match self.termination_reason() {
            Some(reason) => reason.to_string(),
            None => self.job_events.error_message(),
        }
    }

    pub fn pod_execution_error(&self) -> String {
        let from_pod = self.pod_view().map(|p| p.execution_error()).unwrap_or_default();
        if from_pod.is_empty() || from_pod == "Error" {
            let from_events = self.pod_events.error_message();
            if !from_events.is_empty() {
                return from_events;
            }
        }
        from_pod
    }

    /// Best available explanation of why the execution failed.
    pub fn execution_error(&self) -> String {
        let pod = self.pod_execution_error();
        if pod.is_empty() {
            self.job_execution_error()
        } else {
            pod
        }
    }

    /// Result of a container once it terminated; `None` while it may still run.
    pub fn container_result(&self, name: &str) -> Option<ContainerResult> {
        let pod = self.pod_view()?;
        pod.container_result(name, &self.execution_error())
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
