// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only accessors over a Pod object.

use super::{annotation, reason_message, time, RESOURCE_ID_LABEL};
use k8s_openapi::api::core::v1::{ContainerStateTerminated, ContainerStatus, Pod, PodCondition};
use twc_core::container::COMPLETED_REASON;
use twc_core::time::latest;
use twc_core::{ContainerResult, Timestamp};

const DEADLINE_EXCEEDED: &str = "DeadlineExceeded";

/// Details reported when the pod was removed through the eviction API.
pub const EVICTION_DETAILS: &str = "Pod has been requested for deletion using the Kubernetes API";

/// Borrowed view over a Pod.
#[derive(Debug, Clone, Copy)]
pub struct PodView<'a>(pub &'a Pod);

impl<'a> PodView<'a> {
    pub fn name(&self) -> &'a str {
        self.0.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> Option<&'a str> {
        self.0.metadata.namespace.as_deref()
    }

    pub fn resource_id(&self) -> Option<&'a str> {
        self.0.metadata.labels.as_ref().and_then(|l| l.get(RESOURCE_ID_LABEL)).map(String::as_str)
    }

    pub fn annotation(&self, key: &str) -> Option<&'a str> {
        annotation(&self.0.metadata, key)
    }

    /// Assigned node, else the node the scheduler nominated.
    pub fn node_name(&self) -> Option<&'a str> {
        let assigned = self.0.spec.as_ref().and_then(|s| s.node_name.as_deref()).filter(|s| !s.is_empty());
        assigned.or_else(|| {
            self.0.status.as_ref().and_then(|s| s.nominated_node_name.as_deref()).filter(|s| !s.is_empty())
        })
    }

    pub fn ip(&self) -> Option<&'a str> {
        self.0.status.as_ref().and_then(|s| s.pod_ip.as_deref()).filter(|s| !s.is_empty())
    }

    pub fn phase(&self) -> &'a str {
        self.0.status.as_ref().and_then(|s| s.phase.as_deref()).unwrap_or_default()
    }

    pub fn creation_timestamp(&self) -> Option<Timestamp> {
        time(&self.0.metadata.creation_timestamp)
    }

    pub fn deletion_timestamp(&self) -> Option<Timestamp> {
        time(&self.0.metadata.deletion_timestamp)
    }

    /// `status.startTime`, else the start of the first container.
    pub fn start_timestamp(&self) -> Option<Timestamp> {
        self.0.status.as_ref().and_then(|s| time(&s.start_time)).or_else(|| self.container_start_timestamp("1"))
    }

    fn conditions(&self) -> impl Iterator<Item = &'a PodCondition> {
        self.0.status.as_ref().and_then(|s| s.conditions.as_ref()).into_iter().flatten()
    }

    fn condition(&self, kind: &str) -> Option<&'a PodCondition> {
        self.conditions().find(|c| c.type_ == kind && c.status == "True")
    }

    fn init_statuses(&self) -> impl Iterator<Item = &'a ContainerStatus> {
        self.0.status.as_ref().and_then(|s| s.init_container_statuses.as_ref()).into_iter().flatten()
    }

    fn main_statuses(&self) -> impl Iterator<Item = &'a ContainerStatus> {
        self.0.status.as_ref().and_then(|s| s.container_statuses.as_ref()).into_iter().flatten()
    }

    fn statuses(&self) -> impl Iterator<Item = &'a ContainerStatus> {
        self.init_statuses().chain(self.main_statuses())
    }

    /// A pod is finished once it will not run any more containers: it
    /// succeeded, failed, is being deleted or disrupted, or one of its
    /// containers was stopped abnormally.
    pub fn is_finished(&self) -> bool {
        if matches!(self.phase(), "Succeeded" | "Failed") || self.deletion_timestamp().is_some() {
            return true;
        }
        if self.condition("DisruptionTarget").is_some() {
            return true;
        }
        if self.phase() == "Unknown" && self.conditions().any(|c| c.reason.as_deref() == Some("PodCompleted")) {
            return true;
        }
        let abnormal =
            |t: &ContainerStateTerminated| t.reason.as_deref().is_some_and(|r| !r.is_empty() && r != COMPLETED_REASON);
        // Init containers must exit cleanly for the pod to go on.
        if self.init_statuses().filter_map(terminated_state).any(|t| abnormal(t) || t.exit_code != 0) {
            return true;
        }
        self.main_statuses().filter_map(terminated_state).any(abnormal)
    }

    pub fn containers_ready(&self) -> bool {
        self.condition("ContainersReady").is_some()
    }

    /// Status of a container, init containers first.
    pub fn container_status(&self, name: &str) -> Option<&'a ContainerStatus> {
        self.statuses().find(|s| s.name == name)
    }

    fn terminated(&self, name: &str) -> Option<&'a ContainerStateTerminated> {
        self.container_status(name).and_then(terminated_state)
    }

    pub fn container_started(&self, name: &str) -> bool {
        self.container_status(name).is_some_and(|s| {
            s.started == Some(true)
                || s.state.as_ref().is_some_and(|st| st.running.is_some() || st.terminated.is_some())
        })
    }

    pub fn container_start_timestamp(&self, name: &str) -> Option<Timestamp> {
        let state = self.container_status(name)?.state.as_ref()?;
        state
            .running
            .as_ref()
            .and_then(|r| time(&r.started_at))
            .or_else(|| state.terminated.as_ref().and_then(|t| time(&t.started_at)))
    }

    /// The container will not run again: it terminated or the pod is gone.
    pub fn container_finished(&self, name: &str) -> bool {
        self.terminated(name).is_some() || self.is_finished()
    }

    pub fn container_finish_timestamp(&self, name: &str) -> Option<Timestamp> {
        self.terminated(name).and_then(|t| time(&t.finished_at))
    }

    pub fn container_failed(&self, name: &str) -> bool {
        self.terminated(name).is_some_and(|t| {
            t.exit_code != 0 || t.reason.as_deref().is_some_and(|r| r != COMPLETED_REASON)
        })
    }

    /// Moment the pod stopped, once finished.
    pub fn finish_timestamp(&self) -> Option<Timestamp> {
        if !self.is_finished() {
            return None;
        }
        let containers = self.statuses().map(|s| terminated_state(s).and_then(|t| time(&t.finished_at)));
        let conditions = self
            .conditions()
            .filter(|c| c.type_ == "Ready" || c.type_ == "ContainersReady")
            .map(|c| time(&c.last_transition_time));
        latest(containers.chain(conditions)).or_else(|| self.deletion_timestamp())
    }

    /// Pod-level failure reason, empty when there is none.
    pub fn execution_error(&self) -> String {
        let status = self.0.status.as_ref();
        let reason = status.and_then(|s| s.reason.as_deref()).unwrap_or_default();
        let deadline = self.0.spec.as_ref().and_then(|s| s.active_deadline_seconds);
        if let (DEADLINE_EXCEEDED, Some(seconds)) = (reason, deadline) {
            return format!("Pod timed out after {} seconds", seconds);
        }
        if let Some(cond) = self.condition("DisruptionTarget") {
            if cond.reason.as_deref() == Some("EvictionByEvictionAPI") {
                return EVICTION_DETAILS.to_string();
            }
            return reason_message(
                cond.reason.as_deref().unwrap_or_default(),
                cond.message.as_deref().unwrap_or_default(),
            );
        }
        reason_message(reason, status.and_then(|s| s.message.as_deref()).unwrap_or_default())
    }

    /// Decoded result of a container, or `None` while it may still run.
    pub fn container_result(&self, name: &str, fallback: &str) -> Option<ContainerResult> {
        if let Some(terminated) = self.terminated(name) {
            return Some(ContainerResult::from_termination(
                terminated.reason.as_deref().unwrap_or_default(),
                terminated.message.as_deref().unwrap_or_default(),
                fallback,
            ));
        }
        if !self.is_finished() {
            return None;
        }
        let details = self.execution_error();
        Some(ContainerResult::unknown(if details.is_empty() { fallback.to_string() } else { details }))
    }

    pub fn latest_timestamp(&self) -> Option<Timestamp> {
        let conditions = self.conditions().map(|c| time(&c.last_transition_time));
        let containers = self.statuses().filter_map(|s| s.state.as_ref()).flat_map(|st| {
            [
                st.running.as_ref().and_then(|r| time(&r.started_at)),
                st.terminated.as_ref().and_then(|t| time(&t.finished_at)),
            ]
        });
        latest(
            [self.creation_timestamp(), self.start_timestamp(), self.deletion_timestamp()]
                .into_iter()
                .chain(conditions)
                .chain(containers),
        )
    }
}

fn terminated_state(status: &ContainerStatus) -> Option<&ContainerStateTerminated> {
    status.state.as_ref().and_then(|s| s.terminated.as_ref())
}

#[cfg(test)]
#[path = "pod_tests.rs"]
mod tests;
