// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Accessors over the Kubernetes events of a Job and of its Pod.

use super::time;
use k8s_openapi::api::core::v1::Event;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use twc_core::time::{earliest, first_set, latest};
use twc_core::Timestamp;

/// Job event reasons that mean the Job gave up.
pub const JOB_ERROR_REASONS: &[&str] = &["BackoffLimitExceeded", "DeadlineExceeded"];
pub const JOB_SUCCESS_REASON: &str = "Completed";
/// Warning reasons on pod events that point to a broken execution.
pub const POD_ERROR_REASONS: &[&str] = &["Failed", "Evicted", "Preempting", "FailedCreatePodSandBox"];
/// Pod event reasons after which no container runs any longer.
pub const POD_FINISH_REASONS: &[&str] = &["Killing", "Evicted", "Preempting"];

#[allow(clippy::expect_used)]
static CREATED_POD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Created pod: (\S+)$").expect("constant regex pattern is valid"));

#[allow(clippy::expect_used)]
static SCHEDULED_POD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Successfully assigned ([^/\s]+)/(\S+) to (\S+)$").expect("constant regex pattern is valid")
});

#[allow(clippy::expect_used)]
static CONTAINER_FIELD_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^spec\.(?:initContainers|containers)\{([^}]+)\}$").expect("constant regex pattern is valid")
});

pub fn event_reason(event: &Event) -> &str {
    event.reason.as_deref().unwrap_or_default()
}

pub fn event_message(event: &Event) -> &str {
    event.message.as_deref().unwrap_or_default()
}

fn has_reason(event: &Event, reasons: &[&str]) -> bool {
    reasons.iter().any(|r| *r == event_reason(event))
}

fn is_warning(event: &Event) -> bool {
    event.type_.as_deref() == Some("Warning")
}

/// Latest moment the event was observed.
pub fn event_timestamp(event: &Event) -> Option<Timestamp> {
    latest([
        time(&event.metadata.creation_timestamp),
        time(&event.first_timestamp),
        time(&event.last_timestamp),
        event.event_time.as_ref().map(|t| t.0),
    ])
}

/// First moment the event was observed.
pub fn event_first_timestamp(event: &Event) -> Option<Timestamp> {
    first_set([
        time(&event.first_timestamp),
        event.event_time.as_ref().map(|t| t.0),
        time(&event.metadata.creation_timestamp),
        time(&event.last_timestamp),
    ])
}

/// Container an event refers to, from its `spec.containers{name}` field path.
pub fn event_container(event: &Event) -> Option<&str> {
    let path = event.involved_object.field_path.as_deref()?;
    CONTAINER_FIELD_PATH.captures(path).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// `reason: message` rendering used for execution errors.
pub fn describe(event: &Event) -> String {
    match (event_reason(event), event_message(event)) {
        ("", m) => m.to_string(),
        (r, "") => r.to_string(),
        (r, m) => format!("{}: {}", r, m),
    }
}

fn key(event: &Event) -> (Option<&str>, Option<&str>) {
    (event.metadata.uid.as_deref(), event.metadata.resource_version.as_deref())
}

/// Ordered, deduplicated event list shared between snapshots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventList(Arc<Vec<Event>>);

impl EventList {
    pub fn new(events: Vec<Event>) -> Self {
        let mut list = Self::default();
        for event in events {
            list.push(event);
        }
        list
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Event] {
        &self.0
    }

    /// Append unless an identical event (same uid and version) is present.
    pub fn push(&mut self, event: Event) -> bool {
        let duplicate = self.0.iter().any(|e| {
            let (uid, version) = key(e);
            (uid.is_some() && (uid, version) == key(&event)) || *e == event
        });
        if duplicate {
            return false;
        }
        Arc::make_mut(&mut self.0).push(event);
        true
    }

    fn namespace(&self) -> Option<&str> {
        self.0.iter().find_map(|e| e.involved_object.namespace.as_deref().or(e.metadata.namespace.as_deref()))
    }

    fn first_timestamp(&self) -> Option<Timestamp> {
        earliest(self.0.iter().map(event_first_timestamp))
    }

    fn last_timestamp(&self) -> Option<Timestamp> {
        latest(self.0.iter().map(event_timestamp))
    }

    fn with_reason<'a>(&'a self, reasons: &'static [&'static str]) -> impl Iterator<Item = &'a Event> + 'a {
        self.0.iter().filter(move |e| has_reason(e, reasons))
    }
}

/// Events whose involved object is the Job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobEvents(pub EventList);

impl JobEvents {
    pub fn list(&self) -> &EventList {
        &self.0
    }

    pub fn namespace(&self) -> Option<&str> {
        self.0.namespace()
    }

    pub fn first_timestamp(&self) -> Option<Timestamp> {
        self.0.first_timestamp()
    }

    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.0.last_timestamp()
    }

    fn created(&self) -> Option<(&Event, String)> {
        self.0.iter().rev().find_map(|e| {
            if event_reason(e) != "SuccessfulCreate" {
                return None;
            }
            let name = CREATED_POD.captures(event_message(e))?.get(1)?.as_str().to_string();
            Some((e, name))
        })
    }

    /// Name of the pod the Job controller created.
    pub fn pod_name(&self) -> Option<String> {
        self.created().map(|(_, name)| name)
    }

    pub fn pod_creation_timestamp(&self) -> Option<Timestamp> {
        self.created().and_then(|(e, _)| event_first_timestamp(e))
    }

    pub fn pod_deletion_timestamp(&self) -> Option<Timestamp> {
        self.0.iter().rev().find(|e| event_reason(e) == "SuccessfulDelete").and_then(event_first_timestamp)
    }

    fn error_event(&self) -> Option<&Event> {
        self.0.with_reason(JOB_ERROR_REASONS).last()
    }

    pub fn error(&self) -> bool {
        self.error_event().is_some()
    }

    pub fn error_message(&self) -> String {
        self.error_event().map(describe).unwrap_or_default()
    }

    pub fn success(&self) -> bool {
        self.0.iter().any(|e| event_reason(e) == JOB_SUCCESS_REASON)
    }

    /// First moment the Job reported an outcome.
    pub fn finish_timestamp(&self) -> Option<Timestamp> {
        earliest(
            self.0
                .iter()
                .filter(|e| has_reason(e, JOB_ERROR_REASONS) || event_reason(e) == JOB_SUCCESS_REASON)
                .map(event_first_timestamp),
        )
    }
}

/// Progress of one container as told by pod events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerEvents {
    pub created_at: Option<Timestamp>,
    pub started_at: Option<Timestamp>,
}

/// Events whose involved object is the Pod.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PodEvents(pub EventList);

impl PodEvents {
    pub fn list(&self) -> &EventList {
        &self.0
    }

    pub fn namespace(&self) -> Option<&str> {
        self.0.namespace()
    }

    pub fn first_timestamp(&self) -> Option<Timestamp> {
        self.0.first_timestamp()
    }

    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.0.last_timestamp()
    }

    fn scheduled(&self) -> Option<(&Event, String, String)> {
        self.0.iter().rev().find_map(|e| {
            if event_reason(e) != "Scheduled" {
                return None;
            }
            let caps = SCHEDULED_POD.captures(event_message(e))?;
            Some((e, caps.get(2)?.as_str().to_string(), caps.get(3)?.as_str().to_string()))
        })
    }

    pub fn pod_name(&self) -> Option<String> {
        self.scheduled()
            .map(|(_, pod, _)| pod)
            .or_else(|| self.0.iter().find_map(|e| e.involved_object.name.clone()))
    }

    /// Node the scheduler assigned the pod to.
    pub fn node_name(&self) -> Option<String> {
        self.scheduled().map(|(_, _, node)| node)
    }

    pub fn scheduled_timestamp(&self) -> Option<Timestamp> {
        self.scheduled().and_then(|(e, _, _)| event_first_timestamp(e))
    }

    /// First container start reported by the kubelet.
    pub fn start_timestamp(&self) -> Option<Timestamp> {
        earliest(
            self.0
                .iter()
                .filter(|e| event_reason(e) == "Started" && event_container(e).is_some())
                .map(event_first_timestamp),
        )
    }

    fn error_event(&self) -> Option<&Event> {
        self.0.with_reason(POD_ERROR_REASONS).filter(|e| is_warning(e)).last()
    }

    pub fn error(&self) -> bool {
        self.error_event().is_some()
    }

    pub fn error_message(&self) -> String {
        self.error_event().map(describe).unwrap_or_default()
    }

    /// First moment a container was stopped from outside.
    pub fn finish_timestamp(&self) -> Option<Timestamp> {
        earliest(self.0.with_reason(POD_FINISH_REASONS).map(event_first_timestamp))
    }

    pub fn container(&self, name: &str) -> ContainerEvents {
        let mut out = ContainerEvents::default();
        for event in self.0.iter().filter(|e| event_container(e) == Some(name)) {
            let ts = event_first_timestamp(event);
            match event_reason(event) {
                "Created" => out.created_at = earliest([out.created_at, ts]),
                "Started" => out.started_at = earliest([out.started_at, ts]),
                _ => {}
            }
        }
        out
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
