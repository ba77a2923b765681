// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::event;
use twc_core::test_support::ts;

fn job_events(events: Vec<Event>) -> JobEvents {
    JobEvents(EventList::new(events))
}

fn pod_events(events: Vec<Event>) -> PodEvents {
    PodEvents(EventList::new(events))
}

#[test]
fn duplicates_are_ignored() {
    let mut list = EventList::default();
    let e = event("e1", "Job", "exec-1", None, "SuccessfulCreate", "Created pod: p", ts(1));
    assert!(list.push(e.clone()));
    assert!(!list.push(e));
    assert_eq!(list.len(), 1);
}

#[test]
fn job_events_name_the_pod() {
    let events = job_events(vec![event("e1", "Job", "exec-1", None, "SuccessfulCreate", "Created pod: exec-1-xyz", ts(3))]);
    assert_eq!(events.pod_name().as_deref(), Some("exec-1-xyz"));
    assert_eq!(events.pod_creation_timestamp(), Some(ts(3)));
    assert!(!events.error());
}

#[yare::parameterized(
    backoff = { "BackoffLimitExceeded", true },
    deadline = { "DeadlineExceeded", true },
    completed = { "Completed", false },
    created = { "SuccessfulCreate", false },
)]
fn job_error_reasons(reason: &str, is_error: bool) {
    let events = job_events(vec![event("e1", "Job", "exec-1", None, reason, "msg", ts(2))]);
    assert_eq!(events.error(), is_error);
    assert_eq!(events.finish_timestamp().is_some(), is_error || reason == "Completed");
}

#[test]
fn job_error_message_uses_last_error() {
    let events = job_events(vec![
        event("e1", "Job", "exec-1", None, "DeadlineExceeded", "first", ts(1)),
        event("e2", "Job", "exec-1", None, "BackoffLimitExceeded", "second", ts(2)),
    ]);
    assert_eq!(events.error_message(), "BackoffLimitExceeded: second");
    assert_eq!(events.finish_timestamp(), Some(ts(1)));
}

#[test]
fn scheduled_event_names_node() {
    let events = pod_events(vec![event(
        "p1",
        "Pod",
        "exec-1-xyz",
        None,
        "Scheduled",
        "Successfully assigned default/exec-1-xyz to worker-3",
        ts(4),
    )]);
    assert_eq!(events.node_name().as_deref(), Some("worker-3"));
    assert_eq!(events.pod_name().as_deref(), Some("exec-1-xyz"));
    assert_eq!(events.scheduled_timestamp(), Some(ts(4)));
}

#[test]
fn container_events_track_creation_and_start() {
    let events = pod_events(vec![
        event("p1", "Pod", "exec-1-xyz", Some("1"), "Created", "Created container 1", ts(5)),
        event("p2", "Pod", "exec-1-xyz", Some("1"), "Started", "Started container 1", ts(6)),
        event("p3", "Pod", "exec-1-xyz", Some("2"), "Created", "Created container 2", ts(8)),
    ]);
    assert_eq!(events.container("1"), ContainerEvents { created_at: Some(ts(5)), started_at: Some(ts(6)) });
    assert_eq!(events.container("2").started_at, None);
    assert_eq!(events.start_timestamp(), Some(ts(6)));
}

#[test]
fn pod_errors_need_warning_type() {
    let mut normal = event("p1", "Pod", "exec-1-xyz", Some("1"), "Failed", "pull failed", ts(5));
    normal.type_ = Some("Normal".into());
    assert!(!pod_events(vec![normal]).error());

    let warning = event("p2", "Pod", "exec-1-xyz", Some("1"), "Failed", "pull failed", ts(5));
    let events = pod_events(vec![warning]);
    assert!(events.error());
    assert_eq!(events.error_message(), "Failed: pull failed");
}

#[test]
fn container_field_path_is_parsed() {
    let e = event("p1", "Pod", "exec-1-xyz", Some("3"), "Started", "", ts(1));
    assert_eq!(event_container(&e), Some("3"));
    let e = event("p2", "Pod", "exec-1-xyz", None, "Scheduled", "", ts(1));
    assert_eq!(event_container(&e), None);
}

#[test]
fn evicted_event_marks_finish() {
    let events = pod_events(vec![event("p1", "Pod", "exec-1-xyz", None, "Evicted", "low memory", ts(9))]);
    assert_eq!(events.finish_timestamp(), Some(ts(9)));
    assert!(events.error());
}
