// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{
    container_running, container_terminated, event, finish_job, job, layout_annotations, pod, pod_phase, start_pod,
    with_annotations,
};
use twc_core::actions::Action;
use twc_core::test_support::{linear_signature, ts};

fn state() -> ExecutionState {
    ExecutionState::new(ExecutionStateOptions { resource_id: "exec-1".into(), ..Default::default() })
}

#[test]
fn empty_state_knows_nothing() {
    let s = state();
    assert!(!s.job_exists());
    assert!(!s.pod_created());
    assert!(!s.completed());
    assert_eq!(s.signature(), Err(StateError::MissingData));
    assert_eq!(s.termination_code(), "aborted");
    assert_eq!(s.resource_id(), "exec-1");
}

#[test]
fn layout_comes_from_job_annotations() {
    let signature = linear_signature(&["a", "b"]);
    let actions = ActionGroups(vec![vec![Action::start("a"), Action::end("a"), Action::start("b"), Action::end("b")]]);
    let mut s = state();
    s.set_job(Some(with_annotations(job("exec-1", ts(0)), layout_annotations(&signature, &actions))));
    assert_eq!(s.signature().unwrap().len(), 2);
    assert_eq!(s.action_groups().unwrap(), actions);
}

#[test]
fn invalid_signature_is_reported() {
    let mut s = state();
    s.set_job(Some(with_annotations(
        job("exec-1", ts(0)),
        [(SIGNATURE_ANNOTATION.to_string(), "{not json".to_string())].into(),
    )));
    assert!(matches!(s.signature(), Err(StateError::Invalid { what: "signature", .. })));
}

#[test]
fn termination_code_annotation_wins() {
    let mut s = state();
    s.set_job(Some(with_annotations(
        job("exec-1", ts(0)),
        [(TERMINATION_CODE_ANNOTATION.to_string(), "canceled".to_string())].into(),
    )));
    assert_eq!(s.termination_code(), "canceled");
}

#[test]
fn pod_name_and_node_fall_back_to_events() {
    let mut s = state();
    s.push_job_event(event("e1", "Job", "exec-1", None, "SuccessfulCreate", "Created pod: exec-1-abc", ts(1)));
    s.push_pod_event(event("p1", "Pod", "exec-1-abc", None, "Scheduled", "Successfully assigned default/exec-1-abc to n1", ts(2)));
    assert!(s.pod_created());
    assert_eq!(s.pod_name(), "exec-1-abc");
    assert_eq!(s.pod_node_name(), "n1");
    assert_eq!(s.pod_creation_timestamp(), Some(ts(1)));
    assert_eq!(s.estimated_job_creation_timestamp(), Some(ts(1)));
}

#[test]
fn estimated_timestamps_prefer_objects() {
    let mut s = state();
    s.set_job(Some(job("exec-1", ts(0))));
    s.set_pod(Some(start_pod(pod("exec-1", "exec-1-abc", ts(2)), "n1", "10.0.0.9", ts(3))));
    assert_eq!(s.estimated_job_creation_timestamp(), Some(ts(0)));
    assert_eq!(s.estimated_pod_creation_timestamp(), Some(ts(2)));
    assert_eq!(s.estimated_pod_start_timestamp(), Some(ts(3)));
    assert!(s.pod_started());
    assert_eq!(s.pod_ip(), "10.0.0.9");
}

#[test]
fn container_progress_combines_pod_and_events() {
    let mut s = state();
    s.push_pod_event(event("p1", "Pod", "exec-1-abc", Some("1"), "Started", "", ts(4)));
    assert!(s.container_started("1"));
    assert_eq!(s.container_start_timestamp("1"), Some(ts(4)));
    assert!(!s.container_finished("1"));

    s.set_pod(Some(container_running(pod("exec-1", "exec-1-abc", ts(2)), "1", ts(5))));
    assert_eq!(s.container_start_timestamp("1"), Some(ts(5)));
}

#[test]
fn completion_prefers_finished_pod() {
    let mut s = state();
    s.set_job(Some(finish_job(job("exec-1", ts(0)), true, ts(20))));
    assert_eq!(s.completion_timestamp(), Some(ts(20)));

    let p = container_terminated(pod("exec-1", "exec-1-abc", ts(1)), "1", 0, "Completed", "p,0", ts(2), ts(15));
    s.set_pod(Some(pod_phase(p, "Succeeded")));
    assert_eq!(s.completion_timestamp(), Some(ts(15)));
    assert!(s.completed());
}

#[test]
fn running_pod_with_running_job_is_not_completed() {
    let mut s = state();
    s.set_job(Some(job("exec-1", ts(0))));
    s.set_pod(Some(container_running(pod("exec-1", "exec-1-abc", ts(1)), "1", ts(2))));
    assert!(!s.completed());
}

#[test]
fn execution_error_prefers_pod_events_over_generic_pod_error() {
    let mut s = state();
    let mut p = pod_phase(pod("exec-1", "exec-1-abc", ts(1)), "Failed");
    p.status.as_mut().unwrap().reason = Some("Error".into());
    s.set_pod(Some(p));
    s.push_pod_event(event("p1", "Pod", "exec-1-abc", None, "Evicted", "node shutdown", ts(3)));
    assert_eq!(s.execution_error(), "Evicted: node shutdown");
}

#[test]
fn termination_reason_on_pod_explains_the_job() {
    let mut s = state();
    s.set_job(Some(job("exec-1", ts(0))));
    s.set_pod(Some(with_annotations(
        pod("exec-1", "exec-1-abc", ts(1)),
        [(TERMINATION_REASON_ANNOTATION.to_string(), "stopped by user".to_string())].into(),
    )));
    assert_eq!(s.termination_reason(), Some("stopped by user"));
    assert_eq!(s.job_execution_error(), "stopped by user");
}

#[test]
fn pod_start_estimate_uses_first_container() {
    let mut s = state();
    s.set_pod(Some(container_running(pod("exec-1", "exec-1-abc", ts(1)), "1", ts(4))));
    assert_eq!(s.pod_start_timestamp(), Some(ts(4)));
    assert_eq!(s.estimated_pod_start_timestamp(), Some(ts(4)));
    assert!(s.pod_started());
}

#[test]
fn scheduled_at_annotation_is_parsed() {
    let mut s = state();
    s.set_job(Some(with_annotations(
        job("exec-1", ts(10)),
        [(SCHEDULED_AT_ANNOTATION.to_string(), "2023-11-14T22:13:25Z".to_string())].into(),
    )));
    assert_eq!(s.scheduled_at(), Some(ts(5)));
}
