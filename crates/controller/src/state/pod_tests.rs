// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{container_running, container_terminated, pod, pod_phase, start_pod};
use k8s_openapi::api::core::v1::{
    ContainerState, ContainerStateTerminated, ContainerStatus, PodCondition, PodSpec, PodStatus,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use twc_core::test_support::ts;
use twc_core::StepStatus;

#[test]
fn pending_pod_has_nothing_to_report() {
    let p = pod("exec-1", "exec-1-abc", ts(0));
    let view = PodView(&p);
    assert_eq!(view.node_name(), None);
    assert_eq!(view.ip(), None);
    assert!(!view.is_finished());
    assert!(!view.container_started("1"));
    assert_eq!(view.container_result("1", "fallback"), None);
    assert_eq!(view.resource_id(), Some("exec-1"));
}

#[test]
fn running_container_is_started_but_not_finished() {
    let p = container_running(start_pod(pod("exec-1", "exec-1-abc", ts(0)), "node-a", "10.1.0.4", ts(1)), "1", ts(2));
    let view = PodView(&p);
    assert_eq!(view.node_name(), Some("node-a"));
    assert_eq!(view.ip(), Some("10.1.0.4"));
    assert!(view.container_started("1"));
    assert_eq!(view.container_start_timestamp("1"), Some(ts(2)));
    assert!(!view.container_finished("1"));
    assert!(!view.container_started("2"));
}

#[test]
fn terminated_container_decodes_its_message() {
    let p = container_terminated(pod("exec-1", "exec-1-abc", ts(0)), "1", 137, "Error", "p,0/f,137", ts(1), ts(5));
    let view = PodView(&p);
    assert!(view.container_finished("1"));
    assert!(view.container_failed("1"));
    assert_eq!(view.container_finish_timestamp("1"), Some(ts(5)));
    let result = view.container_result("1", "").unwrap();
    assert_eq!(result.statuses.len(), 2);
    assert_eq!(result.statuses[0].status, StepStatus::Passed);
    assert_eq!(result.statuses[1].status, StepStatus::Failed);
    assert_eq!(result.statuses[1].exit_code, 137);
}

#[test]
fn finished_pod_yields_unknown_result_for_silent_container() {
    let mut p = pod_phase(pod("exec-1", "exec-1-abc", ts(0)), "Failed");
    p.status.get_or_insert_with(PodStatus::default).reason = Some("DeadlineExceeded".into());
    let view = PodView(&p);
    assert!(view.container_finished("2"));
    let result = view.container_result("2", "fallback").unwrap();
    assert!(result.statuses.is_empty());
    assert_eq!(result.error_details, "DeadlineExceeded");
}

#[test]
fn eviction_is_described() {
    let mut p = pod("exec-1", "exec-1-abc", ts(0));
    p.status.get_or_insert_with(PodStatus::default).conditions = Some(vec![PodCondition {
        type_: "DisruptionTarget".into(),
        status: "True".into(),
        reason: Some("EvictionByEvictionAPI".into()),
        ..Default::default()
    }]);
    assert_eq!(PodView(&p).execution_error(), EVICTION_DETAILS);
}

#[test]
fn finish_timestamp_uses_latest_container_finish() {
    let p = container_terminated(pod("exec-1", "exec-1-abc", ts(0)), "1", 0, "Completed", "p,0", ts(1), ts(4));
    let p = container_terminated(p, "2", 0, "Completed", "p,0", ts(4), ts(9));
    let p = pod_phase(p, "Succeeded");
    assert_eq!(PodView(&p).finish_timestamp(), Some(ts(9)));
}

#[test]
fn deleted_pod_finishes_at_deletion() {
    let mut p = pod("exec-1", "exec-1-abc", ts(0));
    p.metadata.deletion_timestamp = Some(Time(ts(3)));
    let view = PodView(&p);
    assert!(view.is_finished());
    assert_eq!(view.finish_timestamp(), Some(ts(3)));
}

fn with_condition(mut p: Pod, kind: &str, reason: &str, message: &str) -> Pod {
    p.status.get_or_insert_with(PodStatus::default).conditions.get_or_insert_with(Vec::new).push(PodCondition {
        type_: kind.into(),
        status: "True".into(),
        reason: (!reason.is_empty()).then(|| reason.to_string()),
        message: (!message.is_empty()).then(|| message.to_string()),
        ..Default::default()
    });
    p
}

fn init_terminated(mut p: Pod, exit_code: i32, reason: &str) -> Pod {
    p.status.get_or_insert_with(PodStatus::default).init_container_statuses = Some(vec![ContainerStatus {
        name: "init".into(),
        state: Some(ContainerState {
            terminated: Some(ContainerStateTerminated {
                exit_code,
                reason: Some(reason.into()),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }]);
    p
}

fn running() -> Pod {
    container_running(start_pod(pod("exec-1", "exec-1-abc", ts(0)), "node-a", "10.1.0.4", ts(1)), "1", ts(2))
}

#[yare::parameterized(
    still_running           = { running(), false },
    succeeded               = { pod_phase(running(), "Succeeded"), true },
    failed                  = { pod_phase(running(), "Failed"), true },
    disrupted               = { with_condition(running(), "DisruptionTarget", "PreemptionByScheduler", ""), true },
    unknown_completed       = { with_condition(pod_phase(running(), "Unknown"), "Ready", "PodCompleted", ""), true },
    unknown_otherwise       = { with_condition(pod_phase(running(), "Unknown"), "Ready", "NodeLost", ""), false },
    init_completed          = { init_terminated(running(), 0, "Completed"), false },
    init_nonzero_exit       = { init_terminated(running(), 2, "Completed"), true },
    init_killed             = { init_terminated(running(), 0, "OOMKilled"), true },
    main_oom_killed         = { container_terminated(running(), "1", 137, "OOMKilled", "", ts(1), ts(3)), true },
    main_completed          = { container_terminated(running(), "1", 0, "Completed", "p,0", ts(1), ts(3)), false },
    main_completed_nonzero  = { container_terminated(running(), "1", 1, "Completed", "f,1", ts(1), ts(3)), false },
)]
fn finished_detection(p: Pod, expected: bool) {
    assert_eq!(PodView(&p).is_finished(), expected);
}

#[test]
fn evicted_pod_stops_its_containers() {
    let p = with_condition(running(), "DisruptionTarget", "TerminationByKubelet", "node shutdown");
    let view = PodView(&p);
    assert!(view.container_finished("1"));
    assert_eq!(view.execution_error(), "TerminationByKubelet: node shutdown");
    assert_eq!(view.container_result("1", "").unwrap().error_details, "TerminationByKubelet: node shutdown");
}

#[test]
fn disruption_error_joins_reason_and_message() {
    let p = with_condition(running(), "DisruptionTarget", "PreemptionByScheduler", "preempted");
    assert_eq!(PodView(&p).execution_error(), "PreemptionByScheduler: preempted");
    let p = with_condition(running(), "DisruptionTarget", "PreemptionByScheduler", "");
    assert_eq!(PodView(&p).execution_error(), "PreemptionByScheduler");
}

#[test]
fn deadline_exceeded_reports_the_configured_timeout() {
    let mut p = pod_phase(running(), "Failed");
    p.spec.get_or_insert_with(PodSpec::default).active_deadline_seconds = Some(600);
    let status = p.status.get_or_insert_with(PodStatus::default);
    status.reason = Some("DeadlineExceeded".into());
    status.message = Some("Pod was active on the node longer than the specified deadline".into());
    assert_eq!(PodView(&p).execution_error(), "Pod timed out after 600 seconds");
}

#[test]
fn node_name_falls_back_to_nomination() {
    let mut p = pod("exec-1", "exec-1-abc", ts(0));
    p.status.get_or_insert_with(PodStatus::default).nominated_node_name = Some("node-a".into());
    assert_eq!(PodView(&p).node_name(), Some("node-a"));

    let p = start_pod(p, "node-b", "10.1.0.4", ts(1));
    assert_eq!(PodView(&p).node_name(), Some("node-b"));
}

#[test]
fn start_falls_back_to_first_container() {
    let mut p = container_running(pod("exec-1", "exec-1-abc", ts(0)), "1", ts(4));
    assert_eq!(PodView(&p).start_timestamp(), Some(ts(4)));

    p.status.get_or_insert_with(PodStatus::default).start_time = Some(Time(ts(3)));
    assert_eq!(PodView(&p).start_timestamp(), Some(ts(3)));

    let p = container_terminated(pod("exec-1", "exec-1-abc", ts(0)), "1", 0, "Completed", "p,0", ts(5), ts(6));
    assert_eq!(PodView(&p).start_timestamp(), Some(ts(5)));
}
