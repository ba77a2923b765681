// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step results read from a container's termination message.

use crate::prelude::*;
use twc_core::container::{decode_message, ContainerStepStatus};

#[test]
fn passed_then_killed_decodes_to_two_steps() {
    similar_asserts::assert_eq!(
        decode_message("p,0/f,137"),
        vec![ContainerStepStatus::new(StepStatus::Passed, 0), ContainerStepStatus::new(StepStatus::Failed, 137)]
    );
}

#[tokio::test]
async fn termination_message_sets_step_results_without_logs() {
    let cluster = FakeCluster::new();
    let job = annotated_job(&steps(&["1", "2"]), &one_container(&["1", "2"]));
    cluster.jobs.apply(finish_job(job, false, ts(10)));
    let pod = start_pod(pod(ID, POD, ts(1)), "node-a", "10.0.0.7", ts(2));
    let pod = container_terminated(pod, "1", 137, "Error", "p,0/f,137", ts(3), ts(9));
    cluster.pods.apply(pod_phase(pod, "Failed"));
    let controller = connect(&cluster).await;

    let result = last_result(&drive(controller.watch(fast()), |_| {}).await);

    assert_eq!(result.steps["1"].status, StepStatus::Passed);
    assert_eq!(result.steps["1"].exit_code, 0);
    assert_eq!(result.steps["2"].status, StepStatus::Failed);
    assert_eq!(result.steps["2"].exit_code, 137);
    assert_eq!(result.status, WorkflowStatus::Failed);
}
