// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A finished Job whose Pod update was missed still completes the stream.

use crate::prelude::*;

#[tokio::test]
async fn job_finished_while_pod_lags_still_converges() {
    let cluster = FakeCluster::new();
    let job = annotated_job(&steps(&["1"]), &one_container(&["1"]));
    cluster.jobs.apply(job.clone());
    let running = running_pod();
    cluster.pods.apply(running.clone());
    let controller = connect(&cluster).await;
    let rx = controller.watch(fast());

    let done = pod_phase(container_terminated(running, "1", 0, "Completed", "p,0", ts(3), ts(9)), "Succeeded");
    cluster.pods.apply_silently(done);
    cluster.jobs.apply(finish_job(job, true, ts(10)));

    let items = drive(rx, |_| {}).await;
    let result = last_result(&items);
    assert!(result.is_finished(), "stream ended without a final result: {result:?}");
    assert_eq!(result.status, WorkflowStatus::Passed);
    assert_eq!(result.steps["1"].status, StepStatus::Passed);
    assert_eq!(result.steps["1"].exit_code, 0);
}
