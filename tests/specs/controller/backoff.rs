// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A Job that gives up before any Pod exists still ends with a result.

use crate::prelude::*;

#[tokio::test]
async fn backoff_limit_without_pod_ends_failed_or_aborted() {
    let cluster = FakeCluster::new();
    let job = annotated_job(&steps(&["1"]), &one_container(&["1"]));
    cluster.jobs.apply(finish_job(job, false, ts(4)));
    cluster.events.apply(event(
        "e1",
        "Job",
        ID,
        None,
        "BackoffLimitExceeded",
        "Job has reached the specified backoff limit",
        ts(4),
    ));
    let controller = connect(&cluster).await;

    let items = drive(controller.watch(fast()), |_| {}).await;
    let result = last_result(&items);

    assert!(
        matches!(result.status, WorkflowStatus::Failed | WorkflowStatus::Aborted),
        "unexpected status {:?}",
        result.status
    );
    assert!(result.is_finished());
    assert_ne!(result.steps["1"].status, StepStatus::Queued);
    assert_eq!(log_count(&items, "BackoffLimitExceeded"), 0);
    assert!(!controller.has_pod());
}
