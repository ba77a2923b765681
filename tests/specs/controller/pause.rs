// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pause and resume instructions replayed by a reconnecting log stream are
//! recorded once.

use crate::prelude::*;
use serde_json::json;

#[tokio::test]
async fn replayed_pause_and_resume_record_one_interval() {
    let cluster = FakeCluster::new();
    let job = annotated_job(&steps(&["1"]), &one_container(&["1"]));
    cluster.jobs.apply(job.clone());
    let running = running_pod();
    cluster.pods.apply(running.clone());

    let pause = || hint(ts(4), "1", HintName::Pause, json!(ts(4).to_rfc3339()));
    let resume = || hint(ts(6), "1", HintName::Resume, json!(ts(6).to_rfc3339()));
    cluster.logs.push_lines("1", &[hint(ts(3), "1", HintName::Start, json!(null)), pause(), resume()]);
    cluster.logs.push_lines("1", &[pause(), resume(), hint(ts(8), "1", HintName::End, json!("passed"))]);
    let controller = connect(&cluster).await;

    let mut finished = false;
    let items = drive(controller.watch(fast()), |n| {
        let passed = n.result.as_ref().is_some_and(|r| r.steps.get("1").is_some_and(|s| s.status == StepStatus::Passed));
        if !finished && passed {
            finished = true;
            let done = container_terminated(running.clone(), "1", 0, "Completed", "p,0", ts(3), ts(9));
            cluster.pods.apply(pod_phase(done, "Succeeded"));
            cluster.jobs.apply(finish_job(job.clone(), true, ts(10)));
        }
    })
    .await;

    assert!(cluster.logs.opens().len() >= 2, "log stream was not reopened");
    let result = last_result(&items);
    assert_eq!(result.pauses.len(), 1, "pauses: {:?}", result.pauses);
    assert_eq!(result.pauses[0].step_ref, "1");
    assert_eq!(result.pauses[0].paused_at, ts(4));
    assert_eq!(result.pauses[0].resumed_at, Some(ts(6)));
    assert_eq!(result.status, WorkflowStatus::Passed);
}
