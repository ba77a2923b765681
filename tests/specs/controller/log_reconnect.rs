// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A container log that ends while the container keeps running is reopened
//! right after the last line read.

use crate::prelude::*;
use serde_json::json;

#[tokio::test]
async fn eof_while_running_reopens_one_nanosecond_later() {
    let cluster = FakeCluster::new();
    cluster.jobs.apply(annotated_job(&steps(&["1"]), &one_container(&["1"])));
    let running = running_pod();
    cluster.pods.apply(running.clone());
    cluster.logs.push_lines("1", &[hint(ts(3), "1", HintName::Start, json!(null)), log_line(ts(4), "first half")]);
    cluster.logs.push_lines("1", &[log_line(ts(5), "second half"), hint(ts(6), "1", HintName::End, json!("passed"))]);
    let controller = connect(&cluster).await;

    let mut finished = false;
    let items = drive(controller.watch(fast()), |n| {
        if !finished && n.log.contains("second half") {
            finished = true;
            let done = container_terminated(running.clone(), "1", 0, "Completed", "p,0", ts(3), ts(7));
            cluster.pods.apply(pod_phase(done, "Succeeded"));
            cluster.jobs.apply(finish_job(annotated_job(&steps(&["1"]), &one_container(&["1"])), true, ts(8)));
        }
    })
    .await;

    let reopened = ts(4) + chrono::Duration::nanoseconds(1);
    let opens = cluster.logs.opens();
    assert!(opens.iter().any(|(c, since)| c == "1" && *since == Some(reopened)), "opens: {opens:?}");
    assert_eq!(log_count(&items, "first half"), 1);
    assert_eq!(log_count(&items, "second half"), 1);

    let result = last_result(&items);
    assert_eq!(result.steps["1"].status, StepStatus::Passed);
    assert_eq!(result.status, WorkflowStatus::Passed);
}
