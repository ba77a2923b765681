// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Closed watch streams resume without losing or repeating events.

use crate::prelude::*;

#[tokio::test]
async fn closed_watches_resume_without_redelivery() {
    let cluster = FakeCluster::new();
    let job = annotated_job(&steps(&["1"]), &one_container(&["1"]));
    cluster.jobs.apply(job.clone());
    cluster.events.apply(event("e1", "Job", ID, None, "SuccessfulCreate", "Created pod: exec-1-abc", ts(1)));
    let controller = connect(&cluster).await;

    let mut stage = 0;
    let items = drive(controller.watch(fast()), |n| {
        if stage == 0 && n.log.contains("Created pod") {
            stage = 1;
            cluster.events.close_watches();
            cluster.jobs.close_watches();
            cluster.events.apply(event("e2", "Job", ID, None, "Suspended", "Job suspended", ts(2)));
        } else if stage == 1 && n.log.contains("Job suspended") {
            stage = 2;
            cluster.jobs.apply(finish_job(job.clone(), false, ts(3)));
        }
    })
    .await;

    assert_eq!(stage, 2, "events after the closure were lost");
    assert_eq!(log_count(&items, "Created pod"), 1);
    assert_eq!(log_count(&items, "Job suspended"), 1);
    assert!(cluster.events.watch_versions().len() >= 2);
    assert!(last_result(&items).is_finished());
}
