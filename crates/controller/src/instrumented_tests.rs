// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::state::ExecutionStateOptions;
use crate::test_support::{
    container_running, container_terminated, event, finish_job, job, layout_annotations, log_line, pod, pod_phase,
    start_pod, with_annotations, FakeCluster, LogSession,
};
use crate::watcher::WatchOptions;
use serde_json::json;
use twc_core::instruction::format_hint;
use twc_core::test_support::ts;
use twc_core::{Action, ActionGroups, FakeClock, Instruction, Signature, Timestamp};

fn signature() -> Vec<Signature> {
    vec![Signature::step("1", "Build"), Signature::step("2", "Test")]
}

fn actions() -> ActionGroups {
    ActionGroups(vec![vec![
        Action::start(INIT_REF),
        Action::end(INIT_REF),
        Action::start("1"),
        Action::end("1"),
        Action::start("2"),
        Action::end("2"),
    ]])
}

fn hint(at: Timestamp, step_ref: &str, name: HintName, value: serde_json::Value) -> String {
    log_line(at, &format_hint(&Instruction::hint(step_ref, name, value)))
}

fn annotated_job() -> k8s_openapi::api::batch::v1::Job {
    with_annotations(job("exec-1", ts(0)), layout_annotations(&signature(), &actions()))
}

fn watch(cluster: &FakeCluster, options: StreamOptions, cancel: &CancellationToken) -> mpsc::Receiver<Notification> {
    let state = ExecutionStateOptions { resource_id: "exec-1".into(), ..Default::default() };
    let watch = WatchOptions::default().retry(Duration::from_millis(10)).list_timeout(Duration::from_secs(1));
    let watcher = ExecutionWatcher::spawn(&cluster.sources(), state, watch, cancel);
    let logs: Arc<dyn LogSource> = cluster.logs.clone();
    watch_instrumented(watcher, logs, TestWorkflowResult::default(), options, FakeClock::new(ts(100)), cancel)
}

async fn collect(mut rx: mpsc::Receiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while let Ok(Some(item)) = tokio::time::timeout_at(deadline, rx.recv()).await {
        out.push(item);
    }
    out
}

fn last_result(items: &[Notification]) -> TestWorkflowResult {
    items.iter().rev().find_map(|n| n.result.clone()).unwrap()
}

fn log_of(items: &[Notification], needle: &str) -> Option<Notification> {
    items.iter().find(|n| n.log.contains(needle)).cloned()
}

fn fast() -> StreamOptions {
    StreamOptions::default().fallback_poll(Duration::from_millis(200))
}

#[tokio::test]
async fn completed_execution_streams_logs_and_final_result() {
    let cluster = FakeCluster::new();
    cluster.jobs.apply(finish_job(annotated_job(), false, ts(9)));
    cluster.events.apply(event("e1", "Job", "exec-1", None, "SuccessfulCreate", "Created pod: exec-1-abc", ts(1)));
    cluster.events.apply(event("e2", "Job", "exec-1", None, "BackoffLimitExceeded", "Job has reached the limit", ts(9)));
    let started = start_pod(pod("exec-1", "exec-1-abc", ts(1)), "node-a", "10.0.0.1", ts(2));
    let done = container_terminated(started, "1", 1, "Error", "p,0/p,0/f,1", ts(3), ts(8));
    cluster.pods.apply(pod_phase(done, "Failed"));
    cluster.logs.push_lines(
        "1",
        &[
            hint(ts(3), INIT_REF, HintName::Start, json!(null)),
            hint(ts(3), INIT_REF, HintName::End, json!("passed")),
            hint(ts(3), "1", HintName::Start, json!(null)),
            log_line(ts(4), "compiling"),
            hint(ts(5), "1", HintName::End, json!("passed")),
            hint(ts(5), "2", HintName::Start, json!(null)),
            log_line(ts(6), "running tests"),
            hint(ts(7), "2", HintName::Execution, json!({"exitCode": 1, "details": "1 test failed"})),
            hint(ts(7), "2", HintName::End, json!("failed")),
        ],
    );

    let cancel = CancellationToken::new();
    let items = collect(watch(&cluster, fast(), &cancel)).await;

    assert_eq!(log_of(&items, "compiling").map(|n| n.step_ref), Some("1".to_string()));
    assert_eq!(log_of(&items, "running tests").map(|n| n.step_ref), Some("2".to_string()));
    assert!(log_of(&items, "(SuccessfulCreate)").is_some_and(|n| n.temporary));
    assert!(log_of(&items, "BackoffLimitExceeded").is_none());

    let result = last_result(&items);
    assert!(result.is_finished());
    assert_eq!(result.status, WorkflowStatus::Failed);
    assert_eq!(result.steps["1"].status, StepStatus::Passed);
    assert_eq!(result.steps["2"].status, StepStatus::Failed);
    assert_eq!(result.steps["2"].exit_code, 1);
    assert_eq!(result.steps["2"].error_message, "1 test failed");
    assert_eq!(result.initialization.status, StepStatus::Passed);
}

#[tokio::test]
async fn failed_job_without_pod_ends_the_stream() {
    let cluster = FakeCluster::new();
    cluster.jobs.apply(finish_job(annotated_job(), false, ts(5)));
    cluster.events.apply(event("e1", "Job", "exec-1", None, "BackoffLimitExceeded", "Job has reached the limit", ts(5)));

    let cancel = CancellationToken::new();
    let items = collect(watch(&cluster, fast(), &cancel)).await;

    assert!(log_of(&items, "BackoffLimitExceeded").is_none());
    assert!(cluster.logs.opens().is_empty());
    let result = last_result(&items);
    assert!(result.is_finished());
    assert!(matches!(result.status, WorkflowStatus::Aborted | WorkflowStatus::Failed));
    assert!(result.steps.values().all(|s| s.is_finished()));
}

#[tokio::test]
async fn disabled_follow_reads_available_logs_without_ending() {
    let cluster = FakeCluster::new();
    cluster.jobs.apply(annotated_job());
    let running = container_running(start_pod(pod("exec-1", "exec-1-abc", ts(1)), "node-a", "10.0.0.1", ts(2)), "1", ts(3));
    cluster.pods.apply(running);
    cluster.logs.push_lines(
        "1",
        &[hint(ts(3), "1", HintName::Start, json!(null)), log_line(ts(4), "still going")],
    );

    let cancel = CancellationToken::new();
    let items = collect(watch(&cluster, fast().disable_follow(true), &cancel)).await;

    assert_eq!(cluster.logs.follows(), vec![false]);
    assert!(log_of(&items, "still going").is_some());
    let result = last_result(&items);
    assert!(!result.is_finished());
    assert_eq!(result.steps["1"].status, StepStatus::Running);
    cancel.cancel();
}

#[tokio::test]
async fn cancel_closes_the_stream_without_finalizing() {
    let cluster = FakeCluster::new();
    cluster.jobs.apply(annotated_job());
    let running = container_running(start_pod(pod("exec-1", "exec-1-abc", ts(1)), "node-a", "10.0.0.1", ts(2)), "1", ts(3));
    cluster.pods.apply(running);
    let started = format!("{}\n", hint(ts(3), "1", HintName::Start, json!(null)));
    cluster.logs.push("1", LogSession::Stall(started.into_bytes()));

    let cancel = CancellationToken::new();
    let mut rx = watch(&cluster, fast(), &cancel);
    let mut seen = Vec::new();
    let running = |item: &Notification| {
        item.result.as_ref().is_some_and(|r| r.steps.get("1").is_some_and(|s| s.status == StepStatus::Running))
    };
    let reached = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(item) = rx.recv().await {
            let done = running(&item);
            seen.push(item);
            if done {
                return true;
            }
        }
        false
    })
    .await;
    assert_eq!(reached, Ok(true), "step never reported running");
    cancel.cancel();
    seen.extend(collect(rx).await);

    assert!(!last_result(&seen).is_finished());
}
