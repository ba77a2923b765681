// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{
    container_running, container_terminated, event, finish_job, job, pod, pod_phase, start_pod, FakeCluster,
};
use twc_core::test_support::ts;

fn options() -> WatchOptions {
    WatchOptions::default().retry(Duration::from_millis(10)).list_timeout(Duration::from_secs(1))
}

fn spawn(cluster: &FakeCluster, cancel: &CancellationToken) -> ExecutionWatcher {
    let state = ExecutionStateOptions { resource_id: "exec-1".into(), ..Default::default() };
    ExecutionWatcher::spawn(&cluster.sources(), state, options(), cancel)
}

async fn wait_until(watcher: &ExecutionWatcher, check: impl Fn(&ExecutionState) -> bool) -> ExecutionState {
    let mut updates = watcher.updated();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let state = watcher.state();
        if check(&state) {
            return state;
        }
        let next = tokio::time::timeout_at(deadline, updates.next()).await.expect("condition not reached in time");
        if !next {
            let state = watcher.state();
            assert!(check(&state), "watcher finished before condition was met");
            return state;
        }
    }
}

#[tokio::test]
async fn first_commit_contains_listed_objects() {
    let cluster = FakeCluster::new();
    cluster.jobs.apply(job("exec-1", ts(0)));
    cluster.events.apply(event("e1", "Job", "exec-1", None, "SuccessfulCreate", "Created pod: exec-1-abc", ts(1)));
    let cancel = CancellationToken::new();
    let watcher = spawn(&cluster, &cancel);

    tokio::time::timeout(Duration::from_secs(2), watcher.wait_started()).await.unwrap();
    let state = watcher.state();
    assert!(state.job_exists());
    assert_eq!(state.pod_name(), "exec-1-abc");
    assert!(!state.completed());
    cancel.cancel();
}

#[tokio::test]
async fn pod_events_follow_once_pod_name_is_known() {
    let cluster = FakeCluster::new();
    cluster.jobs.apply(job("exec-1", ts(0)));
    cluster.events.apply(event("p1", "Pod", "exec-1-abc", None, "Scheduled", "Successfully assigned default/exec-1-abc to node-a", ts(2)));
    let cancel = CancellationToken::new();
    let watcher = spawn(&cluster, &cancel);
    watcher.wait_started().await;
    assert!(watcher.state().pod_events().list().is_empty());

    cluster.events.apply(event("e1", "Job", "exec-1", None, "SuccessfulCreate", "Created pod: exec-1-abc", ts(1)));
    let state = wait_until(&watcher, |s| !s.pod_events().list().is_empty()).await;
    assert_eq!(state.pod_node_name(), "node-a");
    cancel.cancel();
}

#[tokio::test]
async fn job_finished_while_pod_lags_converges_to_completed() {
    let cluster = FakeCluster::new();
    cluster.jobs.apply(job("exec-1", ts(0)));
    let running = container_running(start_pod(pod("exec-1", "exec-1-abc", ts(1)), "node-a", "10.0.0.1", ts(2)), "1", ts(3));
    cluster.pods.apply(running.clone());
    let cancel = CancellationToken::new();
    let watcher = spawn(&cluster, &cancel);
    watcher.wait_started().await;

    let done = pod_phase(container_terminated(running, "1", 0, "Completed", "p,0", ts(3), ts(9)), "Succeeded");
    cluster.pods.apply_silently(done);
    cluster.jobs.apply(finish_job(job("exec-1", ts(0)), true, ts(10)));

    let state = wait_until(&watcher, |s| s.completed() && s.pod_finished()).await;
    assert!(state.container_finished("1"));
    assert_eq!(state.container_result("1").map(|r| r.statuses.len()), Some(1));
}

#[tokio::test]
async fn updates_close_after_completion() {
    let cluster = FakeCluster::new();
    cluster.jobs.apply(finish_job(job("exec-1", ts(0)), false, ts(5)));
    let cancel = CancellationToken::new();
    let watcher = spawn(&cluster, &cancel);
    let mut updates = watcher.updated();
    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        while updates.next().await {}
    })
    .await;
    assert!(closed.is_ok());
    assert!(watcher.is_done());
    assert!(watcher.state().completed());
    assert!(!watcher.updated().next().await);
}

#[tokio::test]
async fn backoff_limit_event_without_pod_completes() {
    let cluster = FakeCluster::new();
    cluster.events.apply(event("e1", "Job", "exec-1", None, "BackoffLimitExceeded", "Job has reached the specified backoff limit", ts(4)));
    let cancel = CancellationToken::new();
    let watcher = spawn(&cluster, &cancel);
    let state = wait_until(&watcher, |s| s.completed()).await;
    assert!(!state.pod_exists());
    assert_eq!(state.completion_timestamp(), Some(ts(4)));
    assert!(state.execution_error().starts_with("BackoffLimitExceeded"));
}

#[tokio::test]
async fn refresh_picks_up_silent_changes() {
    let cluster = FakeCluster::new();
    cluster.jobs.apply(job("exec-1", ts(0)));
    cluster.pods.apply(pod("exec-1", "exec-1-abc", ts(1)));
    let cancel = CancellationToken::new();
    let watcher = spawn(&cluster, &cancel);
    watcher.wait_started().await;

    cluster.pods.apply_silently(start_pod(pod("exec-1", "exec-1-abc", ts(1)), "node-b", "10.0.0.2", ts(2)));
    watcher.refresh(Duration::from_secs(1)).await;
    assert_eq!(watcher.state().pod_ip(), "10.0.0.2");
    assert_eq!(watcher.latest_pod().and_then(|p| p.spec).and_then(|s| s.node_name).as_deref(), Some("node-b"));
    cancel.cancel();
}

#[tokio::test]
async fn stop_closes_updates() {
    let cluster = FakeCluster::new();
    cluster.jobs.apply(job("exec-1", ts(0)));
    let cancel = CancellationToken::new();
    let watcher = spawn(&cluster, &cancel);
    watcher.wait_started().await;
    let mut updates = watcher.updated();
    watcher.stop();
    let drained = tokio::time::timeout(Duration::from_secs(2), async { while updates.next().await {} }).await;
    assert!(drained.is_ok());
}
