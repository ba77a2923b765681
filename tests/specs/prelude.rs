// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for specs: a `twc` runner and a fake cluster harness.

#![allow(dead_code)]

use std::time::Duration;

pub use tokio_util::sync::CancellationToken;
pub use twc_controller::test_support::*;
pub use twc_controller::{Controller, ControllerOptions, StreamOptions, WatchOptions};
pub use twc_core::instruction::format_hint;
pub use twc_core::test_support::ts;
pub use twc_core::{
    Action, ActionGroups, HintName, Instruction, Notification, Signature, StepStatus, TestWorkflowResult, Timestamp,
    WorkflowStatus,
};

// ── CLI ────────────────────────────────────────────────────────────────

/// Run the `twc` binary with color and file logging off.
pub fn cli() -> Cli {
    let mut cmd = assert_cmd::Command::cargo_bin("twc").expect("twc binary is built");
    cmd.env("NO_COLOR", "1").env_remove("COLOR").env_remove("TWC_LOG_DIR");
    Cli { cmd }
}

pub struct Cli {
    cmd: assert_cmd::Command,
}

impl Cli {
    pub fn args(mut self, args: &[&str]) -> Self {
        self.cmd.args(args);
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.cmd.env(key, value);
        self
    }

    pub fn passes(mut self) -> RunOutput {
        let output = RunOutput::from(self.cmd.output().expect("twc runs"));
        assert_eq!(output.code, Some(0), "expected success\nstdout:\n{}\nstderr:\n{}", output.stdout, output.stderr);
        output
    }

    pub fn fails(mut self) -> RunOutput {
        let output = RunOutput::from(self.cmd.output().expect("twc runs"));
        assert_ne!(output.code, Some(0), "expected failure\nstdout:\n{}", output.stdout);
        output
    }
}

pub struct RunOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl From<std::process::Output> for RunOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

impl RunOutput {
    pub fn stdout_has(self, needle: &str) -> Self {
        assert!(self.stdout.contains(needle), "stdout lacks {needle:?}:\n{}", self.stdout);
        self
    }

    pub fn stderr_has(self, needle: &str) -> Self {
        assert!(self.stderr.contains(needle), "stderr lacks {needle:?}:\n{}", self.stderr);
        self
    }
}

// ── Fake cluster ───────────────────────────────────────────────────────

pub const ID: &str = "exec-1";
pub const POD: &str = "exec-1-abc";

/// Job for execution [`ID`] annotated with its step tree and container layout.
pub fn annotated_job(signature: &[Signature], actions: &ActionGroups) -> k8s_openapi::api::batch::v1::Job {
    with_annotations(job(ID, ts(0)), layout_annotations(signature, actions))
}

/// One container running the given steps in order.
pub fn one_container(refs: &[&str]) -> ActionGroups {
    ActionGroups(vec![refs.iter().flat_map(|r| [Action::start(*r), Action::end(*r)]).collect()])
}

pub fn steps(refs: &[&str]) -> Vec<Signature> {
    refs.iter().map(|r| Signature::step(*r, format!("step {r}"))).collect()
}

/// Pod of [`ID`] scheduled on node-a, running container "1".
pub fn running_pod() -> k8s_openapi::api::core::v1::Pod {
    container_running(start_pod(pod(ID, POD, ts(1)), "node-a", "10.0.0.7", ts(2)), "1", ts(3))
}

pub fn hint(at: Timestamp, step_ref: &str, name: HintName, value: serde_json::Value) -> String {
    log_line(at, &format_hint(&Instruction::hint(step_ref, name, value)))
}

pub async fn connect(cluster: &FakeCluster) -> Controller {
    let watch = WatchOptions::default().retry(Duration::from_millis(10)).list_timeout(Duration::from_secs(1));
    let cancel = CancellationToken::new();
    Controller::new(cluster.sources(), ID, ControllerOptions::default().watch(watch), &cancel)
        .await
        .expect("controller connects")
}

pub fn fast() -> StreamOptions {
    StreamOptions::default().fallback_poll(Duration::from_millis(200))
}

/// Drain a notification stream, calling `each` on every item, until it
/// closes or 15 seconds pass.
pub async fn drive(
    mut rx: tokio::sync::mpsc::Receiver<Notification>,
    mut each: impl FnMut(&Notification),
) -> Vec<Notification> {
    let mut items = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(15);
    while let Ok(Some(item)) = tokio::time::timeout_at(deadline, rx.recv()).await {
        each(&item);
        items.push(item);
    }
    items
}

pub fn last_result(items: &[Notification]) -> TestWorkflowResult {
    items.iter().rev().find_map(|n| n.result.clone()).expect("stream carried a result")
}

/// How many log notifications contain `needle`.
pub fn log_count(items: &[Notification], needle: &str) -> usize {
    items.iter().filter(|n| n.log.contains(needle)).count()
}
