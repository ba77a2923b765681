// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI help output specs
//!
//! Verify help text displays for all commands.

use crate::prelude::*;

#[test]
fn twc_help_lists_commands() {
    cli()
        .args(&["--help"])
        .passes()
        .stdout_has("Usage:")
        .stdout_has("watch")
        .stdout_has("logs")
        .stdout_has("pause")
        .stdout_has("resume")
        .stdout_has("abort")
        .stdout_has("cleanup");
}

#[test]
fn twc_no_args_shows_usage_and_fails() {
    cli().fails().stderr_has("Usage:");
}

#[test]
fn twc_watch_help_shows_flags() {
    cli()
        .args(&["watch", "--help"])
        .passes()
        .stdout_has("--lightweight")
        .stdout_has("--no-follow")
        .stdout_has("--namespace");
}

#[test]
fn twc_logs_help_shows_follow() {
    cli().args(&["logs", "--help"]).passes().stdout_has("--follow");
}

#[test]
fn twc_pause_requires_an_execution_id() {
    cli().args(&["pause"]).fails().stderr_has("<ID>");
}

#[test]
fn twc_version_shows_version() {
    cli().args(&["--version"]).passes().stdout_has(env!("CARGO_PKG_VERSION"));
}
