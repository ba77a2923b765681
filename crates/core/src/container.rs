// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step results reported by a terminated container.
//!
//! Several logical steps can share one container, so the runner writes one
//! `<code>,<exitCode>` pair per ended step into the termination message,
//! separated by `/`. Decoding is lenient: a malformed segment becomes an
//! aborted step with exit code -1 instead of an error.

use crate::status::StepStatus;

/// Reason Kubernetes sets on a container that exited normally.
pub const COMPLETED_REASON: &str = "Completed";

const GENERIC_ERROR: &str = "Error";
const FATAL_ERROR: &str = "Fatal Error";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerStepStatus {
    pub status: StepStatus,
    pub exit_code: i64,
}

impl ContainerStepStatus {
    pub fn new(status: StepStatus, exit_code: i64) -> Self {
        Self { status, exit_code }
    }

    fn malformed() -> Self {
        Self::new(StepStatus::Aborted, -1)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerResult {
    pub statuses: Vec<ContainerStepStatus>,
    pub error_details: String,
}

impl ContainerResult {
    /// Result for a container that never terminated although its pod is gone.
    pub fn unknown(details: impl Into<String>) -> Self {
        Self { statuses: Vec::new(), error_details: details.into() }
    }

    /// Build the result of a terminated container.
    ///
    /// A reason other than `Completed` (e.g. `OOMKilled`, or a kill after
    /// the process already ended) is kept as error details. Empty or generic
    /// details are replaced by `fallback`.
    pub fn from_termination(reason: &str, message: &str, fallback: &str) -> Self {
        let mut error_details = if reason == COMPLETED_REASON { String::new() } else { reason.to_string() };
        if (error_details.is_empty() || error_details == GENERIC_ERROR) && !fallback.is_empty() {
            error_details = fallback.to_string();
        }
        if error_details == GENERIC_ERROR {
            error_details = FATAL_ERROR.to_string();
        }
        Self { statuses: decode_message(message), error_details }
    }

    pub fn status_at(&self, index: usize) -> Option<ContainerStepStatus> {
        self.statuses.get(index).copied()
    }
}

fn decode_segment(segment: &str) -> Option<ContainerStepStatus> {
    let (code, exit_code) = segment.split_once(',')?;
    if code.chars().count() != 1 || code == "," {
        return None;
    }
    let valid_digits = !exit_code.is_empty()
        && exit_code.bytes().all(|b| b.is_ascii_digit())
        && (exit_code == "0" || !exit_code.starts_with('0'));
    if !valid_digits {
        return None;
    }
    let exit_code = exit_code.parse::<i64>().ok()?;
    Some(ContainerStepStatus::new(StepStatus::from_code(code), exit_code))
}

/// Decode a termination message into per-step statuses.
pub fn decode_message(message: &str) -> Vec<ContainerStepStatus> {
    let message = message.trim_end_matches('\n');
    if message.is_empty() {
        return Vec::new();
    }
    message
        .split('/')
        .map(|segment| decode_segment(segment).unwrap_or_else(ContainerStepStatus::malformed))
        .collect()
}

/// Encode per-step statuses into a termination message.
pub fn encode_message(statuses: &[ContainerStepStatus]) -> String {
    statuses
        .iter()
        .map(|s| format!("{},{}", s.status.code(), s.exit_code))
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
#[path = "container_tests.rs"]
mod tests;
