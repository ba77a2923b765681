// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Custom error type that carries a process exit code.
//!
//! Commands return `ExitError` instead of calling `std::process::exit()`
//! directly, allowing `main()` to handle process termination.

use std::fmt;
use twc_controller::ControllerError;
use twc_core::WorkflowStatus;

/// The execution finished without passing.
pub const EXECUTION_FAILED: i32 = 1;
/// Generic failure talking to the cluster or the execution.
pub const CONTROLLER_FAILED: i32 = 2;
/// No resources of the execution were found.
pub const NOT_FOUND: i32 = 3;
/// The execution pod is not scheduled yet.
pub const NOT_READY: i32 = 4;

#[derive(Debug)]
pub struct ExitError {
    pub code: i32,
    pub message: String,
}

impl ExitError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    /// Exit status for a finished execution, `None` when it passed or is
    /// still in progress.
    pub fn for_status(status: WorkflowStatus) -> Option<Self> {
        match status {
            WorkflowStatus::Failed | WorkflowStatus::Aborted | WorkflowStatus::Canceled => {
                Some(Self::new(EXECUTION_FAILED, format!("execution {status}")))
            }
            _ => None,
        }
    }
}

impl From<ControllerError> for ExitError {
    fn from(err: ControllerError) -> Self {
        let code = match err {
            ControllerError::JobAborted | ControllerError::JobTimeout => NOT_FOUND,
            ControllerError::NoIpAssigned | ControllerError::NoNodeAssigned => NOT_READY,
            _ => CONTROLLER_FAILED,
        };
        Self::new(code, err.to_string())
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ExitError {}

#[cfg(test)]
#[path = "exit_error_tests.rs"]
mod tests;
