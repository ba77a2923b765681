// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow and step statuses.
//!
//! Step statuses travel through container termination messages as single
//! character codes (see [`StepStatus::code`]).

use serde::{Deserialize, Serialize};

/// Overall status of a test workflow execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    Queued,
    Running,
    Paused,
    Passed,
    Failed,
    Aborted,
    Canceled,
}

crate::simple_display! {
    WorkflowStatus {
        Queued => "queued",
        Running => "running",
        Paused => "paused",
        Passed => "passed",
        Failed => "failed",
        Aborted => "aborted",
        Canceled => "canceled",
    }
}

impl WorkflowStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Passed | Self::Failed | Self::Aborted | Self::Canceled)
    }

    /// Parse the value carried by a root `end` instruction.
    ///
    /// Unrecognized values yield `None`; an empty value means the workflow passed.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "" | "passed" => Some(Self::Passed),
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "paused" => Some(Self::Paused),
            "failed" | "timeout" => Some(Self::Failed),
            "aborted" | "skipped" => Some(Self::Aborted),
            "canceled" => Some(Self::Canceled),
            _ => None,
        }
    }
}

/// Status of a single step (or of the initialization phase).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Queued,
    Running,
    Paused,
    Passed,
    Failed,
    Timeout,
    Skipped,
    Aborted,
    Canceled,
}

crate::simple_display! {
    StepStatus {
        Queued => "queued",
        Running => "running",
        Paused => "paused",
        Passed => "passed",
        Failed => "failed",
        Timeout => "timeout",
        Skipped => "skipped",
        Aborted => "aborted",
        Canceled => "canceled",
    }
}

impl StepStatus {
    pub const ALL: [StepStatus; 9] = [
        Self::Queued,
        Self::Running,
        Self::Paused,
        Self::Passed,
        Self::Failed,
        Self::Timeout,
        Self::Skipped,
        Self::Aborted,
        Self::Canceled,
    ];

    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            Self::Passed | Self::Failed | Self::Timeout | Self::Skipped | Self::Aborted | Self::Canceled
        )
    }

    pub fn is_not_started(&self) -> bool {
        matches!(self, Self::Queued)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused)
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    /// Any outcome other than passed or skipped.
    pub fn is_any_error(&self) -> bool {
        matches!(self, Self::Failed | Self::Timeout | Self::Aborted | Self::Canceled)
    }

    /// Position in the forward-only lifecycle. Running and paused share a rank.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Running | Self::Paused => 1,
            _ => 2,
        }
    }

    /// Whether moving from `self` to `next` keeps the lifecycle monotonic.
    pub fn can_become(&self, next: StepStatus) -> bool {
        if self.is_finished() {
            return *self == next;
        }
        next.rank() >= self.rank()
    }

    /// Single character code used inside termination messages.
    pub fn code(&self) -> char {
        match self {
            Self::Queued => 'q',
            Self::Running => 'r',
            Self::Paused => 'u',
            Self::Passed => 'p',
            Self::Failed => 'f',
            Self::Timeout => 't',
            Self::Skipped => 's',
            Self::Aborted => 'a',
            Self::Canceled => 'c',
        }
    }

    /// Inverse of [`StepStatus::code`]; unknown codes are treated as aborted.
    pub fn from_code(code: &str) -> Self {
        match code {
            "q" => Self::Queued,
            "r" => Self::Running,
            "u" => Self::Paused,
            "p" => Self::Passed,
            "f" => Self::Failed,
            "t" => Self::Timeout,
            "s" => Self::Skipped,
            "c" => Self::Canceled,
            _ => Self::Aborted,
        }
    }

    /// Parse the value carried by an `end` instruction.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.to_string() == value)
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
