// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Records produced by the execution controller.

use crate::instruction::Instruction;
use crate::result::TestWorkflowResult;
use crate::status::WorkflowStatus;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

/// One entry of the ordered notification stream.
///
/// Exactly one of `result`, `log`, `output` or `error` is meaningful.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub timestamp: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TestWorkflowResult>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub log: String,
    #[serde(rename = "ref", default, skip_serializing_if = "String::is_empty")]
    pub step_ref: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Instruction>,
    /// Log entries that may be hidden once the execution moves on (e.g. scheduling events).
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub temporary: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Notification {
    fn empty(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            result: None,
            log: String::new(),
            step_ref: String::new(),
            output: None,
            temporary: false,
            error: None,
        }
    }

    pub fn result(timestamp: Timestamp, result: TestWorkflowResult) -> Self {
        Self { result: Some(result), ..Self::empty(timestamp) }
    }

    pub fn log(timestamp: Timestamp, step_ref: impl Into<String>, log: impl Into<String>, temporary: bool) -> Self {
        Self { log: log.into(), step_ref: step_ref.into(), temporary, ..Self::empty(timestamp) }
    }

    pub fn output(timestamp: Timestamp, step_ref: impl Into<String>, output: Instruction) -> Self {
        Self { output: Some(output), step_ref: step_ref.into(), ..Self::empty(timestamp) }
    }

    pub fn error(timestamp: Timestamp, error: impl Into<String>) -> Self {
        Self { error: Some(error.into()), ..Self::empty(timestamp) }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Reduced view for consumers that only track progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightweightNotification {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub node_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pod_ip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<WorkflowStatus>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TestWorkflowResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LightweightNotification {
    /// Whether the fields consumers react to differ from `other`.
    pub fn differs_from(&self, other: &LightweightNotification) -> bool {
        self.node_name != other.node_name
            || self.pod_ip != other.pod_ip
            || self.status != other.status
            || self.current != other.current
    }
}
