// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canonical result of a test workflow execution.

mod heal;

use crate::signature::{self, Signature, INIT_REF};
use crate::status::{StepStatus, WorkflowStatus};
use crate::time::{latest, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    #[serde(default)]
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_message: String,
    #[serde(default)]
    pub exit_code: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queued_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<Timestamp>,
}

impl StepResult {
    pub fn queued() -> Self {
        Self::default()
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_finished()
    }

    pub fn is_not_started(&self) -> bool {
        self.status.is_not_started()
    }

    /// Move to `next` unless that would regress the lifecycle.
    /// Returns whether the status changed.
    pub fn advance(&mut self, next: StepStatus) -> bool {
        if self.status == next || !self.status.can_become(next) {
            return false;
        }
        self.status = next;
        true
    }

    /// Latest timestamp known for this step.
    pub fn latest_timestamp(&self) -> Option<Timestamp> {
        latest([self.queued_at, self.started_at, self.finished_at])
    }
}

/// Interval during which a step was paused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pause {
    #[serde(rename = "ref")]
    pub step_ref: String,
    pub paused_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resumed_at: Option<Timestamp>,
}

impl Pause {
    /// Whether `t` falls inside this pause (open pauses extend forever).
    pub fn covers(&self, t: Timestamp) -> bool {
        self.paused_at <= t && self.resumed_at.map_or(true, |r| r >= t)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestWorkflowResult {
    #[serde(default)]
    pub status: WorkflowStatus,
    #[serde(default)]
    pub predicted_status: WorkflowStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queued_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub duration: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub total_duration: String,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub paused_ms: u64,
    #[serde(default)]
    pub total_duration_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pauses: Vec<Pause>,
    #[serde(default)]
    pub initialization: StepResult,
    #[serde(default)]
    pub steps: BTreeMap<String, StepResult>,
}

impl TestWorkflowResult {
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some() && self.status.is_finished()
    }

    pub fn is_known_step(&self, step_ref: &str) -> bool {
        step_ref == INIT_REF || self.steps.contains_key(step_ref)
    }

    /// Step by ref; `init` addresses the initialization phase.
    pub fn step(&self, step_ref: &str) -> Option<&StepResult> {
        if step_ref == INIT_REF {
            return Some(&self.initialization);
        }
        self.steps.get(step_ref)
    }

    pub fn step_mut(&mut self, step_ref: &str) -> Option<&mut StepResult> {
        if step_ref == INIT_REF {
            return Some(&mut self.initialization);
        }
        self.steps.get_mut(step_ref)
    }

    pub fn has_pause_at(&self, step_ref: &str, t: Timestamp) -> bool {
        self.pauses.iter().any(|p| p.step_ref == step_ref && p.covers(t))
    }

    pub fn has_unfinished_pause(&self, step_ref: &str) -> bool {
        self.pauses.iter().any(|p| p.step_ref == step_ref && p.resumed_at.is_none())
    }

    pub fn is_any_step_aborted(&self) -> bool {
        self.initialization.status.is_any_error() || self.steps.values().any(|s| s.status.is_aborted())
    }

    pub fn is_any_step_canceled(&self) -> bool {
        self.initialization.status.is_any_error() || self.steps.values().any(|s| s.status.is_canceled())
    }

    pub fn is_any_step_paused(&self) -> bool {
        if self.initialization.status.is_any_error() {
            return false;
        }
        self.initialization.status.is_paused() || self.steps.values().any(|s| s.status.is_paused())
    }

    pub fn are_all_steps_finished(&self) -> bool {
        self.steps.values().all(StepResult::is_finished)
    }

    /// Latest timestamp anywhere in the result, used to stamp notifications.
    pub fn latest_timestamp(&self) -> Option<Timestamp> {
        let own = latest([self.queued_at, self.started_at, self.finished_at]);
        let steps = self.steps.values().map(StepResult::latest_timestamp);
        latest([own, self.initialization.latest_timestamp()].into_iter().chain(steps))
    }

    /// Latest known timestamp excluding the overall finish time.
    pub(crate) fn approx_current_timestamp(&self) -> Option<Timestamp> {
        let own = latest([self.queued_at, self.started_at]);
        let steps = self.steps.values().map(StepResult::latest_timestamp);
        latest([own, self.initialization.latest_timestamp()].into_iter().chain(steps))
    }

    /// First leaf step that is queued but not finished while the workflow runs.
    pub fn current(&self, signature: &[Signature]) -> Option<String> {
        if self.status != WorkflowStatus::Running || self.initialization.finished_at.is_none() {
            return None;
        }
        let mut current = None;
        signature::walk_post_order(signature, &mut |s| {
            if current.is_some() || s.is_group() {
                return;
            }
            if let Some(step) = self.steps.get(&s.step_ref) {
                if step.queued_at.is_some() && step.finished_at.is_none() {
                    current = Some(s.step_ref.clone());
                }
            }
        });
        current
    }

    /// Mark the execution as failed before it could run.
    pub fn fatal(&mut self, error: &str, aborted: bool, ts: Timestamp) {
        self.initialization.error_message = error.to_string();
        self.predicted_status = WorkflowStatus::Failed;
        self.status = if aborted { WorkflowStatus::Aborted } else { WorkflowStatus::Failed };
        self.queued_at.get_or_insert(ts);
        self.started_at.get_or_insert(ts);
        let finished_at = *self.finished_at.get_or_insert(ts);

        let terminal = if aborted { StepStatus::Aborted } else { StepStatus::Failed };
        if !self.initialization.is_finished() {
            self.initialization.status = terminal;
            self.initialization.finished_at = Some(finished_at);
        }
        for step in self.steps.values_mut() {
            match step.status {
                StepStatus::Queued => step.status = StepStatus::Skipped,
                StepStatus::Running | StepStatus::Paused => step.status = terminal,
                _ => {}
            }
        }
        let queued_at = self.queued_at;
        self.heal_duration(queued_at);
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
