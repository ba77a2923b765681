// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Healing passes that restore internal consistency of a result after
//! partial or out-of-order updates.

use super::TestWorkflowResult;
use crate::signature::{Signature, INIT_REF};
use crate::status::{StepStatus, WorkflowStatus};
use crate::time::{earliest, first_set, format_duration, latest, millis_between, Timestamp};
use std::time::Duration;

impl TestWorkflowResult {
    /// Fill and clamp timestamps.
    ///
    /// `sequence` is the pre-order signature sequence. Each leaf step is
    /// queued when the previous one finished. When `ended`, unfinished steps
    /// are closed using the next step's queue time or the completion time.
    pub fn heal_timestamps(
        &mut self,
        sequence: &[Signature],
        scheduled_at: Option<Timestamp>,
        first_container_start: Option<Timestamp>,
        completion: Option<Timestamp>,
        ended: bool,
    ) {
        self.queued_at = latest([self.queued_at, scheduled_at]);
        if self.started_at.is_some() {
            self.started_at = latest([self.started_at, self.queued_at]);
        }

        let init = &mut self.initialization;
        init.queued_at = earliest([self.started_at, init.queued_at]);
        if !init.is_not_started() {
            init.started_at = latest([init.started_at, first_container_start, init.queued_at]);
        }
        if init.is_finished() && init.finished_at.is_none() {
            init.finished_at = if init.status.is_aborted() {
                latest([init.started_at, completion])
            } else {
                init.started_at
            };
        }
        if let (Some(finished), Some(started)) = (init.finished_at, init.started_at) {
            if finished < started {
                init.finished_at = Some(started);
            }
        }

        let leaves: Vec<&Signature> = sequence.iter().filter(|s| !s.is_group()).collect();
        let mut last_ts = self.initialization.finished_at;
        for (i, sig) in leaves.iter().enumerate() {
            let next = leaves
                .get(i + 1)
                .and_then(|n| self.steps.get(&n.step_ref))
                .map(|n| first_set([n.queued_at, n.started_at]));
            let Some(step) = self.steps.get_mut(&sig.step_ref) else {
                last_ts = None;
                continue;
            };
            step.queued_at = last_ts;
            let closed_early = step.status.is_aborted() || (step.status.is_skipped() && !step.error_message.is_empty());
            if step.finished_at.is_none() && closed_early {
                step.finished_at = completion;
            }
            if step.finished_at.is_none() && ended {
                step.finished_at = match next {
                    Some(Some(ts)) => Some(ts),
                    _ => completion,
                };
            }
            if step.queued_at.is_some() && step.finished_at.is_some() && step.started_at.is_none() {
                step.started_at = step.queued_at;
            }
            if let (Some(started), Some(queued)) = (step.started_at, step.queued_at) {
                if started < queued {
                    step.started_at = Some(queued);
                }
            }
            if let (Some(finished), Some(started)) = (step.finished_at, step.started_at) {
                if finished < started {
                    step.finished_at = Some(started);
                }
            }
            last_ts = step.finished_at;
        }

        // Groups span their descendants; walk backwards so nested groups are ready first.
        for group in sequence.iter().rev().filter(|s| s.is_group()) {
            let nodes = group.sequence();
            let first = nodes.get(1).and_then(|n| self.steps.get(&n.step_ref)).and_then(|s| s.queued_at);
            let last = nodes.last().and_then(|n| self.steps.get(&n.step_ref)).and_then(|s| s.finished_at);
            if let Some(step) = self.steps.get_mut(&group.step_ref) {
                step.queued_at = first;
                step.finished_at = last;
            }
        }

        if ended {
            self.finished_at = first_set([self.approx_current_timestamp(), completion]);
        }
    }

    /// Close pauses and recompute the duration fields.
    pub fn heal_duration(&mut self, scheduled_at: Option<Timestamp>) {
        let Some(finished_at) = self.finished_at else {
            return;
        };

        for i in 0..self.pauses.len() {
            let Some(step) = self.step(&self.pauses[i].step_ref).cloned() else {
                continue;
            };
            let Some(step_finished) = step.finished_at else {
                continue;
            };
            let pause = &mut self.pauses[i];
            let resumed_at = *pause.resumed_at.get_or_insert(step_finished);
            if let Some(step_started) = step.started_at {
                if pause.paused_at < step_started {
                    pause.paused_at = step_started;
                }
            }
            if resumed_at < pause.paused_at {
                pause.paused_at = resumed_at;
            }
        }

        // Overlapping pauses (e.g. a group and its child) count once.
        let mut intervals: Vec<(Timestamp, Timestamp)> = self
            .pauses
            .iter()
            .map(|p| (p.paused_at, p.resumed_at.unwrap_or(finished_at).max(p.paused_at)))
            .collect();
        intervals.sort();
        let mut merged: Vec<(Timestamp, Timestamp)> = Vec::new();
        for (start, end) in intervals {
            match merged.last_mut() {
                Some(last) if start <= last.1 => last.1 = last.1.max(end),
                _ => merged.push((start, end)),
            }
        }
        self.paused_ms = merged.iter().map(|(s, e)| millis_between(*s, *e)).sum();

        let start = first_set([scheduled_at, self.queued_at]);
        self.total_duration_ms = start.map(|s| millis_between(s, finished_at)).unwrap_or(0);
        self.duration_ms = self.total_duration_ms.saturating_sub(self.paused_ms);
        self.duration = format_duration(Duration::from_millis(self.duration_ms));
        self.total_duration = format_duration(Duration::from_millis(self.total_duration_ms));
    }

    /// Steps with an open pause that are neither paused nor finished become paused.
    pub fn heal_missing_pause_statuses(&mut self) {
        let open: Vec<String> = self
            .pauses
            .iter()
            .filter(|p| p.resumed_at.is_none())
            .map(|p| p.step_ref.clone())
            .collect();
        for step_ref in open {
            if let Some(step) = self.step_mut(&step_ref) {
                if !step.status.is_paused() && !step.is_finished() {
                    step.advance(StepStatus::Paused);
                }
            }
        }
    }

    /// Recompute the predicted status and, from it, the overall status.
    /// A terminal overall status is never changed.
    pub fn heal_status(&mut self, sequence: &[Signature]) {
        self.predicted_status = self.compute_predicted_status(sequence);
        if self.status.is_finished() {
            return;
        }
        if self.finished_at.is_some() && self.are_all_steps_finished() {
            self.status = self.predicted_status;
        } else if self.is_any_step_paused() {
            self.status = WorkflowStatus::Paused;
        } else if self.started_at.is_some() {
            self.status = WorkflowStatus::Running;
        }
    }

    fn compute_predicted_status(&self, sequence: &[Signature]) -> WorkflowStatus {
        if self.initialization.status.is_any_error() || self.is_any_step_aborted() {
            return WorkflowStatus::Aborted;
        }
        if self.is_any_step_canceled() {
            return WorkflowStatus::Canceled;
        }
        let optional = |step_ref: &str| sequence.iter().any(|s| s.step_ref == step_ref && s.optional);
        let failed = self
            .steps
            .iter()
            .any(|(step_ref, step)| step.status.is_any_error() && !optional(step_ref));
        if failed {
            WorkflowStatus::Failed
        } else {
            WorkflowStatus::Passed
        }
    }

    /// Close every unfinished step after the execution was stopped.
    ///
    /// The first unfinished step takes the blame (aborted or canceled,
    /// depending on `termination_code`); the ones after it are skipped.
    pub fn heal_aborted_or_canceled(
        &mut self,
        sequence: &[Signature],
        error: &str,
        default_error: &str,
        termination_code: &str,
    ) {
        let canceling = termination_code == WorkflowStatus::Canceled.to_string();
        let (blamed, verb) = if canceling {
            (StepStatus::Canceled, "canceled")
        } else {
            (StepStatus::Aborted, "aborted")
        };
        let message = if error.is_empty() {
            format!("The execution has been {termination_code}.")
        } else {
            format!("The execution has been {termination_code}. ({error})")
        };

        let mut stopped = false;
        let init = &mut self.initialization;
        if !init.is_finished() || init.status.is_aborted() || init.status.is_canceled() {
            stopped = true;
            init.status = blamed;
            init.error_message = message.clone();
        }

        for sig in sequence.iter().filter(|s| !s.is_group() && s.step_ref != INIT_REF) {
            let Some(step) = self.steps.get_mut(&sig.step_ref) else {
                continue;
            };
            let settled = step.is_finished()
                && !step.status.is_aborted()
                && !step.status.is_canceled()
                && (!step.status.is_skipped() || step.error_message.is_empty());
            if settled {
                continue;
            }
            if stopped {
                step.status = StepStatus::Skipped;
                step.error_message = format!("The execution was {verb} before. ({error})");
            } else {
                stopped = true;
                step.status = blamed;
                step.error_message = if step.error_message.is_empty() || step.error_message == default_error {
                    message.clone()
                } else {
                    step.error_message.clone()
                };
            }
        }

        for group in sequence.iter().rev().filter(|s| s.is_group() && s.step_ref != INIT_REF) {
            let unfinished = self.steps.get(&group.step_ref).is_some_and(|s| !s.is_finished());
            if !unfinished {
                continue;
            }
            let children: Vec<StepStatus> = group
                .children
                .iter()
                .filter_map(|c| self.steps.get(&c.step_ref).map(|s| s.status))
                .collect();
            let status = if children.iter().all(StepStatus::is_skipped) {
                Some(StepStatus::Skipped)
            } else if children.iter().any(StepStatus::is_aborted) {
                Some(StepStatus::Aborted)
            } else if children.iter().any(StepStatus::is_canceled) {
                Some(StepStatus::Canceled)
            } else {
                None
            };
            if let (Some(status), Some(step)) = (status, self.steps.get_mut(&group.step_ref)) {
                step.status = status;
            }
        }

        for step in self.steps.values_mut().filter(|s| !s.is_finished()) {
            step.status = blamed;
            step.error_message = format!("The execution was {verb}, but we could not determine steps order: {error}");
        }
    }
}
