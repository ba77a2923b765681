// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Result reconciler.
//!
//! Folds two sources of truth into one [`TestWorkflowResult`]: hints the
//! step runner prints into the container log (precise but possibly lost)
//! and the cluster state (coarse but eventually complete). Hints always
//! win for the steps they cover; cluster state only fills what no hint
//! reported.

use crate::state::ExecutionState;
use parking_lot::RwLock;
use twc_core::time::{latest, parse_rfc3339};
use twc_core::{
    signature, ActionGroups, ContainerStepStatus, ExecutionResult, HintName, Instruction, Pause, Signature,
    StepResult, StepStatus, TestWorkflowResult, Timestamp, WorkflowStatus, INIT_REF, ROOT_REF,
};

/// Error used when the cluster gives no reason for a stopped execution.
pub const DEFAULT_ERROR_MESSAGE: &str = "Job has been aborted";

struct Inner {
    result: TestWorkflowResult,
    state: Option<ExecutionState>,
    sequence: Vec<Signature>,
    actions: ActionGroups,
    scheduled_at: Option<Timestamp>,
    last_ts: Option<Timestamp>,
    ended: bool,
}

/// Thread-safe reconciler around one execution result.
pub struct ResultState {
    inner: RwLock<Inner>,
}

impl ResultState {
    /// Start from `initial`, e.g. a result persisted by an earlier controller.
    /// A terminal status is reopened until the result is ended again.
    pub fn new(initial: TestWorkflowResult) -> Self {
        let mut result = initial;
        if result.status.is_finished() {
            result.status = WorkflowStatus::Running;
        }
        result.finished_at = None;
        Self {
            inner: RwLock::new(Inner {
                result,
                state: None,
                sequence: Vec::new(),
                actions: ActionGroups::default(),
                scheduled_at: None,
                last_ts: None,
                ended: false,
            }),
        }
    }

    pub fn result(&self) -> TestWorkflowResult {
        self.inner.read().result.clone()
    }

    pub fn is_ended(&self) -> bool {
        self.inner.read().ended
    }

    /// Step currently executing, if any.
    pub fn current(&self) -> Option<String> {
        let inner = self.inner.read();
        inner.result.current(&inner.sequence)
    }

    /// Whether `step_ref` names the initialization or a step of the layout.
    pub fn is_known_step(&self, step_ref: &str) -> bool {
        self.inner.read().result.is_known_step(step_ref)
    }

    pub fn sequence(&self) -> Vec<Signature> {
        self.inner.read().sequence.clone()
    }

    /// Remember the timestamp of output read from the containers.
    pub fn register_timestamp(&self, ts: Timestamp) {
        let mut inner = self.inner.write();
        inner.last_ts = latest([inner.last_ts, Some(ts)]);
    }

    /// Apply a runner hint observed at `ts`.
    pub fn append(&self, ts: Timestamp, hint: &Instruction) {
        let mut inner = self.inner.write();
        inner.last_ts = latest([inner.last_ts, Some(ts)]);
        inner.apply_hint(ts, hint);
        inner.reconcile();
    }

    /// Align with the latest cluster state.
    pub fn align(&self, state: &ExecutionState) {
        self.inner.write().align(state);
    }

    /// Close the result: every unfinished step is blamed or skipped.
    /// `now` closes the result when no other timestamp is known.
    pub fn end(&self, now: Timestamp) {
        self.inner.write().end(now);
    }
}

impl Inner {
    fn apply_hint(&mut self, ts: Timestamp, hint: &Instruction) {
        let Some(name) = hint.hint_name() else {
            tracing::debug!(name = %hint.name, "ignoring unknown hint");
            return;
        };
        let step_ref = hint.step_ref.as_str();
        if step_ref == ROOT_REF {
            if name == HintName::End && !self.result.status.is_finished() {
                if let Some(status) = WorkflowStatus::parse(hint.value_str()).filter(WorkflowStatus::is_finished) {
                    self.result.status = status;
                    self.result.finished_at = Some(ts);
                }
            }
            return;
        }

        match name {
            HintName::Pause => {
                let at = parse_rfc3339(hint.value_str()).unwrap_or(ts);
                if self.result.has_pause_at(step_ref, at) {
                    return;
                }
                let Some(step) = self.result.step_mut(step_ref) else {
                    return;
                };
                if step.is_finished() {
                    return;
                }
                step.advance(StepStatus::Paused);
                self.result.pauses.push(Pause { step_ref: step_ref.to_string(), paused_at: at, resumed_at: None });
            }
            HintName::Resume => {
                let at = parse_rfc3339(hint.value_str()).unwrap_or(ts);
                let Some(step) = self.result.step_mut(step_ref) else {
                    return;
                };
                if step.status.is_paused() {
                    step.advance(StepStatus::Running);
                }
                for pause in self.result.pauses.iter_mut().filter(|p| p.step_ref == step_ref) {
                    if pause.resumed_at == Some(at) {
                        break;
                    }
                    if pause.resumed_at.is_none() && pause.paused_at <= at {
                        pause.resumed_at = Some(at);
                        break;
                    }
                }
            }
            HintName::Start => {
                let Some(step) = self.result.step_mut(step_ref) else {
                    return;
                };
                if !step.is_finished() {
                    step.advance(StepStatus::Running);
                    step.started_at.get_or_insert(ts);
                }
            }
            HintName::End => {
                let Some(step) = self.result.step_mut(step_ref) else {
                    return;
                };
                let status = StepStatus::parse(hint.value_str()).unwrap_or(StepStatus::Aborted);
                if step.advance(status) || (step.is_finished() && step.finished_at.is_none()) {
                    step.finished_at = Some(ts);
                }
            }
            HintName::Execution => {
                let Some(step) = self.result.step_mut(step_ref) else {
                    return;
                };
                match serde_json::from_value::<ExecutionResult>(hint.value.clone()) {
                    Ok(execution) => {
                        step.exit_code = execution.exit_code;
                        if !execution.details.is_empty() {
                            step.error_message = execution.details;
                        }
                    }
                    Err(err) => tracing::debug!(step = %step_ref, error = %err, "ignoring malformed execution hint"),
                }
            }
        }
    }

    fn align(&mut self, state: &ExecutionState) {
        if self.sequence.is_empty() {
            match state.signature() {
                Ok(sig) => self.sequence = signature::sequence(&sig),
                Err(err) => tracing::debug!(error = %err, "step layout not available yet"),
            }
        }
        if self.actions.is_empty() {
            if let Ok(actions) = state.action_groups() {
                self.actions = actions;
            }
        }
        if let Some(scheduled_at) = state.scheduled_at() {
            self.scheduled_at = Some(scheduled_at);
        }
        if let Some(queued_at) = state.estimated_job_creation_timestamp() {
            self.result.queued_at = Some(queued_at);
        }
        if let Some(started_at) = state.estimated_pod_creation_timestamp() {
            self.result.started_at = Some(started_at);
        }
        for sig in &self.sequence {
            self.result.steps.entry(sig.step_ref.clone()).or_insert_with(StepResult::queued);
        }
        self.state = Some(state.clone());
        self.reconcile();
    }

    /// Number of leading steps whose outcome can be taken from container results.
    fn processed_steps(&self) -> usize {
        let mut count = 0;
        for (i, sig) in self.sequence.iter().enumerate() {
            if let Some(step) = self.result.steps.get(&sig.step_ref).filter(|s| !s.is_not_started()) {
                count = if step.is_finished() { i + 1 } else { i };
            }
        }
        count
    }

    /// Copy outcomes from terminated containers into steps no hint closed.
    fn fill_gaps(&mut self, force: bool) {
        let Some(state) = self.state.clone() else {
            return;
        };
        if state.pod_created() && self.result.initialization.is_not_started() {
            self.result.initialization.advance(StepStatus::Running);
        }
        if !state.pod_exists() {
            return;
        }

        let processed = if force { self.sequence.len() } else { self.processed_steps() };
        let positions = self.actions.end_positions();
        let results: Vec<_> = self.actions.container_names().iter().map(|n| state.container_result(n)).collect();
        let lookup = |step_ref: &str| -> Option<(ContainerStepStatus, String)> {
            let position = positions.get(step_ref)?;
            let result = results.get(position.container)?.as_ref()?;
            Some((result.status_at(position.index)?, result.error_details.clone()))
        };

        let apply = |step: &mut StepResult, (outcome, details): (ContainerStepStatus, String)| {
            if step.is_finished() || !step.advance(outcome.status) {
                return;
            }
            step.exit_code = outcome.exit_code;
            if step.status.is_any_error() && step.error_message.is_empty() {
                step.error_message = details;
            }
        };

        if let Some(outcome) = lookup(INIT_REF) {
            apply(&mut self.result.initialization, outcome);
        }
        for sig in self.sequence.iter().take(processed) {
            let (Some(outcome), Some(step)) = (lookup(&sig.step_ref), self.result.steps.get_mut(&sig.step_ref)) else {
                continue;
            };
            apply(step, outcome);
        }

        // A step only runs once the initialization is over.
        let reached = self.result.steps.values().any(|s| !s.is_not_started());
        if reached && !self.result.initialization.is_finished() {
            self.result.initialization.advance(StepStatus::Passed);
        }
    }

    fn reconcile(&mut self) {
        let completion = self
            .state
            .as_ref()
            .and_then(ExecutionState::completion_timestamp)
            .map(|c| latest([Some(c), self.last_ts]).unwrap_or(c));
        let first_start = self.state.as_ref().and_then(|s| s.container_start_timestamp("1"));

        self.fill_gaps(false);
        self.result.heal_timestamps(&self.sequence, self.scheduled_at, first_start, completion, self.ended);
        self.result.heal_duration(self.scheduled_at);
        self.result.heal_missing_pause_statuses();
        self.result.heal_status(&self.sequence);
    }

    fn end(&mut self, now: Timestamp) {
        self.ended = true;
        self.fill_gaps(true);

        let (error, code) = match &self.state {
            Some(state) => (state.execution_error(), state.termination_code()),
            None => (String::new(), WorkflowStatus::Aborted.to_string()),
        };
        let error = if error.is_empty() { DEFAULT_ERROR_MESSAGE.to_string() } else { error };
        self.result.heal_aborted_or_canceled(&self.sequence, &error, DEFAULT_ERROR_MESSAGE, &code);
        self.reconcile();

        if self.result.finished_at.is_none() {
            self.result.finished_at = latest([self.last_ts, self.result.latest_timestamp(), Some(now)]);
            self.result.queued_at.get_or_insert(now);
            self.reconcile();
        }
    }
}

#[cfg(test)]
#[path = "result_state_tests.rs"]
mod tests;
