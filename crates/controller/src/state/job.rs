// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only accessors over a Job object.

use super::{annotation, reason_message, time, RESOURCE_ID_LABEL, TERMINATION_REASON_ANNOTATION};
use k8s_openapi::api::batch::v1::{Job, JobCondition};
use twc_core::time::{first_set, latest};
use twc_core::Timestamp;

/// Borrowed view over a Job.
#[derive(Debug, Clone, Copy)]
pub struct JobView<'a>(pub &'a Job);

impl<'a> JobView<'a> {
    pub fn name(&self) -> &'a str {
        self.0.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> Option<&'a str> {
        self.0.metadata.namespace.as_deref()
    }

    /// Execution id from the resource-id label, falling back to the name.
    pub fn resource_id(&self) -> &'a str {
        self.0
            .metadata
            .labels
            .as_ref()
            .and_then(|l| l.get(RESOURCE_ID_LABEL))
            .map(String::as_str)
            .unwrap_or_else(|| self.name())
    }

    pub fn annotation(&self, key: &str) -> Option<&'a str> {
        annotation(&self.0.metadata, key)
    }

    pub fn creation_timestamp(&self) -> Option<Timestamp> {
        time(&self.0.metadata.creation_timestamp)
    }

    pub fn deletion_timestamp(&self) -> Option<Timestamp> {
        time(&self.0.metadata.deletion_timestamp)
    }

    pub fn start_timestamp(&self) -> Option<Timestamp> {
        self.0.status.as_ref().and_then(|s| time(&s.start_time))
    }

    fn conditions(&self) -> impl Iterator<Item = &'a JobCondition> {
        self.0.status.as_ref().and_then(|s| s.conditions.as_ref()).into_iter().flatten()
    }

    fn terminal_condition(&self) -> Option<&'a JobCondition> {
        self.conditions().find(|c| (c.type_ == "Complete" || c.type_ == "Failed") && c.status == "True")
    }

    pub fn is_succeeded(&self) -> bool {
        self.terminal_condition().is_some_and(|c| c.type_ == "Complete")
    }

    pub fn is_failed(&self) -> bool {
        self.terminal_condition().is_some_and(|c| c.type_ == "Failed")
    }

    /// A Job is finished once it has a terminal condition, a completion
    /// time, or is being deleted.
    pub fn is_finished(&self) -> bool {
        self.deletion_timestamp().is_some()
            || self.terminal_condition().is_some()
            || self.0.status.as_ref().is_some_and(|s| s.completion_time.is_some())
    }

    pub fn completion_timestamp(&self) -> Option<Timestamp> {
        if !self.is_finished() {
            return None;
        }
        first_set([
            self.0.status.as_ref().and_then(|s| time(&s.completion_time)),
            self.terminal_condition().and_then(|c| time(&c.last_transition_time)),
            self.deletion_timestamp(),
        ])
    }

    /// Why the Job stopped, empty while it has no failure to report.
    ///
    /// An exceeded deadline wins, then the termination reason annotated by
    /// whoever stopped it, then the deletion itself, then the `reason:
    /// message` of the Failed condition.
    pub fn execution_error(&self) -> String {
        let failed = self.terminal_condition().filter(|c| c.type_ == "Failed");
        let deadline = self.0.spec.as_ref().and_then(|s| s.active_deadline_seconds);
        if let (Some(seconds), Some("DeadlineExceeded")) = (deadline, failed.and_then(|c| c.reason.as_deref())) {
            return format!("Job timed out after {} seconds", seconds);
        }
        if let Some(reason) = self.termination_reason() {
            return reason.to_string();
        }
        if self.deletion_timestamp().is_some() {
            return "Job has been aborted".to_string();
        }
        let Some(cond) = failed else {
            return String::new();
        };
        let error = reason_message(
            cond.reason.as_deref().unwrap_or_default(),
            cond.message.as_deref().unwrap_or_default(),
        );
        if error.is_empty() {
            "Job failed".to_string()
        } else {
            error
        }
    }

    pub fn termination_reason(&self) -> Option<&'a str> {
        self.annotation(TERMINATION_REASON_ANNOTATION)
    }

    pub fn latest_timestamp(&self) -> Option<Timestamp> {
        let conditions = self.conditions().map(|c| time(&c.last_transition_time));
        latest(
            [self.creation_timestamp(), self.start_timestamp(), self.completion_timestamp(), self.deletion_timestamp()]
                .into_iter()
                .chain(conditions),
        )
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
