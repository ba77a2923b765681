// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-container action plan.
//!
//! Stored as a JSON annotation: one list of actions per container, where the
//! container at index `i` is named `i + 1`. Only `start` and `end` actions
//! matter for watching; everything else in the plan is ignored.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

impl Action {
    pub fn start(step_ref: impl Into<String>) -> Self {
        Self { start: Some(step_ref.into()), end: None }
    }

    pub fn end(step_ref: impl Into<String>) -> Self {
        Self { start: None, end: Some(step_ref.into()) }
    }
}

/// Refs started and ended inside one container, in plan order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerRefs {
    pub started: Vec<String>,
    pub ended: Vec<String>,
}

impl ContainerRefs {
    /// The ref whose `end` hint marks the container as done.
    /// An empty trailing ref defers to the one before it.
    pub fn last_ended(&self) -> Option<&str> {
        match self.ended.as_slice() {
            [.., before, last] if last.is_empty() => Some(before.as_str()),
            [.., last] => Some(last.as_str()),
            [] => None,
        }
    }
}

/// Location of a step's status inside the termination messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndPosition {
    pub container: usize,
    pub index: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionGroups(pub Vec<Vec<Action>>);

impl ActionGroups {
    pub fn parse(value: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Container names in execution order (`"1"`, `"2"`, ...).
    pub fn container_names(&self) -> Vec<String> {
        (1..=self.0.len()).map(|i| i.to_string()).collect()
    }

    pub fn container_refs(&self) -> Vec<ContainerRefs> {
        self.0
            .iter()
            .map(|group| ContainerRefs {
                started: group.iter().filter_map(|a| a.start.clone()).collect(),
                ended: group.iter().filter_map(|a| a.end.clone()).collect(),
            })
            .collect()
    }

    /// Map each ended ref to the container and slot that reports its status.
    pub fn end_positions(&self) -> HashMap<String, EndPosition> {
        let mut out = HashMap::new();
        for (container, refs) in self.container_refs().into_iter().enumerate() {
            for (index, step_ref) in refs.ended.into_iter().enumerate() {
                out.insert(step_ref, EndPosition { container, index });
            }
        }
        out
    }
}

#[cfg(test)]
#[path = "actions_tests.rs"]
mod tests;
