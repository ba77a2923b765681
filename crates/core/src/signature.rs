// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declared step structure of a workflow.
//!
//! The signature is stored as a JSON annotation on the Job and Pod. It is
//! known before the execution starts and never changes afterwards.

use serde::{Deserialize, Serialize};

/// Reference of the initialization phase.
pub const INIT_REF: &str = "init";

/// Reference of the whole workflow, used by the root `end` instruction.
pub const ROOT_REF: &str = "root";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    #[serde(rename = "ref", default)]
    pub step_ref: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub category: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub negative: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Signature>,
}

impl Signature {
    pub fn step(step_ref: impl Into<String>, name: impl Into<String>) -> Self {
        Self { step_ref: step_ref.into(), name: name.into(), ..Default::default() }
    }

    pub fn group(step_ref: impl Into<String>, children: Vec<Signature>) -> Self {
        Self { step_ref: step_ref.into(), children, ..Default::default() }
    }

    pub fn is_group(&self) -> bool {
        !self.children.is_empty()
    }

    /// Display label, falling back to the category.
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.category
        } else {
            &self.name
        }
    }

    /// This node followed by all of its descendants, pre-order.
    pub fn sequence(&self) -> Vec<&Signature> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.sequence());
        }
        out
    }
}

/// Parse the signature annotation value.
pub fn parse(value: &str) -> Result<Vec<Signature>, serde_json::Error> {
    serde_json::from_str(value)
}

/// Pre-order walk of all nodes, groups before their children.
pub fn sequence(signature: &[Signature]) -> Vec<Signature> {
    signature
        .iter()
        .flat_map(|s| s.sequence())
        .cloned()
        .collect()
}

/// Leaf steps in execution order.
pub fn leaves(signature: &[Signature]) -> Vec<&Signature> {
    signature
        .iter()
        .flat_map(|s| s.sequence())
        .filter(|s| !s.is_group())
        .collect()
}

/// Visit every node with its children visited first.
pub fn walk_post_order<'a>(signature: &'a [Signature], f: &mut impl FnMut(&'a Signature)) {
    for s in signature {
        walk_post_order(&s.children, f);
        f(s);
    }
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
