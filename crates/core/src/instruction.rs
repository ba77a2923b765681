// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-band instruction protocol embedded in container output.
//!
//! A line of the form
//! `\x01\x05[\x06]<ref>\x03<name>[\x04<json>]\x03`
//! is an instruction rather than log text. The optional `\x06` marks a hint
//! (lifecycle signal from the step runner); without it the line is an output
//! value published by the step.

use regex::bytes::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

pub const INSTRUCTION_PREFIX: &str = "\u{1}\u{5}";
pub const HINT_PREFIX: char = '\u{6}';
pub const INSTRUCTION_SEPARATOR: char = '\u{3}';
pub const VALUE_SEPARATOR: char = '\u{4}';

#[allow(clippy::expect_used)]
static INSTRUCTION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\x01\x05(\x06)?([^\x03]+)\x03([a-zA-Z0-9\-_.]+)(?:\x04([^\n]+))?\x03$")
        .expect("constant regex pattern is valid")
});

/// Lifecycle hints understood by the result reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HintName {
    Start,
    End,
    Execution,
    Pause,
    Resume,
}

crate::simple_display! {
    HintName {
        Start => "start",
        End => "end",
        Execution => "execution",
        Pause => "pause",
        Resume => "resume",
    }
}

impl HintName {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "start" => Some(Self::Start),
            "end" => Some(Self::End),
            "execution" => Some(Self::Execution),
            "pause" => Some(Self::Pause),
            "resume" => Some(Self::Resume),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    #[serde(rename = "ref")]
    pub step_ref: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub value: serde_json::Value,
}

impl Instruction {
    pub fn new(step_ref: impl Into<String>, name: impl Into<String>, value: serde_json::Value) -> Self {
        Self { step_ref: step_ref.into(), name: name.into(), value }
    }

    pub fn hint(step_ref: impl Into<String>, name: HintName, value: serde_json::Value) -> Self {
        Self::new(step_ref, name.to_string(), value)
    }

    pub fn hint_name(&self) -> Option<HintName> {
        HintName::parse(&self.name)
    }

    /// String value, or empty when the value is absent or not a string.
    pub fn value_str(&self) -> &str {
        self.value.as_str().unwrap_or_default()
    }
}

/// Whether the instruction was a hint or an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionKind {
    Hint,
    Output,
}

/// Result of a step's process, carried by the `execution` hint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    #[serde(default)]
    pub exit_code: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details: String,
}

/// Cheap prefix check before running the full matcher.
pub fn may_be_instruction(line: &[u8]) -> bool {
    line.len() >= 4 && line.starts_with(INSTRUCTION_PREFIX.as_bytes())
}

/// Decode an instruction line. Lines that do not match, or whose value is not
/// valid JSON, are ordinary log text and yield `None`.
pub fn detect(line: &[u8]) -> Option<(InstructionKind, Instruction)> {
    if !may_be_instruction(line) {
        return None;
    }
    let captures = INSTRUCTION_LINE.captures(line)?;
    let kind = if captures.get(1).is_some() { InstructionKind::Hint } else { InstructionKind::Output };
    let step_ref = String::from_utf8_lossy(captures.get(2)?.as_bytes()).into_owned();
    let name = String::from_utf8_lossy(captures.get(3)?.as_bytes()).into_owned();
    let value = match captures.get(4) {
        Some(raw) => serde_json::from_slice(raw.as_bytes()).ok()?,
        None => serde_json::Value::Null,
    };
    Some((kind, Instruction { step_ref, name, value }))
}

fn format(kind: InstructionKind, instruction: &Instruction) -> String {
    let mut out = String::from(INSTRUCTION_PREFIX);
    if kind == InstructionKind::Hint {
        out.push(HINT_PREFIX);
    }
    out.push_str(&instruction.step_ref);
    out.push(INSTRUCTION_SEPARATOR);
    out.push_str(&instruction.name);
    if !instruction.value.is_null() {
        out.push(VALUE_SEPARATOR);
        out.push_str(&instruction.value.to_string());
    }
    out.push(INSTRUCTION_SEPARATOR);
    out
}

/// Render a hint line, as the step runner prints it.
pub fn format_hint(instruction: &Instruction) -> String {
    format(InstructionKind::Hint, instruction)
}

/// Render an output line.
pub fn format_output(instruction: &Instruction) -> String {
    format(InstructionKind::Output, instruction)
}

#[cfg(test)]
#[path = "instruction_tests.rs"]
mod tests;
