// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rendering of notification streams for the terminal.

use crate::color;
use clap::ValueEnum;
use twc_core::{LightweightNotification, Notification, WorkflowStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Turns notifications into terminal text. Results are only shown when the
/// workflow status changes.
#[derive(Debug, Default)]
pub struct TextRenderer {
    status: Option<WorkflowStatus>,
    /// Hide temporary log entries such as scheduling events.
    pub quiet: bool,
}

impl TextRenderer {
    pub fn new(quiet: bool) -> Self {
        Self { status: None, quiet }
    }

    pub fn render(&mut self, notification: &Notification) -> Option<String> {
        if let Some(error) = &notification.error {
            return Some(format!("{} {error}\n", color::header("error:")));
        }
        if let Some(result) = &notification.result {
            if self.status == Some(result.status) {
                return None;
            }
            self.status = Some(result.status);
            let mut line = format!("{} {}", color::header("status:"), color::status(result.status));
            if result.is_finished() && !result.total_duration.is_empty() {
                line.push_str(&format!(" {}", color::context(&format!("({})", result.total_duration))));
            }
            line.push('\n');
            return Some(line);
        }
        if let Some(output) = &notification.output {
            let value = serde_json::to_string(&output.value).unwrap_or_default();
            return Some(format!("{}\n", color::muted(&format!("output {} {value}", output.name))));
        }
        if notification.log.is_empty() || (self.quiet && notification.temporary) {
            return None;
        }
        if notification.temporary {
            return Some(color::muted(&notification.log));
        }
        Some(notification.log.clone())
    }
}

pub fn render_lightweight(notification: &LightweightNotification) -> String {
    if let Some(error) = &notification.error {
        return format!("{} {error}\n", color::header("error:"));
    }
    let mut line = match notification.status {
        Some(status) => color::status(status),
        None => color::muted("unknown"),
    };
    if !notification.current.is_empty() {
        line.push_str(&format!(" {}", color::literal(&notification.current)));
    }
    if !notification.node_name.is_empty() {
        line.push_str(&format!(" {}", color::context(&format!("node={}", notification.node_name))));
    }
    if !notification.pod_ip.is_empty() {
        line.push_str(&format!(" {}", color::context(&format!("ip={}", notification.pod_ip))));
    }
    line.push('\n');
    line
}

/// One JSON document per line.
pub fn render_json<T: serde::Serialize>(value: &T) -> anyhow::Result<String> {
    Ok(format!("{}\n", serde_json::to_string(value)?))
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
