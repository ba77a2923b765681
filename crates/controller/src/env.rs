// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the controller crate.

use std::time::Duration;

fn millis(var: &str) -> Option<Duration> {
    std::env::var(var).ok().and_then(|s| s.parse::<u64>().ok()).map(Duration::from_millis)
}

/// Timeout for a single list request (default 240s, `TWC_LIST_TIMEOUT_MS`).
pub fn list_timeout() -> Duration {
    millis("TWC_LIST_TIMEOUT_MS").unwrap_or(Duration::from_secs(240))
}

/// Server-side timeout of one watch request before it is reopened
/// (default 290s, `TWC_WATCH_TIMEOUT_MS`). The API server rejects
/// watch timeouts of 295s or more.
pub fn watch_timeout() -> Duration {
    millis("TWC_WATCH_TIMEOUT_MS").unwrap_or(Duration::from_secs(290)).min(Duration::from_secs(294))
}

/// Delay before re-listing after a failed watch (default 1s, `TWC_WATCH_RETRY_MS`).
pub fn watch_retry() -> Duration {
    millis("TWC_WATCH_RETRY_MS").unwrap_or(Duration::from_secs(1))
}

/// How long the controller waits without updates before forcing a refresh
/// (default 30s, `TWC_FALLBACK_POLL_MS`).
pub fn fallback_poll() -> Duration {
    millis("TWC_FALLBACK_POLL_MS").unwrap_or(Duration::from_secs(30))
}

/// Port of the pause/resume control server inside the execution pod
/// (default 8080, `TWC_CONTROL_PORT`).
pub fn control_port() -> u16 {
    std::env::var("TWC_CONTROL_PORT").ok().and_then(|s| s.parse::<u16>().ok()).unwrap_or(8080)
}

/// Timeout of a single control request (default 5s, `TWC_CONTROL_TIMEOUT_MS`).
pub fn control_timeout() -> Duration {
    millis("TWC_CONTROL_TIMEOUT_MS").unwrap_or(Duration::from_secs(5))
}

/// Namespace that executions run in (default `default`, `TWC_NAMESPACE`).
pub fn namespace() -> String {
    std::env::var("TWC_NAMESPACE").ok().filter(|s| !s.is_empty()).unwrap_or_else(|| "default".to_string())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
