// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing subscriber for the binary.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const LOG_FILTER_VAR: &str = "TWC_LOG";
const LOG_DIR_VAR: &str = "TWC_LOG_DIR";
const DEFAULT_FILTER: &str = "info";
const LOG_FILE_PREFIX: &str = "twc.log";

/// Filter directives from `TWC_LOG`, falling back to `info`.
pub fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_FILTER_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Directory for daily log files (`TWC_LOG_DIR`), if set.
pub fn log_dir() -> Option<PathBuf> {
    std::env::var_os(LOG_DIR_VAR).filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// Install the global subscriber. Logs go to stderr unless a log directory
/// is configured. The returned guard flushes the file writer on drop.
pub fn init() -> Option<WorkerGuard> {
    let registry = tracing_subscriber::registry().with(filter());
    match log_dir() {
        Some(dir) => {
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX));
            registry.with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer)).init();
            Some(guard)
        }
        None => {
            registry.with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr)).init();
            None
        }
    }
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
