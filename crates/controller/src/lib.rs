// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! twc-controller: watches a test workflow execution on Kubernetes
//!
//! Resource watchers feed an execution state aggregator; the instrumented
//! watch sequence combines that state with container logs into an ordered
//! notification stream carrying a reconciled result.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod aggregator;
pub mod cleanup;
pub mod client;
pub mod control;
pub mod controller;
pub mod env;
pub mod error;
pub mod instrumented;
pub mod logs;
pub mod notifier;
pub mod result_state;
pub mod state;
pub mod watcher;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use aggregator::ExecutionWatcher;
pub use client::{ApiError, ExecutionSources, LogSource, ResourceCleaner, ResourceClient, Selector};
pub use control::{ControlClient, ControlError};
pub use controller::{Controller, ControllerOptions};
pub use error::ControllerError;
pub use instrumented::{watch_instrumented, StreamOptions};
pub use logs::{ContainerLog, LogError, LogReader};
pub use result_state::{ResultState, DEFAULT_ERROR_MESSAGE};
pub use state::{ExecutionState, ExecutionStateOptions};
pub use watcher::{ResourceWatcher, WatchError, WatchOptions};
