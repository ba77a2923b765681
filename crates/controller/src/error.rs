// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors returned by the execution controller.

use crate::client::ApiError;
use crate::control::ControlError;
use crate::state::StateError;
use crate::watcher::WatchError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ControllerError {
    /// Only events are left behind: the resources were removed early.
    #[error("job was aborted")]
    JobAborted,
    #[error("timeout retrieving job")]
    JobTimeout,
    #[error("invalid job signature: {0}")]
    InvalidSignature(#[source] StateError),
    #[error("there is no IP assigned to this pod")]
    NoIpAssigned,
    #[error("the pod is not assigned to a node yet")]
    NoNodeAssigned,
    #[error(transparent)]
    Watch(#[from] WatchError),
    #[error(transparent)]
    Control(#[from] ControlError),
    #[error("cleanup failed: {0}")]
    Cleanup(#[from] ApiError),
}
