// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Removal of the resources backing one execution.

use crate::client::{ApiError, ResourceCleaner, Selector};
use crate::state::RESOURCE_ID_LABEL;

/// Delete the Job named `id` and every Pod labelled with it. Both deletions
/// are attempted; the first failure is returned.
pub async fn cleanup(cleaner: &dyn ResourceCleaner, id: &str) -> Result<(), ApiError> {
    let selector = Selector::labels(format!("{}={}", RESOURCE_ID_LABEL, id));
    let (job, pods) = tokio::join!(cleaner.delete_job(id), cleaner.delete_pods(&selector));
    if let Err(err) = &job {
        tracing::warn!(execution = %id, error = %err, "deleting job failed");
    }
    if let Err(err) = &pods {
        tracing::warn!(execution = %id, error = %err, "deleting pods failed");
    }
    job.and(pods)
}

#[cfg(test)]
#[path = "cleanup_tests.rs"]
mod tests;
