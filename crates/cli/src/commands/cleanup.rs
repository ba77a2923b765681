// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `twc abort` / `twc cleanup` - delete the resources of an execution.

use super::Target;
use crate::color;
use crate::exit_error::{ExitError, CONTROLLER_FAILED};
use anyhow::Result;
use tokio_util::sync::CancellationToken;
use twc_controller::{cleanup::cleanup, ControllerOptions};

/// Abort a live execution. Fails when nothing of it can be found.
pub async fn abort(target: Target, cancel: &CancellationToken) -> Result<()> {
    let controller = target.connect(ControllerOptions::default(), cancel).await?;
    let outcome = controller.abort().await;
    controller.stop();
    outcome.map_err(ExitError::from)?;
    println!("{} {}", color::header("aborted"), color::literal(&target.id));
    Ok(())
}

/// Delete whatever is left of an execution, without watching it first.
pub async fn run(target: Target) -> Result<()> {
    let sources = target.sources().await?;
    cleanup(&*sources.cleaner, &target.id)
        .await
        .map_err(|err| ExitError::new(CONTROLLER_FAILED, format!("cleanup failed: {err}")))?;
    println!("{} {}", color::header("cleaned up"), color::literal(&target.id));
    Ok(())
}
