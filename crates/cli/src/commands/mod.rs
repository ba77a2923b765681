// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod cleanup;
pub mod control;
pub mod logs;
pub mod watch;

use crate::exit_error::ExitError;
use anyhow::{Context, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;
use twc_controller::{env, Controller, ControllerOptions, ExecutionSources};

/// Execution selected by a command.
#[derive(Args, Debug, Clone)]
pub struct Target {
    /// Execution id (name of its Job)
    pub id: String,

    /// Namespace the execution runs in [default: $TWC_NAMESPACE or "default"]
    #[arg(long, short = 'n')]
    pub namespace: Option<String>,
}

impl Target {
    pub fn namespace(&self) -> String {
        self.namespace.clone().unwrap_or_else(env::namespace)
    }

    pub async fn sources(&self) -> Result<ExecutionSources> {
        let client = kube::Client::try_default().await.context("connecting to the cluster")?;
        Ok(ExecutionSources::kube(client, &self.namespace()))
    }

    pub async fn connect(&self, options: ControllerOptions, cancel: &CancellationToken) -> Result<Controller> {
        let sources = self.sources().await?;
        let namespace = self.namespace();
        tracing::debug!(execution = %self.id, %namespace, "connecting");
        let controller = Controller::new(sources, &self.id, options.namespace(namespace), cancel)
            .await
            .map_err(ExitError::from)?;
        Ok(controller)
    }
}
