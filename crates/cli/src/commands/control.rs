// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `twc pause` / `twc resume` - drive the control server of a running pod.

use super::Target;
use crate::color;
use crate::exit_error::ExitError;
use anyhow::Result;
use clap::Args;
use tokio_util::sync::CancellationToken;
use twc_controller::{ControlClient, ControllerOptions};

#[derive(Args, Debug)]
pub struct ControlArgs {
    #[command(flatten)]
    pub target: Target,

    /// Port of the control server in the pod [default: $TWC_CONTROL_PORT or 8080]
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Pause,
    Resume,
}

impl ControlArgs {
    fn options(&self) -> ControllerOptions {
        let mut control = ControlClient::default();
        if let Some(port) = self.port {
            control = control.port(port);
        }
        ControllerOptions::default().control(control)
    }
}

pub async fn run(args: ControlArgs, request: Request, cancel: &CancellationToken) -> Result<()> {
    let controller = args.target.connect(args.options(), cancel).await?;
    let outcome = match request {
        Request::Pause => controller.pause().await,
        Request::Resume => controller.resume().await,
    };
    controller.stop();
    outcome.map_err(ExitError::from)?;

    let verb = match request {
        Request::Pause => "paused",
        Request::Resume => "resumed",
    };
    println!("{} {}", color::header(verb), color::literal(&args.target.id));
    Ok(())
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
