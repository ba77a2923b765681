// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `twc logs` - print the plain text log of an execution.

use super::Target;
use anyhow::Result;
use clap::Args;
use tokio_util::sync::CancellationToken;
use twc_controller::ControllerOptions;

#[derive(Args, Debug)]
pub struct LogsArgs {
    #[command(flatten)]
    pub target: Target,

    /// Keep streaming until the execution finishes
    #[arg(long, short = 'f')]
    pub follow: bool,
}

pub async fn run(args: LogsArgs, cancel: &CancellationToken) -> Result<()> {
    let controller = args.target.connect(ControllerOptions::default(), cancel).await?;
    let mut reader = controller.logs(args.follow);
    let mut stdout = tokio::io::stdout();
    let copied = tokio::select! {
        _ = cancel.cancelled() => Ok(0),
        copied = tokio::io::copy(&mut reader, &mut stdout) => copied,
    };
    controller.stop();
    tracing::debug!(execution = %args.target.id, bytes = copied.as_ref().ok(), "logs finished");
    copied?;
    Ok(())
}
