// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `twc watch` - stream the progress of an execution.

use super::Target;
use crate::exit_error::ExitError;
use crate::output::{render_json, render_lightweight, OutputFormat, TextRenderer};
use anyhow::Result;
use clap::Args;
use std::io::Write;
use tokio_util::sync::CancellationToken;
use twc_controller::{ControllerOptions, StreamOptions};
use twc_core::WorkflowStatus;

#[derive(Args, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub target: Target,

    /// Only report changes of status, current step, node or IP
    #[arg(long)]
    pub lightweight: bool,

    /// Print what is available now instead of following until the end
    #[arg(long)]
    pub no_follow: bool,

    /// Hide temporary entries such as scheduling events
    #[arg(long, short = 'q')]
    pub quiet: bool,

    /// Log the details of an aborted execution
    #[arg(long)]
    pub aborted_details: bool,

    #[arg(long, short = 'o', value_enum, default_value_t)]
    pub output: OutputFormat,
}

pub async fn run(args: WatchArgs, cancel: &CancellationToken) -> Result<()> {
    let controller = args.target.connect(ControllerOptions::default(), cancel).await?;
    let mut stdout = std::io::stdout();
    let mut last_status: Option<WorkflowStatus> = None;

    if args.lightweight {
        let mut rx = controller.watch_lightweight();
        while let Some(notification) = rx.recv().await {
            last_status = notification.status.or(last_status);
            let text = match args.output {
                OutputFormat::Json => render_json(&notification)?,
                OutputFormat::Text => render_lightweight(&notification),
            };
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
        }
    } else {
        let options =
            StreamOptions::default().disable_follow(args.no_follow).log_aborted_details(args.aborted_details);
        let mut rx = controller.watch(options);
        let mut renderer = TextRenderer::new(args.quiet);
        while let Some(notification) = rx.recv().await {
            if let Some(result) = &notification.result {
                last_status = Some(result.status);
            }
            let text = match args.output {
                OutputFormat::Json => Some(render_json(&notification)?),
                OutputFormat::Text => renderer.render(&notification),
            };
            if let Some(text) = text {
                stdout.write_all(text.as_bytes())?;
                stdout.flush()?;
            }
        }
    }
    controller.stop();

    match last_status.and_then(ExitError::for_status) {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}
