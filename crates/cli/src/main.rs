// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! twc: watch and control test workflow executions on Kubernetes

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod color;
mod commands;
mod exit_error;
mod logging;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::control::{ControlArgs, Request};
use commands::logs::LogsArgs;
use commands::watch::WatchArgs;
use commands::Target;
use exit_error::ExitError;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(
    name = "twc",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_GIT_HASH"), ")"),
    about = "Watch and control test workflow executions",
    styles = color::styles(),
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Stream the progress and result of an execution
    Watch(WatchArgs),
    /// Print the log of an execution
    Logs(LogsArgs),
    /// Pause the running step
    Pause(ControlArgs),
    /// Resume a paused execution
    Resume(ControlArgs),
    /// Abort an execution by deleting its Job and Pods
    Abort(Target),
    /// Delete leftover resources of an execution
    Cleanup(Target),
}

async fn run(command: Commands, cancel: CancellationToken) -> Result<()> {
    match command {
        Commands::Watch(args) => commands::watch::run(args, &cancel).await,
        Commands::Logs(args) => commands::logs::run(args, &cancel).await,
        Commands::Pause(args) => commands::control::run(args, Request::Pause, &cancel).await,
        Commands::Resume(args) => commands::control::run(args, Request::Resume, &cancel).await,
        Commands::Abort(target) => commands::cleanup::abort(target, &cancel).await,
        Commands::Cleanup(target) => commands::cleanup::run(target).await,
    }
}

fn main() {
    let cli = Cli::parse();
    let _guard = logging::init();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("error: starting runtime: {err}");
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(async {
        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupted");
                on_signal.cancel();
            }
        });
        run(cli.command, cancel).await
    });

    if let Err(err) = result {
        if let Some(exit) = err.downcast_ref::<ExitError>() {
            if !exit.message.is_empty() {
                eprintln!("{}", exit.message);
            }
            std::process::exit(exit.code);
        }
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
