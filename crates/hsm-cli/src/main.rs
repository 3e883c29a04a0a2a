// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only
#![allow(clippy::disallowed_methods)] // errors are reported on stderr

use hsm_cli::{exit_status, Cli, Parser};
use hsm_core::CancellationToken;
use hsm_logging::CliLogLevel;
use std::process::ExitCode;
use tracing::warn;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = cli.logging.clone().init("hsm", CliLogLevel::Warn) {
        eprintln!("warning: logging disabled: {e:#}");
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling");
            on_interrupt.cancel();
        }
    });

    match cli.run(&cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_status(&e))
        }
    }
}
