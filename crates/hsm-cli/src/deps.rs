// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only
#![allow(clippy::disallowed_methods)] // CLI commands intentionally print to stdout/stderr

use anyhow::Result;
use clap::Subcommand;
use hsm_core::{CancellationToken, DependencyProbe, DependencyReport, FleetError, HostDependencies};

#[derive(Subcommand)]
pub enum DepsCommands {
    /// Report which host tools are present
    Check {
        #[arg(long)]
        json: bool,
    },
    /// Install missing tools with the host package manager
    Install,
}

impl DepsCommands {
    pub async fn run(self, cancel: &CancellationToken) -> Result<()> {
        let probe = HostDependencies;
        match self {
            DepsCommands::Check { json } => {
                let report = probe.check().await;
                if json {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                } else {
                    print_report(&report);
                }
                let missing = report.missing_required();
                if !missing.is_empty() {
                    return Err(FleetError::MissingDependencies(missing).into());
                }
                Ok(())
            }
            DepsCommands::Install => {
                let installed = probe.install_missing(cancel).await?;
                if installed.is_empty() {
                    println!("All dependencies already present");
                } else {
                    println!("Installed: {}", installed.join(", "));
                }
                Ok(())
            }
        }
    }
}

fn print_report(report: &DependencyReport) {
    for check in &report.checks {
        let state = match (check.present, check.required) {
            (true, _) => "ok",
            (false, true) => "MISSING",
            (false, false) => "missing (optional)",
        };
        match &check.detail {
            Some(detail) if check.present => println!("  {:<6} {state:<18} {detail}", check.name),
            _ => println!("  {:<6} {state}", check.name),
        }
    }
    match report.package_manager {
        Some(pm) => println!("Package manager: {pm}"),
        None => println!("Package manager: none detected"),
    }
}
