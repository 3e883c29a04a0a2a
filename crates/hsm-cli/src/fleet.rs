// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only
#![allow(clippy::disallowed_methods)] // CLI commands intentionally print to stdout/stderr

//! Runtime lifecycle commands: status, start, stop, restart, logs

use crate::context::Context;
use crate::GlobalArgs;
use anyhow::{bail, Result};
use hsm_core::{load_backup_policy, FleetError, Ordinal, RunState};
use std::time::Duration;
use tokio::task::block_in_place;

/// Pause between stopping and starting the whole fleet.
const RESTART_PAUSE: Duration = Duration::from_secs(1);

/// Either one server or every server.
#[derive(Clone, Debug, clap::Args)]
#[group(required = true, multiple = false)]
pub struct Target {
    /// Server number, starting at 1
    pub ordinal: Option<u32>,
    /// Every provisioned server
    #[arg(long)]
    pub all: bool,
}

impl Target {
    fn single(&self) -> Result<Option<Ordinal>> {
        Ok(self.ordinal.map(Ordinal::new).transpose()?)
    }

    pub async fn start(&self, global: &GlobalArgs) -> Result<()> {
        let ctx = Context::load(global)?;
        let backup = load_backup_policy(&ctx.layout)?;
        let tokens = ctx.session_tokens().await;
        let supervisor = ctx.supervisor()?;

        match self.single()? {
            Some(ordinal) => {
                block_in_place(|| supervisor.start(ordinal, &backup, tokens.as_ref()))?;
                println!("Started server {ordinal} on port {}", ctx.layout.port(ordinal));
            }
            None => {
                let size = fleet_size(&ctx)?;
                let started =
                    block_in_place(|| supervisor.start_all(size, &backup, tokens.as_ref()))?;
                println!("Started {} of {size} server(s)", started.len());
            }
        }
        Ok(())
    }

    pub async fn stop(&self, global: &GlobalArgs) -> Result<()> {
        let ctx = Context::load(global)?;
        let supervisor = ctx.supervisor()?;

        match self.single()? {
            Some(ordinal) => {
                block_in_place(|| supervisor.stop(ordinal))?;
                println!("Stopped server {ordinal}");
            }
            None => {
                let size = fleet_size(&ctx)?;
                let report = block_in_place(|| supervisor.stop_all(size));
                println!("Stopped {} server(s)", report.stopped.len());
                if !report.is_clean() {
                    for (ordinal, e) in &report.failed {
                        eprintln!("server {ordinal}: {e}");
                    }
                    bail!("{} server(s) failed to stop", report.failed.len());
                }
            }
        }
        Ok(())
    }

    pub async fn restart(&self, global: &GlobalArgs) -> Result<()> {
        let ctx = Context::load(global)?;
        let backup = load_backup_policy(&ctx.layout)?;
        let tokens = ctx.session_tokens().await;
        let supervisor = ctx.supervisor()?;

        match self.single()? {
            Some(ordinal) => {
                block_in_place(|| supervisor.restart(ordinal, &backup, tokens.as_ref()))?;
                println!("Restarted server {ordinal}");
            }
            None => {
                let size = fleet_size(&ctx)?;
                let report = block_in_place(|| supervisor.stop_all(size));
                for (ordinal, e) in &report.failed {
                    eprintln!("server {ordinal} did not stop cleanly: {e}");
                }
                tokio::time::sleep(RESTART_PAUSE).await;
                let started =
                    block_in_place(|| supervisor.start_all(size, &backup, tokens.as_ref()))?;
                println!("Restarted {} of {size} server(s)", started.len());
            }
        }
        Ok(())
    }
}

fn fleet_size(ctx: &Context) -> Result<u32> {
    match ctx.layout.fleet_size() {
        0 => Err(FleetError::NoInstances.into()),
        n => Ok(n),
    }
}

pub async fn status(global: &GlobalArgs, json: bool) -> Result<()> {
    let ctx = Context::load(global)?;
    let size = ctx.layout.fleet_size();
    if size == 0 {
        if json {
            println!("[]");
        } else {
            println!(
                "No servers provisioned under {}",
                ctx.layout.data_dir().display()
            );
        }
        return Ok(());
    }

    let supervisor = ctx.supervisor()?;
    let statuses = block_in_place(|| supervisor.status(size));
    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    let running = statuses.iter().filter(|s| s.state == RunState::Running).count();
    println!("{running} of {size} server(s) running");
    for s in &statuses {
        let state = match s.state {
            RunState::Running => "running",
            RunState::Stopped => "stopped",
        };
        println!(
            "  server-{:<4} {:<8} port {:<6} session {}",
            s.ordinal.get(), state, s.port, s.session
        );
    }
    Ok(())
}

pub fn logs(global: &GlobalArgs, ordinal: u32, lines: usize) -> Result<()> {
    let ctx = Context::load(global)?;
    let ordinal = Ordinal::new(ordinal)?;
    let supervisor = ctx.supervisor()?;
    let output = block_in_place(|| supervisor.logs(ordinal, lines))?;
    print!("{output}");
    if !output.ends_with('\n') {
        println!();
    }
    Ok(())
}
