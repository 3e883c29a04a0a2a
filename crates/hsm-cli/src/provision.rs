// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only
#![allow(clippy::disallowed_methods)] // CLI commands intentionally print to stdout/stderr

//! Workflows that change what is on disk: bootstrap, scaling, updates, wipe

use crate::context::Context;
use crate::progress::ConsoleProgress;
use crate::GlobalArgs;
use anyhow::{bail, Context as _, Result};
use hsm_config::GameMode;
use hsm_core::{
    BackupPolicy, BootstrapRequest, CancellationToken, DesiredSettings, FleetError, FleetIdentity,
    Outcome,
};
use tokio::task::block_in_place;

#[derive(Clone, Debug, clap::Args)]
pub struct BootstrapArgs {
    /// Number of servers to provision
    #[arg(long, default_value_t = 1)]
    pub count: u32,
    #[arg(long)]
    pub max_players: Option<u32>,
    #[arg(long)]
    pub view_radius: Option<u32>,
    /// Adventure, Survival or Creative
    #[arg(long)]
    pub game_mode: Option<GameMode>,
    /// Join password; empty means none
    #[arg(long)]
    pub password: Option<String>,
    /// Run servers without periodic world backups
    #[arg(long)]
    pub no_backup: bool,
    /// Minutes between world backups
    #[arg(long, default_value_t = 60)]
    pub backup_frequency: u32,
    /// Prefix for server names (`<prefix>-N`)
    #[arg(long)]
    pub hostname_prefix: Option<String>,
}

impl BootstrapArgs {
    fn request(&self, ctx: &Context) -> BootstrapRequest {
        BootstrapRequest {
            count: self.count,
            settings: DesiredSettings {
                server_name: None,
                max_players: Some(self.max_players.unwrap_or(ctx.config.max_players)),
                max_view_radius: Some(self.view_radius.unwrap_or(ctx.config.max_view_radius)),
                game_mode: Some(self.game_mode.unwrap_or(ctx.config.game_mode)),
                password: self.password.clone(),
            },
            backup: BackupPolicy {
                enabled: !self.no_backup,
                frequency: self.backup_frequency,
            },
        }
    }

    /// Explicit `--base-port` and `--hostname-prefix` replace whatever an
    /// earlier bootstrap recorded.
    fn identity(&self, ctx: &Context, global: &GlobalArgs) -> FleetIdentity {
        let recorded = ctx.layout.identity();
        FleetIdentity {
            base_port: global.base_port.unwrap_or(recorded.base_port),
            hostname_prefix: self
                .hostname_prefix
                .clone()
                .unwrap_or(recorded.hostname_prefix),
        }
    }

    pub async fn run(&self, global: &GlobalArgs, cancel: &CancellationToken) -> Result<()> {
        let ctx = Context::load(global)?;
        let layout = ctx.layout.clone().with_identity(&self.identity(&ctx, global));
        let provisioner = ctx.provisioner_for(layout);
        let request = self.request(&ctx);

        let outcome = provisioner
            .bootstrap(&request, &ConsoleProgress::new(), cancel)
            .await
            .context("bootstrap failed")?;
        report(&outcome)
    }
}

#[derive(Clone, Debug, clap::Args)]
pub struct CountArgs {
    /// How many servers
    #[arg(long, default_value_t = 1)]
    pub count: u32,
}

impl CountArgs {
    pub async fn scale_up(&self, global: &GlobalArgs, cancel: &CancellationToken) -> Result<()> {
        let ctx = Context::load(global)?;
        let outcome = ctx
            .provisioner()
            .scale_up(self.count, &ConsoleProgress::new(), cancel)
            .await
            .context("scale-up failed")?;
        report(&outcome)
    }

    pub async fn scale_down(&self, global: &GlobalArgs) -> Result<()> {
        let ctx = Context::load(global)?;
        // Refuse before looking for tmux
        if ctx.layout.fleet_size() <= 1 {
            return Err(FleetError::LastInstance.into());
        }
        let supervisor = ctx.supervisor()?;
        let provisioner = ctx.provisioner();
        let outcome = block_in_place(|| provisioner.scale_down(&supervisor, self.count))
            .context("scale-down failed")?;
        report(&outcome)
    }
}

pub async fn update_game(global: &GlobalArgs, cancel: &CancellationToken) -> Result<()> {
    let ctx = Context::load(global)?;
    let outcome = ctx
        .provisioner()
        .update_game(&ConsoleProgress::new(), cancel)
        .await
        .context("game update failed")?;
    println!("Restart running servers to pick up the new version.");
    report(&outcome)
}

pub async fn update_plugins(global: &GlobalArgs, cancel: &CancellationToken) -> Result<()> {
    let ctx = Context::load(global)?;
    let outcome = ctx
        .provisioner()
        .update_plugins(&ConsoleProgress::new(), cancel)
        .await
        .context("plugin update failed")?;
    report(&outcome)
}

pub async fn wipe(global: &GlobalArgs, yes: bool) -> Result<()> {
    let ctx = Context::load(global)?;
    if !yes {
        bail!(
            "refusing to delete {} without --yes",
            ctx.layout.data_dir().display()
        );
    }
    let supervisor = ctx.supervisor()?;
    let provisioner = ctx.provisioner();
    let outcome = block_in_place(|| provisioner.wipe(&supervisor)).context("wipe failed")?;
    report(&outcome)
}

/// Outcome on stdout. A partial result still exits non-zero.
fn report(outcome: &Outcome) -> Result<()> {
    println!("{outcome}");
    match outcome {
        Outcome::Completed { .. } => Ok(()),
        Outcome::Partial {
            succeeded,
            attempted,
            ..
        } => bail!("only {succeeded} of {attempted} step(s) succeeded"),
    }
}
