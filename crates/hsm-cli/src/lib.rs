// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use anyhow::Result;
use clap::Subcommand;
use hsm_core::{CancellationToken, FleetError};
use hsm_logging::CliLoggingArgs;
use std::path::PathBuf;

pub mod backup;
pub mod config_commands;
pub mod context;
pub mod deps;
pub mod fleet;
pub mod progress;
pub mod provision;
pub mod tokens;

pub use clap::Parser;

/// Exit status for an interrupted command, as a shell would report SIGINT.
pub const EXIT_CANCELLED: u8 = 130;

#[derive(clap::Parser)]
#[command(
    name = "hsm",
    about = "Hytale server manager",
    version,
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(flatten)]
    pub logging: CliLoggingArgs,
    #[command(subcommand)]
    pub command: Commands,
}

/// Options that feed the configuration flag layer.
#[derive(Clone, Debug, Default, clap::Args)]
pub struct GlobalArgs {
    /// Extra configuration file, applied above system and user files
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Directory holding the whole fleet
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,
    /// Port of server 1; server N listens on base + N - 1
    #[arg(long, global = true)]
    pub base_port: Option<u16>,
    /// Override any configuration key, e.g. `--set downloader.patchline=pre-release`
    #[arg(long = "set", global = true, value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub set: Vec<(String, String)>,
}

impl GlobalArgs {
    /// `key=value` pairs for the flag layer, explicit flags last so they win.
    pub fn flag_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = self.set.clone();
        if let Some(dir) = &self.data_dir {
            pairs.push(("data-dir".into(), dir.display().to_string()));
        }
        if let Some(port) = self.base_port {
            pairs.push(("base-port".into(), port.to_string()));
        }
        pairs
    }
}

fn parse_key_val(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Provision a new fleet: dependencies, server files and instances
    Bootstrap(provision::BootstrapArgs),
    /// Show which servers are running
    Status {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },
    /// Start one server or all of them
    Start(fleet::Target),
    /// Stop one server or all of them
    Stop(fleet::Target),
    /// Restart one server or all of them
    Restart(fleet::Target),
    /// Show the recent console output of a server
    Logs {
        ordinal: u32,
        #[arg(long, default_value_t = 50)]
        lines: usize,
    },
    /// Add servers after the current highest one
    ScaleUp(provision::CountArgs),
    /// Remove the highest servers, never the last one
    ScaleDown(provision::CountArgs),
    /// Download the latest server files and copy them into every server
    UpdateGame,
    /// Refresh the default plugin and copy shared mods into every server
    UpdatePlugins,
    /// Host dependency checks
    Deps {
        #[command(subcommand)]
        subcommand: deps::DepsCommands,
    },
    /// Game session tokens and downloader credentials
    Tokens {
        #[command(subcommand)]
        subcommand: tokens::TokensCommands,
    },
    /// World backup policy shared by every server
    Backup {
        #[command(subcommand)]
        subcommand: backup::BackupCommands,
    },
    /// Configuration management commands
    Config {
        #[command(subcommand)]
        subcommand: config_commands::ConfigCommands,
    },
    /// Stop every server and delete all fleet data
    Wipe {
        /// Confirm that all worlds and settings should be deleted
        #[arg(long)]
        yes: bool,
    },
}

impl Cli {
    pub async fn run(self, cancel: &CancellationToken) -> Result<()> {
        let global = self.global;
        match self.command {
            Commands::Config { subcommand } => subcommand.run(&global),
            Commands::Bootstrap(args) => args.run(&global, cancel).await,
            Commands::Status { json } => fleet::status(&global, json).await,
            Commands::Start(target) => target.start(&global).await,
            Commands::Stop(target) => target.stop(&global).await,
            Commands::Restart(target) => target.restart(&global).await,
            Commands::Logs { ordinal, lines } => fleet::logs(&global, ordinal, lines),
            Commands::ScaleUp(args) => args.scale_up(&global, cancel).await,
            Commands::ScaleDown(args) => args.scale_down(&global).await,
            Commands::UpdateGame => provision::update_game(&global, cancel).await,
            Commands::UpdatePlugins => provision::update_plugins(&global, cancel).await,
            Commands::Deps { subcommand } => subcommand.run(cancel).await,
            Commands::Tokens { subcommand } => subcommand.run(&global).await,
            Commands::Backup { subcommand } => subcommand.run(&global),
            Commands::Wipe { yes } => provision::wipe(&global, yes).await,
        }
    }
}

/// Process exit status for a failed command.
pub fn exit_status(err: &anyhow::Error) -> u8 {
    let cancelled = err
        .chain()
        .any(|cause| cause.downcast_ref::<FleetError>().is_some_and(FleetError::is_cancelled));
    if cancelled {
        EXIT_CANCELLED
    } else {
        1
    }
}
