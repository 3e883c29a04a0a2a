// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only
#![allow(clippy::disallowed_methods)] // CLI commands intentionally print to stdout/stderr

use crate::context::Context;
use crate::GlobalArgs;
use anyhow::Result;
use clap::Subcommand;
use hsm_core::{load_backup_policy, save_backup_policy, BackupPolicy};

#[derive(Subcommand)]
pub enum BackupCommands {
    /// Show the current backup policy
    Show,
    /// Change the backup policy; running servers pick it up on restart
    Set {
        #[arg(long, conflicts_with = "disable")]
        enable: bool,
        #[arg(long)]
        disable: bool,
        /// Minutes between backups
        #[arg(long)]
        frequency: Option<u32>,
    },
}

impl BackupCommands {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let ctx = Context::load(global)?;
        let mut policy = load_backup_policy(&ctx.layout)?;
        match self {
            BackupCommands::Show => println!("{}", describe(&policy)),
            BackupCommands::Set {
                enable,
                disable,
                frequency,
            } => {
                if enable {
                    policy.enabled = true;
                }
                if disable {
                    policy.enabled = false;
                }
                if let Some(minutes) = frequency {
                    policy.frequency = minutes;
                }
                save_backup_policy(&ctx.layout, &policy)?;
                println!("{}", describe(&policy));
            }
        }
        Ok(())
    }
}

fn describe(policy: &BackupPolicy) -> String {
    if policy.enabled {
        format!("Backups enabled every {} minute(s)", policy.frequency)
    } else {
        "Backups disabled".to_string()
    }
}
