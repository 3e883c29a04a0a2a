// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only
#![allow(clippy::disallowed_methods)] // CLI commands intentionally print to stdout/stderr

//! Configuration management commands
use crate::context::resolve_config;
use crate::GlobalArgs;
use anyhow::Result;
use clap::Subcommand;
use hsm_config::Scope;
use serde_json::Value;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the merged configuration
    Show {
        /// Show which layer supplied each value
        #[arg(long)]
        explain: bool,
    },
}

impl ConfigCommands {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        match self {
            ConfigCommands::Show { explain } => show_config(global, explain),
        }
    }
}

fn show_config(global: &GlobalArgs, explain: bool) -> Result<()> {
    let resolved = resolve_config(global)?;
    // Reject a broken merge before printing it
    resolved.config()?;

    if !explain {
        println!("{}", serde_json::to_string_pretty(&resolved.json)?);
        return Ok(());
    }

    let mut leaves = Vec::new();
    flatten(&resolved.json, String::new(), &mut leaves);
    for (key, value) in leaves {
        let scope = resolved
            .provenance
            .winner
            .get(&key)
            .copied()
            .unwrap_or(Scope::Default);
        println!("{key} = {value} (from {scope})");
    }
    Ok(())
}

/// Dotted key paths to scalar and array values.
fn flatten(value: &Value, prefix: String, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let key = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{prefix}.{k}")
                };
                flatten(v, key, out);
            }
        }
        other => out.push((prefix, other.clone())),
    }
}
