// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Layered configuration for the Hytale server manager.
//!
//! Layers are read as JSON, merged in precedence order and only then turned
//! into [`ManagerConfig`], so every layer may be partial and provenance can
//! name the layer that set each key.

pub mod env;
pub mod error;
pub mod extract;
pub mod loader;
pub mod merge;
pub mod paths;
pub mod provenance;
pub mod types;

pub use error::{ConfigError, Result};
pub use paths::{discover_paths, Paths};
pub use provenance::{Provenance, Scope};
pub use types::*;

use serde_json::Value as J;
use tracing::debug;

/// Final resolved configuration with provenance information
#[derive(Debug)]
pub struct Resolved {
    /// Final merged JSON configuration, defaults included
    pub json: J,
    pub provenance: Provenance,
}

impl Resolved {
    /// Typed, validated configuration.
    pub fn config(&self) -> Result<ManagerConfig> {
        let cfg: ManagerConfig = extract::get(&self.json)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Load and merge all configuration layers according to precedence rules
///
/// Precedence order: defaults < system < user < env < cli-config < flags
pub fn load_all(paths: &Paths, flag_sets: &[(&str, &str)]) -> Result<Resolved> {
    let mut prov = Provenance::default();
    let mut json = serde_json::to_value(ManagerConfig::default())?;
    prov.record_layer(&json, Scope::Default);

    let system_layer = loader::read_optional_layer(&paths.system, Scope::System)?;
    let user_layer = loader::read_optional_layer(&paths.user, Scope::User)?;
    let env_layer = env::env_overlay()?;
    // An explicit --config file must exist
    let cli_config_layer = match &paths.cli_config {
        Some(path) => Some(loader::read_layer_from_file(path, Scope::CliConfig)?),
        None => None,
    };
    let flags_layer = env::flags_overlay(flag_sets);

    let layers = [
        (system_layer.as_ref().map(|l| &l.json), Scope::System),
        (user_layer.as_ref().map(|l| &l.json), Scope::User),
        (Some(&env_layer), Scope::Env),
        (cli_config_layer.as_ref().map(|l| &l.json), Scope::CliConfig),
        (Some(&flags_layer), Scope::Flags),
    ];

    for (layer, scope) in layers {
        if let Some(layer) = layer {
            debug!(%scope, "Merging configuration layer");
            merge::merge_two_json(&mut json, layer.clone());
            prov.record_layer(layer, scope);
        }
    }

    Ok(Resolved {
        json,
        provenance: prov,
    })
}
