// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! TOML loading

use crate::error::{ConfigError, Result};
use crate::provenance::Scope;
use serde_json::Value as J;
use std::path::Path;

/// Represents a loaded configuration layer
#[derive(Debug, Clone)]
pub struct Layer {
    pub scope: Scope,
    pub json: J,
}

/// Parse TOML text into the JSON shape used for merging.
pub fn parse_toml_to_json(toml_str: &str) -> std::result::Result<J, toml::de::Error> {
    let table: toml::Table = toml_str.parse()?;
    // Datetimes are the only TOML values without a JSON form; they serialize as strings
    Ok(serde_json::to_value(table).unwrap_or(J::Null))
}

pub fn read_layer_from_file(path: &Path, scope: Scope) -> Result<Layer> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let json = parse_toml_to_json(&content).map_err(|source| ConfigError::Toml {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Layer { scope, json })
}

/// Reads the layer when the file exists. A missing file is simply no layer.
pub fn read_optional_layer(path: &Path, scope: Scope) -> Result<Option<Layer>> {
    if path.exists() {
        read_layer_from_file(path, scope).map(Some)
    } else {
        Ok(None)
    }
}
