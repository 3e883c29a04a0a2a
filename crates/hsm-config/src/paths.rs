// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Configuration file path discovery

use std::path::PathBuf;

const APP_DIR: &str = "hytale-server-manager";

/// Configuration file paths for different scopes
#[derive(Debug, Clone)]
pub struct Paths {
    pub system: PathBuf,
    pub user: PathBuf,
    pub cli_config: Option<PathBuf>,
}

impl Paths {
    pub fn with_cli_config(mut self, path: Option<PathBuf>) -> Self {
        self.cli_config = path;
        self
    }
}

/// Discover configuration file paths for the current environment
pub fn discover_paths() -> Paths {
    Paths {
        system: system_config_path(),
        user: user_config_path(),
        cli_config: None,
    }
}

fn system_config_path() -> PathBuf {
    std::env::var_os("HSM_SYSTEM_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/etc").join(APP_DIR).join("config.toml"))
}

/// `HSM_USER_CONFIG`, then `HSM_HOME/config.toml`, then the XDG location.
fn user_config_path() -> PathBuf {
    if let Some(path) = std::env::var_os("HSM_USER_CONFIG") {
        return PathBuf::from(path);
    }
    if let Some(home) = std::env::var_os("HSM_HOME") {
        return PathBuf::from(home).join("config.toml");
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(APP_DIR)
        .join("config.toml")
}
