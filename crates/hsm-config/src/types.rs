// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Typed view of the merged configuration

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_DATA_DIR: &str = "/var/lib/hytale";
pub const DEFAULT_BASE_PORT: u16 = 5520;
pub const DEFAULT_HOSTNAME_PREFIX: &str = "hytale";
pub const DEFAULT_SESSION_PREFIX: &str = "hytale-server";
pub const DEFAULT_MAX_PLAYERS: u32 = 100;
pub const DEFAULT_MAX_VIEW_RADIUS: u32 = 12;
pub const MAX_VIEW_RADIUS: u32 = 32;
pub const MIN_BASE_PORT: u16 = 1024;

/// In-game default mode written to `Defaults.GameMode`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameMode {
    #[default]
    Adventure,
    Survival,
    Creative,
}

impl GameMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameMode::Adventure => "Adventure",
            GameMode::Survival => "Survival",
            GameMode::Creative => "Creative",
        }
    }
}

impl std::fmt::Display for GameMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GameMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "adventure" => Ok(GameMode::Adventure),
            "survival" => Ok(GameMode::Survival),
            "creative" => Ok(GameMode::Creative),
            _ => Err(format!(
                "invalid game mode '{s}': expected Adventure, Survival or Creative"
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ManagerConfig {
    pub data_dir: PathBuf,
    pub base_port: u16,
    pub hostname_prefix: String,
    pub session_prefix: String,
    /// Java launcher used for every instance
    pub java: String,
    pub jvm_args: Vec<String>,
    pub max_players: u32,
    pub max_view_radius: u32,
    pub game_mode: GameMode,
    pub stop_grace_secs: u64,
    pub downloader: DownloaderSettings,
    pub extension: ExtensionSettings,
    pub auth: AuthSettings,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            base_port: DEFAULT_BASE_PORT,
            hostname_prefix: DEFAULT_HOSTNAME_PREFIX.to_string(),
            session_prefix: DEFAULT_SESSION_PREFIX.to_string(),
            java: "java".to_string(),
            jvm_args: ["-Xms4G", "-Xmx8G", "-XX:+UseG1GC"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_players: DEFAULT_MAX_PLAYERS,
            max_view_radius: DEFAULT_MAX_VIEW_RADIUS,
            game_mode: GameMode::default(),
            stop_grace_secs: 2,
            downloader: DownloaderSettings::default(),
            extension: ExtensionSettings::default(),
            auth: AuthSettings::default(),
        }
    }
}

impl ManagerConfig {
    /// Range checks that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.base_port < MIN_BASE_PORT {
            return Err(ConfigError::Invalid(format!(
                "base-port {} is below {MIN_BASE_PORT}",
                self.base_port
            )));
        }
        if !(1..=MAX_VIEW_RADIUS).contains(&self.max_view_radius) {
            return Err(ConfigError::Invalid(format!(
                "max-view-radius {} must be between 1 and {MAX_VIEW_RADIUS}",
                self.max_view_radius
            )));
        }
        if self.max_players == 0 {
            return Err(ConfigError::Invalid("max-players must be at least 1".into()));
        }
        if self.hostname_prefix.is_empty() || self.session_prefix.is_empty() {
            return Err(ConfigError::Invalid(
                "hostname-prefix and session-prefix must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DownloaderSettings {
    pub archive_url: String,
    pub install_path: PathBuf,
    pub patchline: String,
}

impl Default for DownloaderSettings {
    fn default() -> Self {
        Self {
            archive_url: "https://downloader.hytale.com/hytale-downloader.zip".to_string(),
            install_path: PathBuf::from("/usr/local/bin/hytale-downloader"),
            patchline: "production".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExtensionSettings {
    pub enabled: bool,
    /// GitHub `owner/name` of the default server plugin
    pub repository: String,
}

impl Default for ExtensionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            repository: "nitrado/hytale-plugin-performance-saver".to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AuthSettings {
    /// Base URL of the game-session service; token refresh is unavailable when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_endpoint: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ManagerConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.base_port, 5520);
        assert_eq!(cfg.jvm_args, vec!["-Xms4G", "-Xmx8G", "-XX:+UseG1GC"]);
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        let low_port = ManagerConfig {
            base_port: 80,
            ..Default::default()
        };
        assert!(low_port.validate().is_err());

        let radius = ManagerConfig {
            max_view_radius: 33,
            ..Default::default()
        };
        assert!(radius.validate().is_err());
    }

    #[test]
    fn game_mode_parsing() {
        assert_eq!("creative".parse::<GameMode>().unwrap(), GameMode::Creative);
        assert_eq!("Survival".parse::<GameMode>().unwrap(), GameMode::Survival);
        assert!("hardcore".parse::<GameMode>().is_err());
    }
}
