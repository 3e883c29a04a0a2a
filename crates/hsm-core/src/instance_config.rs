// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Per-instance `config.json`.
//!
//! Updates merge into the existing document: only the fields the caller
//! supplies change, tuning fields that are still zero get their baseline
//! value, and keys this crate does not know about are written back verbatim.

use crate::error::{FleetError, Result};
use crate::layout::{FleetLayout, Ordinal};
use hsm_config::GameMode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

pub const CONFIG_VERSION: u32 = 3;
pub const DEFAULT_WORLD: &str = "default";
pub const BASELINE_VIEW_RADIUS: u32 = 12;
pub const BASELINE_ENTITIES_PER_CHUNK: u32 = 50;
pub const BASELINE_MOB_SPAWN_LIMIT: u32 = 100;
pub const BASELINE_ITEM_DESPAWN_SECS: u32 = 300;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WorldDefaults {
    #[serde(default)]
    pub world: String,
    #[serde(default)]
    pub game_mode: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConnectionTimeouts {
    #[serde(default)]
    pub join_timeouts: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StoreSettings {
    #[serde(default, rename = "Type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The game server's own configuration document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceConfig {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub server_name: String,
    #[serde(default, rename = "MOTD")]
    pub motd: String,
    /// Join password; empty means public
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(default)]
    pub max_players: u32,
    #[serde(default)]
    pub max_view_radius: u32,
    #[serde(default)]
    pub max_entities_per_chunk: u32,
    #[serde(default)]
    pub mob_spawn_limit: u32,
    /// Seconds before dropped items vanish
    #[serde(default)]
    pub item_despawn_time: u32,
    #[serde(default)]
    pub defaults: WorldDefaults,
    #[serde(default)]
    pub connection_timeouts: ConnectionTimeouts,
    #[serde(default)]
    pub rate_limit: Map<String, Value>,
    #[serde(default)]
    pub modules: Map<String, Value>,
    #[serde(default)]
    pub log_levels: Map<String, Value>,
    #[serde(default)]
    pub mods: Map<String, Value>,
    #[serde(default)]
    pub display_tmp_tags_in_strings: bool,
    #[serde(default)]
    pub player_storage: StoreSettings,
    #[serde(default)]
    pub auth_credential_store: StoreSettings,
    /// Keys written by the game or by hand
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Fields a caller wants set. `None` (or an empty string) leaves the stored
/// value alone when merging into an existing document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DesiredSettings {
    pub server_name: Option<String>,
    pub max_players: Option<u32>,
    pub max_view_radius: Option<u32>,
    pub game_mode: Option<GameMode>,
    pub password: Option<String>,
}

impl InstanceConfig {
    /// Baseline document for a fresh instance.
    pub fn baseline(server_name: &str) -> Self {
        Self {
            version: CONFIG_VERSION,
            server_name: server_name.to_string(),
            motd: format!("Welcome to {server_name}"),
            password: String::new(),
            max_players: hsm_config::DEFAULT_MAX_PLAYERS,
            max_view_radius: BASELINE_VIEW_RADIUS,
            max_entities_per_chunk: BASELINE_ENTITIES_PER_CHUNK,
            mob_spawn_limit: BASELINE_MOB_SPAWN_LIMIT,
            item_despawn_time: BASELINE_ITEM_DESPAWN_SECS,
            defaults: WorldDefaults {
                world: DEFAULT_WORLD.to_string(),
                game_mode: GameMode::default().to_string(),
                extra: Map::new(),
            },
            connection_timeouts: ConnectionTimeouts::default(),
            rate_limit: Map::new(),
            modules: Map::new(),
            log_levels: Map::new(),
            mods: Map::new(),
            display_tmp_tags_in_strings: false,
            player_storage: StoreSettings {
                kind: "Hytale".to_string(),
                ..Default::default()
            },
            auth_credential_store: StoreSettings {
                kind: "Encrypted".to_string(),
                path: "auth.enc".to_string(),
                extra: Map::new(),
            },
            extra: Map::new(),
        }
    }

    pub fn apply(&mut self, desired: &DesiredSettings) {
        if let Some(name) = &desired.server_name {
            self.server_name = name.clone();
        }
        if let Some(max_players) = desired.max_players {
            self.max_players = max_players;
        }
        if let Some(radius) = desired.max_view_radius {
            self.max_view_radius = radius;
        }
        if let Some(password) = desired.password.as_deref().filter(|p| !p.is_empty()) {
            self.password = password.to_string();
        }
        if let Some(mode) = desired.game_mode {
            self.defaults.game_mode = mode.to_string();
        }
    }

    /// Give unset tuning fields their baseline value; set ones stay.
    pub fn backfill(&mut self) {
        fn fill(field: &mut u32, baseline: u32) {
            if *field == 0 {
                *field = baseline;
            }
        }
        fill(&mut self.version, CONFIG_VERSION);
        fill(&mut self.max_view_radius, BASELINE_VIEW_RADIUS);
        fill(&mut self.max_entities_per_chunk, BASELINE_ENTITIES_PER_CHUNK);
        fill(&mut self.mob_spawn_limit, BASELINE_MOB_SPAWN_LIMIT);
        fill(&mut self.item_despawn_time, BASELINE_ITEM_DESPAWN_SECS);
        if self.defaults.world.is_empty() {
            self.defaults.world = DEFAULT_WORLD.to_string();
        }
        if self.defaults.game_mode.is_empty() {
            self.defaults.game_mode = GameMode::default().to_string();
        }
    }

    /// Recorded game mode, if it is one we recognise.
    pub fn game_mode(&self) -> Option<GameMode> {
        self.defaults.game_mode.parse().ok()
    }
}

/// Existing document, or `None` when the file does not exist.
pub fn read_instance_config(path: &Path) -> Result<Option<InstanceConfig>> {
    match std::fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| FleetError::Json {
                path: path.to_path_buf(),
                source,
            }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(FleetError::io("reading", path)(e)),
    }
}

pub fn write_instance_config(path: &Path, config: &InstanceConfig) -> Result<()> {
    crate::write_pretty_json(path, config)
}

/// Create or update the config of instance `ordinal`.
///
/// A missing document starts from [`InstanceConfig::baseline`] named after
/// the instance hostname. A document that exists but does not parse is an
/// error rather than something to overwrite.
pub fn materialize_instance_config(
    layout: &FleetLayout,
    ordinal: Ordinal,
    desired: &DesiredSettings,
) -> Result<InstanceConfig> {
    let path = layout.config_path(ordinal);
    let config = match read_instance_config(&path)? {
        Some(mut existing) => {
            existing.apply(desired);
            existing.backfill();
            existing
        }
        None => {
            let name = desired
                .server_name
                .clone()
                .unwrap_or_else(|| layout.hostname(ordinal));
            let mut fresh = InstanceConfig::baseline(&name);
            fresh.apply(desired);
            fresh
        }
    };
    write_instance_config(&path, &config)?;
    debug!(ordinal = %ordinal, path = %path.display(), "Wrote instance config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn layout(dir: &TempDir) -> FleetLayout {
        FleetLayout::new(dir.path(), 5520, "hytale", "hytale-server")
    }

    fn bootstrap_settings(name: &str) -> DesiredSettings {
        DesiredSettings {
            server_name: Some(name.to_string()),
            max_players: Some(40),
            max_view_radius: Some(12),
            game_mode: Some(GameMode::Survival),
            password: Some(String::new()),
        }
    }

    #[test]
    fn fresh_config_uses_baseline_and_desired_fields() {
        let dir = TempDir::new().unwrap();
        let l = layout(&dir);
        std::fs::create_dir_all(l.instance_dir(Ordinal::FIRST)).unwrap();

        let cfg =
            materialize_instance_config(&l, Ordinal::FIRST, &bootstrap_settings("hytale-1")).unwrap();
        assert_eq!(cfg.server_name, "hytale-1");
        assert_eq!(cfg.motd, "Welcome to hytale-1");
        assert_eq!(cfg.max_players, 40);
        assert_eq!(cfg.defaults.game_mode, "Survival");
        assert_eq!(cfg.mob_spawn_limit, 100);

        let raw = std::fs::read_to_string(l.config_path(Ordinal::FIRST)).unwrap();
        let doc: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc["Version"], 3);
        assert_eq!(doc["AuthCredentialStore"], json!({"Type": "Encrypted", "Path": "auth.enc"}));
        assert!(doc.get("Password").is_none());
        assert!(raw.starts_with("{\n  \"Version\""));
    }

    #[test]
    fn unrelated_update_keeps_customized_tuning() {
        let dir = TempDir::new().unwrap();
        let l = layout(&dir);
        let ord = Ordinal::FIRST;
        std::fs::create_dir_all(l.instance_dir(ord)).unwrap();
        materialize_instance_config(&l, ord, &bootstrap_settings("hytale-1")).unwrap();

        let mut cfg = read_instance_config(&l.config_path(ord)).unwrap().unwrap();
        cfg.max_view_radius = 20;
        cfg.mob_spawn_limit = 40;
        write_instance_config(&l.config_path(ord), &cfg).unwrap();

        let updated = materialize_instance_config(
            &l,
            ord,
            &DesiredSettings {
                password: Some("hunter2".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.password, "hunter2");
        assert_eq!(updated.max_view_radius, 20);
        assert_eq!(updated.mob_spawn_limit, 40);
        assert_eq!(updated.server_name, "hytale-1");
    }

    #[test]
    fn empty_password_and_missing_mode_do_not_overwrite() {
        let mut cfg = InstanceConfig::baseline("hytale-2");
        cfg.password = "secret".into();
        cfg.defaults.game_mode = "Creative".into();
        cfg.apply(&DesiredSettings {
            password: Some(String::new()),
            game_mode: None,
            ..Default::default()
        });
        assert_eq!(cfg.password, "secret");
        assert_eq!(cfg.game_mode(), Some(GameMode::Creative));
    }

    #[test]
    fn zero_fields_are_backfilled_and_unknown_keys_survive() {
        let dir = TempDir::new().unwrap();
        let l = layout(&dir);
        let ord = Ordinal::new(2).unwrap();
        std::fs::create_dir_all(l.instance_dir(ord)).unwrap();
        std::fs::write(
            l.config_path(ord),
            r#"{
              "ServerName": "old",
              "MaxPlayers": 10,
              "MobSpawnLimit": 0,
              "Defaults": { "World": "arena", "Difficulty": "Hard" },
              "Backup": { "Keep": 5 }
            }"#,
        )
        .unwrap();

        let cfg = materialize_instance_config(
            &l,
            ord,
            &DesiredSettings {
                server_name: Some("hytale-2".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(cfg.server_name, "hytale-2");
        assert_eq!(cfg.max_players, 10);
        assert_eq!(cfg.mob_spawn_limit, BASELINE_MOB_SPAWN_LIMIT);
        assert_eq!(cfg.max_view_radius, BASELINE_VIEW_RADIUS);
        assert_eq!(cfg.defaults.world, "arena");
        assert_eq!(cfg.defaults.game_mode, "Adventure");

        let doc: Value =
            serde_json::from_str(&std::fs::read_to_string(l.config_path(ord)).unwrap()).unwrap();
        assert_eq!(doc["Backup"], json!({"Keep": 5}));
        assert_eq!(doc["Defaults"]["Difficulty"], "Hard");
    }

    #[test]
    fn corrupt_config_is_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let l = layout(&dir);
        std::fs::create_dir_all(l.instance_dir(Ordinal::FIRST)).unwrap();
        std::fs::write(l.config_path(Ordinal::FIRST), "{ not json").unwrap();

        let err = materialize_instance_config(&l, Ordinal::FIRST, &DesiredSettings::default())
            .unwrap_err();
        assert!(matches!(err, FleetError::Json { .. }));
        assert_eq!(
            std::fs::read_to_string(l.config_path(Ordinal::FIRST)).unwrap(),
            "{ not json"
        );
    }
}
