// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Where everything lives.
//!
//! All path, port, hostname and session-name formulas are defined here and
//! nowhere else. Fleet membership is the directory tree itself: instance `N`
//! exists when `server-N/` exists, and the fleet is the contiguous run of
//! such directories starting at 1.

use crate::error::{FleetError, Result};
use hsm_config::ManagerConfig;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const MAX_FLEET_SIZE: u32 = 100;

pub const MASTER_DIR: &str = "master-install";
pub const SHARED_DIR: &str = "shared";
pub const MODS_DIR: &str = "mods";
pub const INSTANCE_DIR_PREFIX: &str = "server-";
pub const INSTANCE_CONFIG_FILE: &str = "config.json";
pub const FLEET_FILE: &str = "fleet.json";
pub const SERVER_SUBDIR: &str = "Server";
pub const SERVER_JAR: &str = "HytaleServer.jar";
pub const ASSETS_ARCHIVE: &str = "Assets.zip";

/// 1-based instance number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Ordinal(NonZeroU32);

impl Ordinal {
    pub const FIRST: Ordinal = Ordinal(NonZeroU32::MIN);

    pub fn new(n: u32) -> Result<Self> {
        NonZeroU32::new(n)
            .map(Ordinal)
            .ok_or(FleetError::InvalidOrdinal(n))
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// Ordinals `1..=count`.
    pub fn up_to(count: u32) -> impl DoubleEndedIterator<Item = Ordinal> {
        (1..=count).filter_map(NonZeroU32::new).map(Ordinal)
    }
}

impl std::fmt::Display for Ordinal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<u32> for Ordinal {
    type Error = FleetError;

    fn try_from(n: u32) -> Result<Self> {
        Ordinal::new(n)
    }
}

/// Settings fixed at bootstrap so that later runs compute the same ports and
/// hostnames even if the configuration defaults change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FleetIdentity {
    pub base_port: u16,
    pub hostname_prefix: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FleetLayout {
    data_dir: PathBuf,
    base_port: u16,
    hostname_prefix: String,
    session_prefix: String,
}

/// Result of scanning the data directory for instance directories.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FleetSurvey {
    /// Length of the contiguous run `server-1..=server-size`
    pub size: u32,
    /// Instance directories beyond the contiguous run
    pub stray: Vec<u32>,
}

impl FleetLayout {
    pub fn new(
        data_dir: impl Into<PathBuf>,
        base_port: u16,
        hostname_prefix: impl Into<String>,
        session_prefix: impl Into<String>,
    ) -> Self {
        Self {
            data_dir: data_dir.into(),
            base_port,
            hostname_prefix: hostname_prefix.into(),
            session_prefix: session_prefix.into(),
        }
    }

    /// Layout from configuration, with a recorded fleet identity taking
    /// precedence for port and hostname.
    pub fn resolve(config: &ManagerConfig) -> Result<Self> {
        let layout = Self::new(
            &config.data_dir,
            config.base_port,
            &config.hostname_prefix,
            &config.session_prefix,
        );
        Ok(match layout.read_identity()? {
            Some(identity) => layout.with_identity(&identity),
            None => layout,
        })
    }

    pub fn with_identity(mut self, identity: &FleetIdentity) -> Self {
        self.base_port = identity.base_port;
        self.hostname_prefix = identity.hostname_prefix.clone();
        self
    }

    pub fn identity(&self) -> FleetIdentity {
        FleetIdentity {
            base_port: self.base_port,
            hostname_prefix: self.hostname_prefix.clone(),
        }
    }

    pub fn read_identity(&self) -> Result<Option<FleetIdentity>> {
        let path = self.fleet_file();
        match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| FleetError::Json { path, source }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FleetError::io("reading", path)(e)),
        }
    }

    pub fn write_identity(&self) -> Result<()> {
        let path = self.fleet_file();
        crate::write_pretty_json(&path, &self.identity())
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn base_port(&self) -> u16 {
        self.base_port
    }

    pub fn session_prefix(&self) -> &str {
        &self.session_prefix
    }

    pub fn master_dir(&self) -> PathBuf {
        self.data_dir.join(MASTER_DIR)
    }

    pub fn shared_dir(&self) -> PathBuf {
        self.data_dir.join(SHARED_DIR)
    }

    pub fn mods_dir(&self) -> PathBuf {
        self.shared_dir().join(MODS_DIR)
    }

    pub fn fleet_file(&self) -> PathBuf {
        self.data_dir.join(FLEET_FILE)
    }

    /// Canonical location of the server jar inside the master install.
    pub fn server_jar(&self) -> PathBuf {
        self.master_dir().join(SERVER_SUBDIR).join(SERVER_JAR)
    }

    pub fn instance_dir(&self, ordinal: Ordinal) -> PathBuf {
        self.data_dir.join(format!("{INSTANCE_DIR_PREFIX}{ordinal}"))
    }

    pub fn config_path(&self, ordinal: Ordinal) -> PathBuf {
        self.instance_dir(ordinal).join(INSTANCE_CONFIG_FILE)
    }

    pub fn session_name(&self, ordinal: Ordinal) -> String {
        format!("{}-{ordinal}", self.session_prefix)
    }

    pub fn hostname(&self, ordinal: Ordinal) -> String {
        format!("{}-{ordinal}", self.hostname_prefix)
    }

    /// `base_port + ordinal - 1`. Wider than `u16` so large ordinals cannot
    /// wrap; bootstrap rejects fleets whose ports leave the valid range.
    pub fn port(&self, ordinal: Ordinal) -> u32 {
        u32::from(self.base_port) + ordinal.get() - 1
    }

    pub fn bind_address(&self, ordinal: Ordinal) -> String {
        format!("0.0.0.0:{}", self.port(ordinal))
    }

    pub fn instance_exists(&self, ordinal: Ordinal) -> bool {
        self.instance_dir(ordinal).is_dir()
    }

    /// Scan the data directory for instance directories.
    pub fn survey(&self) -> FleetSurvey {
        let size = Ordinal::up_to(u32::MAX)
            .take_while(|o| self.instance_exists(*o))
            .count() as u32;

        let mut stray: Vec<u32> = std::fs::read_dir(&self.data_dir)
            .into_iter()
            .flatten()
            .flatten()
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .and_then(|name| name.strip_prefix(INSTANCE_DIR_PREFIX))
                    .and_then(|n| n.parse::<u32>().ok())
            })
            .filter(|n| *n > size)
            .collect();
        stray.sort_unstable();

        FleetSurvey { size, stray }
    }

    /// Number of contiguous instances starting at 1.
    pub fn fleet_size(&self) -> u32 {
        let survey = self.survey();
        if !survey.stray.is_empty() {
            warn!(
                size = survey.size,
                stray = ?survey.stray,
                "Ignoring instance directories beyond the contiguous fleet"
            );
        }
        survey.size
    }
}
