// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Fleet-wide backup policy, `shared/backup.json`.

use crate::error::{FleetError, Result};
use crate::layout::FleetLayout;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const BACKUP_FILE: &str = "backup.json";
pub const MAX_BACKUP_FREQUENCY: u32 = 1440;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupPolicy {
    pub enabled: bool,
    /// Minutes between backups
    pub frequency: u32,
}

impl Default for BackupPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            frequency: 60,
        }
    }
}

impl BackupPolicy {
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_BACKUP_FREQUENCY).contains(&self.frequency) {
            return Err(FleetError::InvalidRequest(format!(
                "backup frequency must be between 1 and {MAX_BACKUP_FREQUENCY} minutes, got {}",
                self.frequency
            )));
        }
        Ok(())
    }

    /// Extra server arguments when backups are on.
    pub fn server_args(&self) -> Vec<String> {
        if self.enabled {
            vec![
                "--backup".to_string(),
                "--backup-frequency".to_string(),
                self.frequency.to_string(),
            ]
        } else {
            Vec::new()
        }
    }
}

pub fn backup_policy_path(layout: &FleetLayout) -> PathBuf {
    layout.shared_dir().join(BACKUP_FILE)
}

/// Stored policy, or the defaults when none has been saved.
pub fn load_backup_policy(layout: &FleetLayout) -> Result<BackupPolicy> {
    let path = backup_policy_path(layout);
    match std::fs::read_to_string(&path) {
        Ok(raw) => serde_json::from_str(&raw).map_err(|source| FleetError::Json { path, source }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BackupPolicy::default()),
        Err(e) => Err(FleetError::io("reading", path)(e)),
    }
}

pub fn save_backup_policy(layout: &FleetLayout, policy: &BackupPolicy) -> Result<()> {
    policy.validate()?;
    crate::write_pretty_json(&backup_policy_path(layout), policy)
}
