// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use super::{Outcome, Provisioner};
use crate::error::{FleetError, Result};
use crate::supervisor::ProcessSupervisor;
use tracing::{info, warn};

impl Provisioner {
    /// Stop every server and delete the whole data directory. Irreversible.
    pub fn wipe(&self, supervisor: &ProcessSupervisor) -> Result<Outcome> {
        let mut warnings = Vec::new();

        let report = supervisor.stop_all(self.layout.fleet_size());
        for (ordinal, e) in &report.failed {
            warnings.push(format!("server {ordinal} did not stop cleanly: {e}"));
        }
        match supervisor.kill_all_sessions() {
            Ok(killed) if !killed.is_empty() => info!(?killed, "Killed leftover sessions"),
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Could not list sessions");
                warnings.push(format!("could not clean up sessions: {e}"));
            }
        }

        let data = self.layout.data_dir();
        if data.exists() {
            std::fs::remove_dir_all(data).map_err(FleetError::io("removing", data))?;
        }
        info!(path = %data.display(), "Wiped fleet data");
        Ok(Outcome::Completed {
            message: format!("All server data under {} has been deleted", data.display()),
            warnings,
        })
    }
}
