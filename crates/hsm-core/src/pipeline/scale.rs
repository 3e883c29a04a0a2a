// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use super::{checkpoint, Outcome, Provisioner};
use crate::error::{FleetError, Result};
use crate::instance_config::{read_instance_config, DesiredSettings};
use crate::layout::{Ordinal, MAX_FLEET_SIZE};
use crate::progress::{Monotonic, ProgressReporter};
use crate::supervisor::ProcessSupervisor;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

impl Provisioner {
    /// Settings for new instances: copied from instance 1 when it has a
    /// readable config, otherwise the configured defaults.
    fn scale_up_settings(&self) -> DesiredSettings {
        match read_instance_config(&self.layout.config_path(Ordinal::FIRST)) {
            Ok(Some(first)) => DesiredSettings {
                server_name: None,
                max_players: Some(first.max_players),
                max_view_radius: Some(first.max_view_radius),
                game_mode: first.game_mode().or(self.defaults.game_mode),
                password: Some(first.password.clone()),
            },
            Ok(None) => self.defaults.clone(),
            Err(e) => {
                warn!(error = %e, "Cannot read server 1 config; using defaults");
                self.defaults.clone()
            }
        }
    }

    /// Append `count` instances after the current highest one.
    ///
    /// Stops early at [`MAX_FLEET_SIZE`]. If some instances were added before
    /// a failure the result is [`Outcome::Partial`]; cancellation is always
    /// an error.
    #[instrument(skip(self, progress, cancel))]
    pub async fn scale_up(
        &self,
        count: u32,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<Outcome> {
        if count == 0 {
            return Err(FleetError::InvalidRequest("nothing to add".into()));
        }
        let survey = self.layout.survey();
        if survey.size == 0 {
            return Err(FleetError::NoInstances);
        }
        if !survey.stray.is_empty() {
            return Err(FleetError::InvalidRequest(format!(
                "instance directories {:?} lie beyond the contiguous fleet of {}; remove them first",
                survey.stray, survey.size
            )));
        }

        let progress = Monotonic::new(progress);
        let settings = self.scale_up_settings();
        let mut added = 0;

        for i in 0..count {
            let next = survey.size + i + 1;
            let result = self.add_one(next, &settings, cancel).await;
            match result {
                Ok(ordinal) => {
                    added += 1;
                    progress.report(
                        f64::from(added) / f64::from(count),
                        &format!("Added server {ordinal}"),
                    );
                }
                Err(FleetError::Cancelled) => return Err(FleetError::Cancelled),
                Err(e) if added == 0 => return Err(e),
                Err(e) => {
                    warn!(error = %e, added, "Scale-up stopped early");
                    return Ok(Outcome::Partial {
                        succeeded: added,
                        attempted: count,
                        message: format!(
                            "Added {added} server(s), fleet size is now {}: {e}",
                            survey.size + added
                        ),
                        warnings: Vec::new(),
                    });
                }
            }
        }

        info!(added, size = survey.size + added, "Scaled up");
        Ok(Outcome::completed(format!(
            "Added {added} server(s), fleet size is now {}",
            survey.size + added
        )))
    }

    async fn add_one(&self, next: u32, settings: &DesiredSettings, cancel: &CancellationToken) -> Result<Ordinal> {
        checkpoint(cancel)?;
        if next > MAX_FLEET_SIZE {
            return Err(FleetError::FleetLimit(MAX_FLEET_SIZE));
        }
        let ordinal = Ordinal::new(next)?;
        if self.layout.port(ordinal) > u32::from(u16::MAX) {
            return Err(FleetError::InvalidRequest(format!(
                "server {ordinal} would need port {}",
                self.layout.port(ordinal)
            )));
        }
        match self.provision_instance(ordinal, settings.clone(), cancel).await {
            Ok(()) => Ok(ordinal),
            Err(FleetError::Cancelled) => Err(FleetError::Cancelled),
            Err(e) => {
                // A half-built directory would still count toward the fleet size
                let dir = self.layout.instance_dir(ordinal);
                if let Err(cleanup) = std::fs::remove_dir_all(&dir) {
                    warn!(ordinal = %ordinal, error = %cleanup, "Could not remove failed server");
                }
                Err(e)
            }
        }
    }

    /// Remove up to `count` of the highest instances, never the last one.
    ///
    /// Each removal stops the instance if it is running (continuing when the
    /// stop fails) and deletes its directory.
    #[instrument(skip(self, supervisor))]
    pub fn scale_down(&self, supervisor: &ProcessSupervisor, count: u32) -> Result<Outcome> {
        if count == 0 {
            return Err(FleetError::InvalidRequest("nothing to remove".into()));
        }
        let mut size = self.layout.fleet_size();
        if size <= 1 {
            return Err(FleetError::LastInstance);
        }

        let mut removed = 0;
        let mut warnings = Vec::new();
        while removed < count {
            if size <= 1 {
                warnings.push("kept the last remaining server".to_string());
                break;
            }
            let ordinal = Ordinal::new(size)?;
            if supervisor.has_session(ordinal) {
                if let Err(e) = supervisor.stop(ordinal) {
                    warn!(ordinal = %ordinal, error = %e, "Stop failed; removing anyway");
                    warnings.push(format!("server {ordinal} did not stop cleanly: {e}"));
                }
            }
            let dir = self.layout.instance_dir(ordinal);
            std::fs::remove_dir_all(&dir).map_err(FleetError::io("removing", &dir))?;
            info!(ordinal = %ordinal, "Removed server");
            removed += 1;
            size -= 1;
        }

        Ok(Outcome::Completed {
            message: format!("Removed {removed} server(s), fleet size is now {size}"),
            warnings,
        })
    }
}
