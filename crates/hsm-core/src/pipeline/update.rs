// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use super::{checkpoint, Outcome, Provisioner};
use crate::error::{FleetError, Result};
use crate::layout::Ordinal;
use crate::progress::{Monotonic, ProgressReporter, Scaled};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

impl Provisioner {
    /// Download the latest server files into the master install and copy
    /// them, with the shared overlay, into every instance. Instance configs
    /// are not rewritten.
    #[instrument(skip_all)]
    pub async fn update_game(
        &self,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<Outcome> {
        let size = self.layout.fleet_size();
        if size == 0 {
            return Err(FleetError::NoInstances);
        }
        let progress = Monotonic::new(progress);
        let mut warnings = Vec::new();

        checkpoint(cancel)?;
        self.acquire_payload(&Scaled::new(&progress, 0.0, 0.5), cancel, &mut warnings)
            .await?;
        crate::downloader::verify_payload(&self.layout.master_dir())?;

        let step = 0.5 / f64::from(size);
        for ordinal in Ordinal::up_to(size) {
            checkpoint(cancel)?;
            let done = f64::from(ordinal.get() - 1);
            progress.report(0.5 + step * done, &format!("Updating server {ordinal} of {size}"));
            self.refresh_instance(ordinal, true, cancel).await?;
        }
        progress.report(1.0, "Update complete");

        info!(size, "Updated fleet from master install");
        Ok(Outcome::Completed {
            message: format!("Updated {size} server(s) from master-install"),
            warnings,
        })
    }

    /// Refresh the default extension in the shared overlay and propagate the
    /// overlay to every instance. A failed install or a failed copy into one
    /// instance does not stop the run.
    #[instrument(skip_all)]
    pub async fn update_plugins(
        &self,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<Outcome> {
        let progress = Monotonic::new(progress);
        let mut warnings = Vec::new();
        let mods = self.layout.mods_dir();
        std::fs::create_dir_all(&mods).map_err(FleetError::io("creating", &mods))?;

        checkpoint(cancel)?;
        match &self.extension {
            Some(extension) => {
                let scaled = Scaled::new(&progress, 0.0, 0.5);
                match extension.install(&self.layout.shared_dir(), &scaled, cancel).await {
                    Ok(_) => {}
                    Err(FleetError::Cancelled) => return Err(FleetError::Cancelled),
                    Err(e) => {
                        warn!(error = %e, "Default extension not updated");
                        warnings.push(format!("default extension not updated: {e}"));
                    }
                }
            }
            None => warnings.push("default extension disabled; propagating existing mods".into()),
        }

        let size = self.layout.fleet_size();
        if size == 0 {
            progress.report(1.0, "No servers to update");
            return Ok(Outcome::Completed {
                message: "Plugins updated in shared directory (no servers to update)".into(),
                warnings,
            });
        }

        let step = 0.5 / f64::from(size);
        let mut updated = 0;
        for ordinal in Ordinal::up_to(size) {
            checkpoint(cancel)?;
            progress.report(
                0.5 + step * f64::from(ordinal.get() - 1),
                &format!("Copying plugins to server {ordinal}"),
            );
            match self.refresh_instance(ordinal, false, cancel).await {
                Ok(()) => updated += 1,
                Err(FleetError::Cancelled) => return Err(FleetError::Cancelled),
                Err(e) => {
                    warn!(ordinal = %ordinal, error = %e, "Failed to copy plugins");
                    warnings.push(format!("server {ordinal}: {e}"));
                }
            }
        }
        progress.report(1.0, "Plugins propagated");

        let message = format!("Plugins updated: {updated}/{size} servers updated");
        if updated < size {
            return Ok(Outcome::Partial {
                succeeded: updated,
                attempted: size,
                message,
                warnings,
            });
        }
        Ok(Outcome::Completed { message, warnings })
    }
}
