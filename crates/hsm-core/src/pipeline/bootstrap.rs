// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use super::{checkpoint, Outcome, Provisioner};
use crate::backup::{save_backup_policy, BackupPolicy};
use crate::error::{FleetError, Result};
use crate::instance_config::DesiredSettings;
use crate::layout::{Ordinal, MAX_FLEET_SIZE};
use crate::progress::{Monotonic, ProgressReporter, Scaled};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// What a first-time provisioning run should produce.
#[derive(Clone, Debug, PartialEq)]
pub struct BootstrapRequest {
    pub count: u32,
    /// Capacity, game mode and password stamped into every instance
    pub settings: DesiredSettings,
    pub backup: BackupPolicy,
}

impl BootstrapRequest {
    pub fn new(count: u32) -> Self {
        Self {
            count,
            settings: DesiredSettings::default(),
            backup: BackupPolicy::default(),
        }
    }
}

// Stage boundaries on the overall [0, 1] scale
const SKELETON_END: f64 = 0.05;
const DEPENDENCIES_END: f64 = 0.10;
const EXTENSION_END: f64 = 0.20;
const PAYLOAD_END: f64 = 0.55;
const INSTANCES_END: f64 = 0.95;

impl Provisioner {
    fn validate_bootstrap(&self, request: &BootstrapRequest) -> Result<()> {
        if !(1..=MAX_FLEET_SIZE).contains(&request.count) {
            return Err(FleetError::InvalidRequest(format!(
                "server count must be between 1 and {MAX_FLEET_SIZE}, got {}",
                request.count
            )));
        }
        let last_port = u32::from(self.layout.base_port()) + request.count - 1;
        if last_port > u32::from(u16::MAX) {
            return Err(FleetError::InvalidRequest(format!(
                "{} servers starting at port {} would exceed port 65535",
                request.count,
                self.layout.base_port()
            )));
        }
        if let Some(radius) = request.settings.max_view_radius {
            if !(1..=hsm_config::MAX_VIEW_RADIUS).contains(&radius) {
                return Err(FleetError::InvalidRequest(format!(
                    "view radius must be between 1 and {}, got {radius}",
                    hsm_config::MAX_VIEW_RADIUS
                )));
            }
        }
        request.backup.validate()
    }

    /// First-time provisioning of `request.count` instances.
    ///
    /// Stages run in order: directory skeleton, dependency check, default
    /// extension (non-fatal), downloader, download, instances one by one,
    /// backup policy and fleet identity. Re-running after a cancellation
    /// picks up where the copies left off.
    #[instrument(skip_all, fields(count = request.count))]
    pub async fn bootstrap(
        &self,
        request: &BootstrapRequest,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<Outcome> {
        self.validate_bootstrap(request)?;
        let progress = Monotonic::new(progress);
        let mut warnings = Vec::new();

        // 1. Skeleton
        checkpoint(cancel)?;
        progress.report(0.0, "Creating directories");
        for dir in [
            self.layout.data_dir().to_path_buf(),
            self.layout.master_dir(),
            self.layout.mods_dir(),
        ] {
            std::fs::create_dir_all(&dir).map_err(FleetError::io("creating", &dir))?;
        }
        progress.report(SKELETON_END, "Directories created");

        // 2. Dependencies
        checkpoint(cancel)?;
        progress.report(SKELETON_END, "Checking dependencies");
        let report = self.dependencies.check().await;
        let missing = report.missing_required();
        if !missing.is_empty() {
            return Err(FleetError::MissingDependencies(missing));
        }
        progress.report(DEPENDENCIES_END, "Dependencies present");

        // 3. Default extension, never fatal
        checkpoint(cancel)?;
        if let Some(extension) = &self.extension {
            let scaled = Scaled::new(&progress, DEPENDENCIES_END, EXTENSION_END);
            match extension.install(&self.layout.shared_dir(), &scaled, cancel).await {
                Ok(_) => {}
                Err(FleetError::Cancelled) => return Err(FleetError::Cancelled),
                Err(e) => {
                    warn!(error = %e, "Default extension not installed");
                    warnings.push(format!("default extension not installed: {e}"));
                }
            }
        }
        progress.report(EXTENSION_END, "Extension step finished");

        // 4 and 5. Downloader and download
        checkpoint(cancel)?;
        let scaled = Scaled::new(&progress, EXTENSION_END, PAYLOAD_END);
        self.acquire_payload(&scaled, cancel, &mut warnings).await?;

        // 6. Instances, strictly in order
        let step = (INSTANCES_END - PAYLOAD_END) / f64::from(request.count);
        for ordinal in Ordinal::up_to(request.count) {
            checkpoint(cancel)?;
            let done = f64::from(ordinal.get() - 1);
            progress.report(
                PAYLOAD_END + step * done,
                &format!("Provisioning server {ordinal} of {}", request.count),
            );
            self.provision_instance(ordinal, request.settings.clone(), cancel)
                .await?;
            progress.report(
                PAYLOAD_END + step * (done + 1.0),
                &format!("Provisioned server {ordinal} of {}", request.count),
            );
        }

        // 7. Backup policy and fleet identity
        checkpoint(cancel)?;
        progress.report(INSTANCES_END, "Saving fleet settings");
        save_backup_policy(&self.layout, &request.backup)?;
        self.layout.write_identity()?;
        progress.report(1.0, "Bootstrap complete");

        info!(
            count = request.count,
            base_port = self.layout.base_port(),
            warnings = warnings.len(),
            "Bootstrap complete"
        );
        Ok(Outcome::Completed {
            message: format!(
                "Bootstrapped {} server(s) on ports {}-{}",
                request.count,
                self.layout.port(Ordinal::FIRST),
                self.layout.port(Ordinal::new(request.count)?)
            ),
            warnings,
        })
    }
}
