// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Provisioning workflows: bootstrap, scaling, fleet-wide updates and wipe.
//!
//! Every workflow runs serially, one instance at a time, reports progress
//! through a [`ProgressReporter`] and checks the caller's
//! [`CancellationToken`] at each stage boundary. Cancellation always
//! surfaces as [`FleetError::Cancelled`]; failures carry their cause; a run
//! that only partly succeeded returns [`Outcome::Partial`].

mod bootstrap;
mod scale;
mod update;
mod wipe;

pub use bootstrap::BootstrapRequest;

use crate::dependencies::DependencyProbe;
use crate::downloader::{verify_payload, ServerDownloader};
use crate::error::{FleetError, Result};
use crate::extension::ExtensionInstaller;
use crate::instance_config::{materialize_instance_config, DesiredSettings};
use crate::layout::{FleetLayout, Ordinal};
use crate::materialize::{copy_master_to_instance, copy_shared_to_instance};
use crate::progress::ProgressReporter;
use hsm_config::ManagerConfig;
use serde::Serialize;
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How a workflow ended when it did not fail outright.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Completed {
        message: String,
        /// Optional steps that failed without stopping the workflow
        warnings: Vec<String>,
    },
    Partial {
        succeeded: u32,
        attempted: u32,
        message: String,
        warnings: Vec<String>,
    },
}

impl Outcome {
    pub fn completed(message: impl Into<String>) -> Self {
        Outcome::Completed {
            message: message.into(),
            warnings: Vec::new(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Outcome::Completed { message, .. } | Outcome::Partial { message, .. } => message,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Outcome::Completed { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Completed { message, warnings } => {
                f.write_str(message)?;
                write_warnings(f, warnings)
            }
            Outcome::Partial {
                succeeded,
                attempted,
                message,
                warnings,
            } => {
                write!(f, "{message} ({succeeded}/{attempted} succeeded)")?;
                write_warnings(f, warnings)
            }
        }
    }
}

fn write_warnings(f: &mut fmt::Formatter<'_>, warnings: &[String]) -> fmt::Result {
    for w in warnings {
        write!(f, "\nwarning: {w}")?;
    }
    Ok(())
}

/// Fail with [`FleetError::Cancelled`] once the operator has asked to stop.
pub(crate) fn checkpoint(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(FleetError::Cancelled)
    } else {
        Ok(())
    }
}

/// Orchestrates layout, materializer, instance configs and the external
/// collaborators (host dependencies, downloader, default extension).
pub struct Provisioner {
    layout: FleetLayout,
    dependencies: Box<dyn DependencyProbe>,
    downloader: Box<dyn ServerDownloader>,
    extension: Option<Box<dyn ExtensionInstaller>>,
    defaults: DesiredSettings,
}

impl Provisioner {
    pub fn new(
        layout: FleetLayout,
        dependencies: Box<dyn DependencyProbe>,
        downloader: Box<dyn ServerDownloader>,
    ) -> Self {
        Self {
            layout,
            dependencies,
            downloader,
            extension: None,
            defaults: DesiredSettings::default(),
        }
    }

    /// Default plugin to install into the shared overlay.
    pub fn with_extension(mut self, extension: Option<Box<dyn ExtensionInstaller>>) -> Self {
        self.extension = extension;
        self
    }

    /// Capacity and game mode used when nothing better is known.
    pub fn with_defaults_from(mut self, config: &ManagerConfig) -> Self {
        self.defaults = DesiredSettings {
            server_name: None,
            max_players: Some(config.max_players),
            max_view_radius: Some(config.max_view_radius),
            game_mode: Some(config.game_mode),
            password: None,
        };
        self
    }

    pub fn layout(&self) -> &FleetLayout {
        &self.layout
    }

    /// Make sure the master install holds server files: find or install the
    /// downloader and run it. When the tool cannot be obtained, files already
    /// in the master install are used as they are.
    ///
    /// Progress is reported over `[0, 1]` of this step.
    pub(crate) async fn acquire_payload(
        &self,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
        warnings: &mut Vec<String>,
    ) -> Result<()> {
        let master = self.layout.master_dir();
        let tool_progress = crate::progress::Scaled::new(progress, 0.0, 0.25);
        let tool = match self.downloader.ensure_tool(&tool_progress, cancel).await {
            Ok(tool) => Some(tool),
            Err(FleetError::Cancelled) => return Err(FleetError::Cancelled),
            Err(e) => {
                if verify_payload(&master).is_err() {
                    return Err(FleetError::DownloaderUnavailable {
                        reason: e.to_string(),
                        master,
                    });
                }
                warn!(error = %e, "Downloader unavailable; using server files already in the master install");
                warnings.push(format!(
                    "hytale-downloader unavailable ({e}); using existing files in {}",
                    master.display()
                ));
                None
            }
        };
        checkpoint(cancel)?;

        if let Some(tool) = tool {
            let download_progress = crate::progress::Scaled::new(progress, 0.25, 1.0);
            self.downloader
                .download(&tool, &master, &download_progress, cancel)
                .await?;
        }
        progress.report(1.0, "Server files ready");
        Ok(())
    }

    /// Per-instance sub-sequence shared by bootstrap and scale-up: skeleton,
    /// master payload, shared overlay, instance config.
    pub(crate) async fn provision_instance(
        &self,
        ordinal: Ordinal,
        desired: DesiredSettings,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let layout = self.layout.clone();
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || provision_instance_blocking(&layout, ordinal, &desired, &cancel))
            .await?
    }

    /// Master and overlay copy only; the instance config is left alone.
    pub(crate) async fn refresh_instance(
        &self,
        ordinal: Ordinal,
        include_master: bool,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let layout = self.layout.clone();
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            if include_master {
                copy_master_to_instance(&layout, ordinal, &cancel)?;
            }
            copy_shared_to_instance(&layout, ordinal, &cancel)?;
            Ok(())
        })
        .await?
    }
}

fn provision_instance_blocking(
    layout: &FleetLayout,
    ordinal: Ordinal,
    desired: &DesiredSettings,
    cancel: &CancellationToken,
) -> Result<()> {
    let dir = layout.instance_dir(ordinal);
    for sub in ["universe", "logs"] {
        let path = dir.join(sub);
        std::fs::create_dir_all(&path).map_err(FleetError::io("creating", &path))?;
    }
    checkpoint(cancel)?;

    if layout.master_dir().is_dir() {
        copy_master_to_instance(layout, ordinal, cancel)?;
    }
    copy_shared_to_instance(layout, ordinal, cancel)?;
    checkpoint(cancel)?;

    let desired = DesiredSettings {
        server_name: Some(layout.hostname(ordinal)),
        ..desired.clone()
    };
    materialize_instance_config(layout, ordinal, &desired)?;
    debug!(ordinal = %ordinal, port = layout.port(ordinal), "Provisioned instance");
    Ok(())
}
