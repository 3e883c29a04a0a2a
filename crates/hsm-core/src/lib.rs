// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Fleet management for Hytale dedicated servers on a single host.
//!
//! The fleet lives under one data directory: a master install written by the
//! downloader, a shared overlay (mods, credentials, backup policy) and one
//! `server-N/` directory per instance. [`layout`] owns every path and port
//! formula, [`materialize`] projects master and overlay into instances,
//! [`instance_config`] stamps per-instance settings, [`supervisor`] runs
//! instances in detached terminal sessions and [`pipeline`] strings these
//! together into cancellable, progress-reporting workflows.

pub mod backup;
pub mod dependencies;
pub mod downloader;
pub mod error;
pub mod extension;
pub mod fetch;
pub mod instance_config;
pub mod layout;
pub mod materialize;
pub mod pipeline;
pub mod progress;
pub mod scrape;
pub mod supervisor;

pub use backup::{load_backup_policy, save_backup_policy, BackupPolicy};
pub use dependencies::{
    DependencyCheck, DependencyProbe, DependencyReport, HostDependencies, PackageManager,
};
pub use downloader::{HytaleDownloader, ServerDownloader};
pub use error::{FleetError, Result};
pub use extension::{ExtensionInstaller, PerformanceSaverInstaller};
pub use instance_config::{materialize_instance_config, DesiredSettings, InstanceConfig};
pub use layout::{FleetIdentity, FleetLayout, Ordinal, MAX_FLEET_SIZE};
pub use pipeline::{BootstrapRequest, Outcome, Provisioner};
pub use progress::{NoopProgress, ProgressReporter};
pub use supervisor::{InstanceStatus, ProcessSupervisor, RunState, RuntimeSettings};

/// Re-exported so callers do not need a direct tokio-util dependency.
pub use tokio_util::sync::CancellationToken;

use serde::Serialize;
use std::path::Path;

/// Write `value` as 2-space indented JSON with a trailing newline, creating
/// parent directories as needed.
pub(crate) fn write_pretty_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(FleetError::io("creating", parent))?;
    }
    let mut raw = serde_json::to_string_pretty(value).map_err(|source| FleetError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    raw.push('\n');
    std::fs::write(path, raw).map_err(FleetError::io("writing", path))
}
