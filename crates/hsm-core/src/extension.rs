// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Default server plugin installed into the shared overlay.

use crate::error::{FleetError, Result};
use crate::fetch::{download_to_file, http_client, HTTP_TIMEOUT};
use crate::layout::MODS_DIR;
use crate::progress::{ProgressReporter, Scaled};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const PLUGIN_DIR: &str = "Nitrado_PerformanceSaver";
pub const PLUGIN_JAR: &str = "PerformanceSaver.jar";
pub const PLUGIN_CONFIG: &str = "config.json";
pub const GITHUB_API: &str = "https://api.github.com";

#[async_trait]
pub trait ExtensionInstaller: Send + Sync {
    /// Install or refresh the plugin under `shared_dir`. Returns the jar path.
    async fn install(
        &self,
        shared_dir: &Path,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<PathBuf>;
}

#[derive(Debug, Deserialize)]
struct Release {
    #[serde(default)]
    tag_name: Option<String>,
    #[serde(default)]
    assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Deserialize)]
struct ReleaseAsset {
    name: String,
    browser_download_url: String,
}

impl Release {
    fn jar_url(&self) -> Option<&str> {
        self.assets
            .iter()
            .find(|a| a.name.ends_with(".jar"))
            .map(|a| a.browser_download_url.as_str())
    }
}

/// Nitrado Performance Saver from the latest GitHub release.
pub struct PerformanceSaverInstaller {
    repository: String,
    api_base: String,
}

impl PerformanceSaverInstaller {
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            api_base: GITHUB_API.to_string(),
        }
    }

    /// Point at a GitHub-compatible API other than api.github.com.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    fn release_url(&self) -> String {
        format!(
            "{}/repos/{}/releases/latest",
            self.api_base.trim_end_matches('/'),
            self.repository
        )
    }

    async fn latest_release(&self, client: &reqwest::Client, cancel: &CancellationToken) -> Result<Release> {
        let request = client
            .get(self.release_url())
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .timeout(HTTP_TIMEOUT)
            .send();
        let response = tokio::select! {
            r = request => r?,
            _ = cancel.cancelled() => return Err(FleetError::Cancelled),
        };
        if !response.status().is_success() {
            return Err(FleetError::Extension(format!(
                "fetching release info for {}: status {}",
                self.repository,
                response.status()
            )));
        }
        Ok(response.json().await?)
    }
}

pub fn plugin_dir(shared_dir: &Path) -> PathBuf {
    shared_dir.join(MODS_DIR).join(PLUGIN_DIR)
}

/// Default plugin settings.
pub fn default_plugin_config() -> Value {
    json!({
        "Tps": {
            "Enabled": true,
            "TpsLimit": 20,
            "TpsLimitEmpty": 5,
            "OnlyWorlds": [],
            "InitialDelaySeconds": 30,
            "CheckIntervalSeconds": 5,
            "EmptyLimitDelaySeconds": 300
        },
        "ViewRadius": {
            "Enabled": true,
            "MinViewRadius": 2,
            "DecreaseFactor": 0.75,
            "IncreaseValue": 1,
            "InitialDelaySeconds": 30,
            "CheckIntervalSeconds": 5,
            "RecoveryWaitTimeSeconds": 60,
            "RequireNotifyPermission": false,
            "GcMonitor": {
                "Enabled": true,
                "HeapThresholdRatio": 0.85,
                "TriggerSequenceLength": 3,
                "WindowSeconds": 60
            },
            "TpsMonitor": {
                "Enabled": true,
                "TpsWaterMarkHigh": 0.75,
                "TpsWaterMarkLow": 0.6,
                "OnlyWorlds": [],
                "AdjustmentDelaySeconds": 20
            }
        },
        "ChunkGarbageCollection": {
            "Enabled": true,
            "MinChunkCount": 128,
            "ChunkDropRatioThreshold": 0.8,
            "GarbageCollectionDelaySeconds": 300,
            "InitialDelaySeconds": 5,
            "CheckIntervalSeconds": 5
        }
    })
}

/// Write the default plugin config unless the operator already has one.
/// Returns whether a file was written.
pub fn ensure_plugin_config(dir: &Path) -> Result<bool> {
    let path = dir.join(PLUGIN_CONFIG);
    if path.exists() {
        return Ok(false);
    }
    crate::write_pretty_json(&path, &default_plugin_config())?;
    Ok(true)
}

#[async_trait]
impl ExtensionInstaller for PerformanceSaverInstaller {
    async fn install(
        &self,
        shared_dir: &Path,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        progress.report(0.0, "Fetching release information");
        let client = http_client()?;
        let release = self.latest_release(&client, cancel).await?;
        let url = release
            .jar_url()
            .ok_or_else(|| FleetError::Extension(format!("no .jar asset in the latest {} release", self.repository)))?
            .to_string();
        debug!(tag = ?release.tag_name, %url, "Resolved plugin release");

        let dir = plugin_dir(shared_dir);
        let jar = dir.join(PLUGIN_JAR);
        download_to_file(
            &client,
            &url,
            &jar,
            &Scaled::new(progress, 0.05, 0.9),
            "Downloading Performance Saver",
            cancel,
        )
        .await?;

        progress.report(0.95, "Writing plugin configuration");
        ensure_plugin_config(&dir)?;
        progress.report(1.0, "Performance Saver installed");
        info!(jar = %jar.display(), tag = ?release.tag_name, "Installed Performance Saver");
        Ok(jar)
    }
}
