// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Shared setup for commands: configuration, layout and collaborators

use crate::GlobalArgs;
use anyhow::{Context as _, Result};
use hsm_config::{discover_paths, load_all, ManagerConfig, Resolved};
use hsm_core::{
    ExtensionInstaller, FleetLayout, HostDependencies, HytaleDownloader,
    PerformanceSaverInstaller, ProcessSupervisor, Provisioner, RuntimeSettings,
};
use hsm_credentials::{CredentialsConfig, SessionTokens};
use std::time::Duration;
use tracing::{debug, warn};

/// Merged configuration with provenance.
pub fn resolve_config(global: &GlobalArgs) -> Result<Resolved> {
    let paths = discover_paths().with_cli_config(global.config.clone());
    let pairs = global.flag_pairs();
    let flags: Vec<(&str, &str)> = pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    load_all(&paths, &flags).context("loading configuration")
}

pub struct Context {
    pub config: ManagerConfig,
    pub layout: FleetLayout,
}

impl Context {
    pub fn load(global: &GlobalArgs) -> Result<Self> {
        let config = resolve_config(global)?
            .config()
            .context("invalid configuration")?;
        let layout = FleetLayout::resolve(&config)?;
        debug!(data_dir = %layout.data_dir().display(), base_port = layout.base_port(), "Resolved fleet layout");
        Ok(Self { config, layout })
    }

    pub fn credentials(&self) -> CredentialsConfig {
        CredentialsConfig::new(self.layout.shared_dir())
    }

    /// Requires tmux on the host.
    pub fn supervisor(&self) -> Result<ProcessSupervisor> {
        let mux = hsm_mux::default_multiplexer().context("no terminal multiplexer available")?;
        Ok(ProcessSupervisor::new(
            mux,
            self.layout.clone(),
            RuntimeSettings::from_config(&self.config, &self.layout),
        )
        .with_grace(Duration::from_secs(self.config.stop_grace_secs)))
    }

    pub fn provisioner(&self) -> Provisioner {
        self.provisioner_for(self.layout.clone())
    }

    pub fn provisioner_for(&self, layout: FleetLayout) -> Provisioner {
        let credentials = CredentialsConfig::new(layout.shared_dir());
        let downloader = HytaleDownloader::new(self.config.downloader.clone())
            .with_credentials(Some(credentials.downloader_credentials_file()));
        let extension = self.config.extension.enabled.then(|| {
            Box::new(PerformanceSaverInstaller::new(
                self.config.extension.repository.clone(),
            )) as Box<dyn ExtensionInstaller>
        });
        Provisioner::new(layout, Box::new(HostDependencies), Box::new(downloader))
            .with_extension(extension)
            .with_defaults_from(&self.config)
    }

    /// Stored session tokens. A missing or unreadable bundle starts servers
    /// unauthenticated.
    pub async fn session_tokens(&self) -> Option<SessionTokens> {
        match hsm_credentials::read_session_tokens(&self.credentials()).await {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable session tokens");
                None
            }
        }
    }
}
