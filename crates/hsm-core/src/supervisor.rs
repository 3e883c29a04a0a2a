// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Running instances inside named detached sessions.
//!
//! One session per instance, named by the layout. There is no other state:
//! an instance is running exactly when its session exists.

use crate::backup::BackupPolicy;
use crate::downloader::locate_server_jar;
use crate::error::{FleetError, Result};
use crate::layout::{FleetLayout, Ordinal, ASSETS_ARCHIVE};
use hsm_config::ManagerConfig;
use hsm_credentials::SessionTokens;
use hsm_mux_core::{MuxError, SessionMux};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Console command that asks the server to save and exit.
pub const STOP_COMMAND: &str = "/stop";

/// Tokens are passed to the server only as a complete, unexpired pair.
fn usable(tokens: &SessionTokens) -> bool {
    tokens.is_complete() && !tokens.is_expired()
}

/// How instances are launched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub java: String,
    pub jvm_args: Vec<String>,
    pub server_jar: PathBuf,
}

impl RuntimeSettings {
    /// The jar is wherever the downloader put it, `Server/HytaleServer.jar`
    /// when nothing has been downloaded yet.
    pub fn from_config(config: &ManagerConfig, layout: &FleetLayout) -> Self {
        Self {
            java: config.java.clone(),
            jvm_args: config.jvm_args.clone(),
            server_jar: locate_server_jar(&layout.master_dir()).unwrap_or_else(|| layout.server_jar()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Running,
    Stopped,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InstanceStatus {
    pub ordinal: Ordinal,
    pub state: RunState,
    pub port: u32,
    pub session: String,
}

/// Outcome of a fleet-wide stop, which keeps going past failures.
#[derive(Debug, Default)]
pub struct StopReport {
    pub stopped: Vec<Ordinal>,
    pub failed: Vec<(Ordinal, FleetError)>,
}

impl StopReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct ProcessSupervisor {
    mux: Box<dyn SessionMux>,
    layout: FleetLayout,
    runtime: RuntimeSettings,
    grace: Duration,
}

impl ProcessSupervisor {
    pub fn new(mux: Box<dyn SessionMux>, layout: FleetLayout, runtime: RuntimeSettings) -> Self {
        Self {
            mux,
            layout,
            runtime,
            grace: Duration::from_secs(2),
        }
    }

    /// Time between the stop request and tearing the session down.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn layout(&self) -> &FleetLayout {
        &self.layout
    }

    pub fn has_session(&self, ordinal: Ordinal) -> bool {
        self.mux.has_session(&self.layout.session_name(ordinal))
    }

    /// Asset archive next to the instance, else the one in the master install.
    fn discover_assets(&self, ordinal: Ordinal) -> Option<PathBuf> {
        [
            self.layout.instance_dir(ordinal).join(ASSETS_ARCHIVE),
            self.layout.master_dir().join(ASSETS_ARCHIVE),
        ]
        .into_iter()
        .find(|p| p.is_file())
    }

    /// Full command line for instance `ordinal`, program first.
    pub fn compose_invocation(
        &self,
        ordinal: Ordinal,
        backup: &BackupPolicy,
        tokens: Option<&SessionTokens>,
    ) -> Vec<String> {
        let mut cmd = vec![self.runtime.java.clone()];
        cmd.extend(self.runtime.jvm_args.iter().cloned());
        cmd.push("-jar".to_string());
        cmd.push(self.runtime.server_jar.display().to_string());
        cmd.push("--bind".to_string());
        cmd.push(self.layout.bind_address(ordinal));

        if let Some(assets) = self.discover_assets(ordinal) {
            cmd.push("--assets".to_string());
            cmd.push(assets.display().to_string());
        }

        cmd.extend(backup.server_args());

        if let Some(tokens) = tokens.filter(|t| usable(t)) {
            cmd.extend([
                "--session-token".to_string(),
                tokens.session_token.clone(),
                "--identity-token".to_string(),
                tokens.identity_token.clone(),
            ]);
            if !tokens.owner_uuid.is_empty() {
                cmd.extend(["--owner-uuid".to_string(), tokens.owner_uuid.clone()]);
            }
        }
        cmd
    }

    /// Launch instance `ordinal`. Never restarts a running one.
    #[instrument(skip(self, backup, tokens), fields(ordinal = %ordinal))]
    pub fn start(
        &self,
        ordinal: Ordinal,
        backup: &BackupPolicy,
        tokens: Option<&SessionTokens>,
    ) -> Result<()> {
        let session = self.layout.session_name(ordinal);
        if self.mux.has_session(&session) {
            return Err(FleetError::SessionExists(ordinal.get()));
        }
        let workdir = self.layout.instance_dir(ordinal);
        if !workdir.is_dir() {
            return Err(FleetError::InvalidRequest(format!(
                "server {ordinal} has not been provisioned"
            )));
        }

        let cmd = self.compose_invocation(ordinal, backup, tokens);
        match self.mux.create_detached_session(&session, &workdir, &cmd) {
            Ok(()) => {}
            Err(MuxError::SessionExists(_)) => return Err(FleetError::SessionExists(ordinal.get())),
            Err(e) => return Err(e.into()),
        }
        info!(
            %session,
            port = self.layout.port(ordinal),
            authenticated = tokens.is_some_and(usable),
            "Started server"
        );
        Ok(())
    }

    /// Ask the server to stop, wait the grace period, then kill the session
    /// whether or not the server listened.
    #[instrument(skip(self), fields(ordinal = %ordinal))]
    pub fn stop(&self, ordinal: Ordinal) -> Result<()> {
        let session = self.layout.session_name(ordinal);
        if !self.mux.has_session(&session) {
            return Err(FleetError::SessionMissing(ordinal.get()));
        }

        if let Err(e) = self.mux.send_keys(&session, STOP_COMMAND) {
            warn!(%session, error = %e, "Graceful stop request failed");
        }
        if !self.grace.is_zero() {
            std::thread::sleep(self.grace);
        }

        match self.mux.kill_session(&session) {
            // The server exited on its own during the grace period
            Ok(()) | Err(MuxError::SessionNotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        info!(%session, "Stopped server");
        Ok(())
    }

    /// Stop if running, then start.
    pub fn restart(
        &self,
        ordinal: Ordinal,
        backup: &BackupPolicy,
        tokens: Option<&SessionTokens>,
    ) -> Result<()> {
        if self.has_session(ordinal) {
            self.stop(ordinal)?;
        }
        self.start(ordinal, backup, tokens)
    }

    /// Start every stopped instance in `1..=fleet_size`, stopping at the first
    /// failure. Returns the instances that were started.
    pub fn start_all(
        &self,
        fleet_size: u32,
        backup: &BackupPolicy,
        tokens: Option<&SessionTokens>,
    ) -> Result<Vec<Ordinal>> {
        let mut started = Vec::new();
        for ordinal in Ordinal::up_to(fleet_size) {
            if self.has_session(ordinal) {
                debug!(ordinal = %ordinal, "Already running");
                continue;
            }
            self.start(ordinal, backup, tokens)?;
            started.push(ordinal);
        }
        Ok(started)
    }

    /// Stop every running instance, continuing past failures.
    pub fn stop_all(&self, fleet_size: u32) -> StopReport {
        let mut report = StopReport::default();
        for ordinal in Ordinal::up_to(fleet_size) {
            if !self.has_session(ordinal) {
                continue;
            }
            match self.stop(ordinal) {
                Ok(()) => report.stopped.push(ordinal),
                Err(e) => {
                    warn!(ordinal = %ordinal, error = %e, "Failed to stop server");
                    report.failed.push((ordinal, e));
                }
            }
        }
        report
    }

    pub fn status(&self, fleet_size: u32) -> Vec<InstanceStatus> {
        Ordinal::up_to(fleet_size)
            .map(|ordinal| InstanceStatus {
                ordinal,
                state: if self.has_session(ordinal) {
                    RunState::Running
                } else {
                    RunState::Stopped
                },
                port: self.layout.port(ordinal),
                session: self.layout.session_name(ordinal),
            })
            .collect()
    }

    /// Last `lines` lines of the instance console.
    pub fn logs(&self, ordinal: Ordinal, lines: usize) -> Result<String> {
        let session = self.layout.session_name(ordinal);
        if !self.mux.has_session(&session) {
            return Err(FleetError::SessionMissing(ordinal.get()));
        }
        Ok(self.mux.capture_pane(&session, lines)?)
    }

    /// Kill every session carrying this fleet's session prefix, including
    /// ones beyond the current fleet size.
    pub fn kill_all_sessions(&self) -> Result<Vec<String>> {
        let prefix = format!("{}-", self.layout.session_prefix());
        let mut killed = Vec::new();
        for session in self.mux.list_sessions()? {
            let is_ours = session
                .strip_prefix(prefix.as_str())
                .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()));
            if is_ours {
                match self.mux.kill_session(&session) {
                    Ok(()) | Err(MuxError::SessionNotFound(_)) => killed.push(session),
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(killed)
    }
}
