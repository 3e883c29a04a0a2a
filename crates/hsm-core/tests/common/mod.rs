// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! In-memory stand-ins for the host: sessions, dependencies, downloader and
//! the default extension.

#![allow(dead_code)]

use async_trait::async_trait;
use hsm_core::dependencies::{DependencyCheck, DependencyProbe, DependencyReport};
use hsm_core::downloader::ServerDownloader;
use hsm_core::extension::ExtensionInstaller;
use hsm_core::{CancellationToken, FleetError, FleetLayout, ProgressReporter, Result};
use hsm_mux_core::{MuxError, SessionMux};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn layout(dir: &Path) -> FleetLayout {
    FleetLayout::new(dir, 5520, "hytale", "hytale-server")
}

pub fn write(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

#[derive(Clone, Debug)]
pub struct FakeSession {
    pub workdir: PathBuf,
    pub command: Vec<String>,
    pub typed: Vec<String>,
}

/// Sessions kept in a shared map so tests can inspect them after handing a
/// clone to the supervisor.
#[derive(Clone, Default)]
pub struct FakeMux {
    pub sessions: Arc<Mutex<BTreeMap<String, FakeSession>>>,
}

impl FakeMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(&self) -> Vec<String> {
        self.sessions.lock().unwrap().keys().cloned().collect()
    }

    pub fn session(&self, name: &str) -> Option<FakeSession> {
        self.sessions.lock().unwrap().get(name).cloned()
    }
}

impl SessionMux for FakeMux {
    fn id(&self) -> &'static str {
        "fake"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn create_detached_session(
        &self,
        name: &str,
        workdir: &Path,
        command: &[String],
    ) -> std::result::Result<(), MuxError> {
        let mut sessions = self.sessions.lock().unwrap();
        if sessions.contains_key(name) {
            return Err(MuxError::SessionExists(name.to_string()));
        }
        sessions.insert(
            name.to_string(),
            FakeSession {
                workdir: workdir.to_path_buf(),
                command: command.to_vec(),
                typed: Vec::new(),
            },
        );
        Ok(())
    }

    fn has_session(&self, name: &str) -> bool {
        self.sessions.lock().unwrap().contains_key(name)
    }

    fn send_keys(&self, name: &str, text: &str) -> std::result::Result<(), MuxError> {
        match self.sessions.lock().unwrap().get_mut(name) {
            Some(s) => {
                s.typed.push(text.to_string());
                Ok(())
            }
            None => Err(MuxError::SessionNotFound(name.to_string())),
        }
    }

    fn capture_pane(&self, name: &str, lines: usize) -> std::result::Result<String, MuxError> {
        let sessions = self.sessions.lock().unwrap();
        let s = sessions
            .get(name)
            .ok_or_else(|| MuxError::SessionNotFound(name.to_string()))?;
        let all = [format!("$ {}", s.command.join(" "))]
            .into_iter()
            .chain(s.typed.iter().cloned())
            .collect::<Vec<_>>();
        let start = all.len().saturating_sub(lines);
        Ok(all[start..].join("\n"))
    }

    fn kill_session(&self, name: &str) -> std::result::Result<(), MuxError> {
        match self.sessions.lock().unwrap().remove(name) {
            Some(_) => Ok(()),
            None => Err(MuxError::SessionNotFound(name.to_string())),
        }
    }

    fn list_sessions(&self) -> std::result::Result<Vec<String>, MuxError> {
        Ok(self.names())
    }
}

/// Host with a fixed set of missing tools.
#[derive(Clone, Default)]
pub struct FakeDependencies {
    pub missing_required: Vec<String>,
}

#[async_trait]
impl DependencyProbe for FakeDependencies {
    async fn check(&self) -> DependencyReport {
        let mut checks: Vec<DependencyCheck> = ["java", "tmux"]
            .into_iter()
            .map(|name| DependencyCheck {
                name: name.to_string(),
                required: true,
                present: !self.missing_required.iter().any(|m| m == name),
                detail: None,
            })
            .collect();
        checks.push(DependencyCheck {
            name: "wget".into(),
            required: false,
            present: false,
            detail: None,
        });
        DependencyReport {
            checks,
            package_manager: None,
        }
    }

    async fn install_missing(&self, _cancel: &CancellationToken) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Writes a tiny server payload into the master install.
#[derive(Clone, Default)]
pub struct FakeDownloader {
    pub tool_missing: bool,
    pub downloads: Arc<AtomicUsize>,
    /// Content of the jar written by the next download
    pub version: Arc<Mutex<String>>,
}

impl FakeDownloader {
    pub fn new(version: &str) -> Self {
        Self {
            version: Arc::new(Mutex::new(version.to_string())),
            ..Default::default()
        }
    }

    pub fn set_version(&self, version: &str) {
        *self.version.lock().unwrap() = version.to_string();
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServerDownloader for FakeDownloader {
    async fn ensure_tool(
        &self,
        _progress: &dyn ProgressReporter,
        _cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        if self.tool_missing {
            return Err(FleetError::Downloader("archive unreachable".into()));
        }
        Ok(PathBuf::from("/usr/local/bin/hytale-downloader"))
    }

    async fn download(
        &self,
        _tool: &Path,
        master_dir: &Path,
        progress: &dyn ProgressReporter,
        _cancel: &CancellationToken,
    ) -> Result<()> {
        let version = self.version.lock().unwrap().clone();
        write(&master_dir.join("Server/HytaleServer.jar"), &version);
        write(&master_dir.join("Assets.zip"), "assets");
        write(&master_dir.join("universe/worlds/default/seed"), "master world");
        progress.report(1.0, "Downloaded");
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Default extension that drops a jar into the overlay, or fails.
#[derive(Clone, Default)]
pub struct FakeExtension {
    pub fail: bool,
}

#[async_trait]
impl ExtensionInstaller for FakeExtension {
    async fn install(
        &self,
        shared_dir: &Path,
        _progress: &dyn ProgressReporter,
        _cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        if self.fail {
            return Err(FleetError::Extension("GitHub unreachable".into()));
        }
        let jar = shared_dir.join("mods/Nitrado_PerformanceSaver/PerformanceSaver.jar");
        write(&jar, "plugin");
        Ok(jar)
    }
}

/// Cancels `token` once a progress label equal to `trigger` is reported.
pub struct CancelOn {
    pub trigger: String,
    pub token: CancellationToken,
}

impl ProgressReporter for CancelOn {
    fn report(&self, _fraction: f64, label: &str) {
        if label == self.trigger {
            self.token.cancel();
        }
    }
}
