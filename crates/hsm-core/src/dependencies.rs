// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Host tools the fleet needs, and installing them through the system
//! package manager.

use crate::error::{FleetError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Static record of one host tool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dependency {
    pub name: &'static str,
    /// Liveness probe; the tool is present when this exits successfully
    pub check: &'static [&'static str],
    pub required: bool,
}

pub const DEPENDENCIES: &[Dependency] = &[
    Dependency {
        name: "java",
        check: &["java", "-version"],
        required: true,
    },
    Dependency {
        name: "tmux",
        check: &["tmux", "-V"],
        required: true,
    },
    Dependency {
        name: "unzip",
        check: &["unzip", "-v"],
        required: false,
    },
    Dependency {
        name: "wget",
        check: &["wget", "--version"],
        required: false,
    },
    Dependency {
        name: "curl",
        check: &["curl", "--version"],
        required: false,
    },
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Apt,
    Dnf,
    Yum,
    Pacman,
    Zypper,
}

impl PackageManager {
    /// Probe order when several are installed.
    pub const DETECTION_ORDER: [PackageManager; 5] = [
        PackageManager::Apt,
        PackageManager::Dnf,
        PackageManager::Yum,
        PackageManager::Pacman,
        PackageManager::Zypper,
    ];

    pub fn binary(self) -> &'static str {
        match self {
            PackageManager::Apt => "apt-get",
            PackageManager::Dnf => "dnf",
            PackageManager::Yum => "yum",
            PackageManager::Pacman => "pacman",
            PackageManager::Zypper => "zypper",
        }
    }

    /// First package manager found on `PATH`.
    pub fn detect() -> Option<Self> {
        Self::DETECTION_ORDER
            .into_iter()
            .find(|pm| which::which(pm.binary()).is_ok())
    }

    /// Distribution package providing the logical dependency `name`.
    pub fn package_name(self, name: &str) -> String {
        match (name, self) {
            ("java", PackageManager::Apt) => "openjdk-17-jre-headless".to_string(),
            ("java", PackageManager::Pacman) => "jre-openjdk".to_string(),
            ("java", _) => "java-17-openjdk-headless".to_string(),
            (other, _) => other.to_string(),
        }
    }

    /// Full install command line (program first), `sudo` prefixed when not
    /// running as root.
    pub fn install_command(self, package: &str, as_root: bool) -> Vec<String> {
        let mut cmd = Vec::new();
        if !as_root {
            cmd.push("sudo".to_string());
        }
        cmd.push(self.binary().to_string());
        let args: &[&str] = match self {
            PackageManager::Apt | PackageManager::Dnf | PackageManager::Yum => &["install", "-y"],
            PackageManager::Pacman => &["-S", "--noconfirm"],
            PackageManager::Zypper => &["install", "-y"],
        };
        cmd.extend(args.iter().map(|a| a.to_string()));
        cmd.push(package.to_string());
        cmd
    }
}

impl std::fmt::Display for PackageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.binary())
    }
}

fn running_as_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DependencyCheck {
    pub name: String,
    pub required: bool,
    pub present: bool,
    /// First line the probe printed, usually a version banner
    pub detail: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DependencyReport {
    pub checks: Vec<DependencyCheck>,
    pub package_manager: Option<PackageManager>,
}

impl DependencyReport {
    pub fn missing_required(&self) -> Vec<String> {
        self.checks
            .iter()
            .filter(|c| c.required && !c.present)
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn missing(&self) -> Vec<String> {
        self.checks
            .iter()
            .filter(|c| !c.present)
            .map(|c| c.name.clone())
            .collect()
    }
}

/// Seam between the pipeline and the host.
#[async_trait]
pub trait DependencyProbe: Send + Sync {
    async fn check(&self) -> DependencyReport;

    /// Install every missing dependency. Returns the names that were installed.
    async fn install_missing(&self, cancel: &CancellationToken) -> Result<Vec<String>>;
}

/// Probes the real host with [`DEPENDENCIES`].
#[derive(Clone, Copy, Debug, Default)]
pub struct HostDependencies;

async fn probe(dep: &Dependency) -> DependencyCheck {
    let (program, args) = match dep.check.split_first() {
        Some(split) => split,
        None => (&dep.name, &[][..]),
    };
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await;
    let (present, detail) = match output {
        Ok(out) if out.status.success() => {
            // java prints its version banner on stderr
            let text = if out.stdout.is_empty() {
                out.stderr
            } else {
                out.stdout
            };
            let first = String::from_utf8_lossy(&text)
                .lines()
                .next()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty());
            (true, first)
        }
        Ok(out) => (false, Some(format!("exited with {}", out.status))),
        Err(e) => (false, Some(e.to_string())),
    };
    debug!(dependency = dep.name, present, "Probed dependency");
    DependencyCheck {
        name: dep.name.to_string(),
        required: dep.required,
        present,
        detail,
    }
}

async fn run_install(cmd: &[String], cancel: &CancellationToken) -> Result<()> {
    let Some((program, args)) = cmd.split_first() else {
        return Err(FleetError::Install("empty install command".into()));
    };
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| FleetError::Install(format!("{}: {e}", cmd.join(" "))))?;

    let status = tokio::select! {
        status = child.wait() => status.map_err(|e| FleetError::Install(e.to_string()))?,
        _ = cancel.cancelled() => {
            let _ = child.kill().await;
            return Err(FleetError::Cancelled);
        }
    };
    if !status.success() {
        return Err(FleetError::Install(format!("{} exited with {status}", cmd.join(" "))));
    }
    Ok(())
}

#[async_trait]
impl DependencyProbe for HostDependencies {
    async fn check(&self) -> DependencyReport {
        let mut checks = Vec::with_capacity(DEPENDENCIES.len());
        for dep in DEPENDENCIES {
            checks.push(probe(dep).await);
        }
        DependencyReport {
            checks,
            package_manager: PackageManager::detect(),
        }
    }

    async fn install_missing(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        let report = self.check().await;
        let missing = report.missing();
        if missing.is_empty() {
            return Ok(Vec::new());
        }
        let pm = report
            .package_manager
            .ok_or_else(|| FleetError::Install("no supported package manager found".into()))?;

        let as_root = running_as_root();
        let mut installed = Vec::new();
        for name in missing {
            if cancel.is_cancelled() {
                return Err(FleetError::Cancelled);
            }
            let cmd = pm.install_command(&pm.package_name(&name), as_root);
            info!(dependency = %name, command = %cmd.join(" "), "Installing dependency");
            match run_install(&cmd, cancel).await {
                Ok(()) => installed.push(name),
                Err(FleetError::Cancelled) => return Err(FleetError::Cancelled),
                Err(e) => {
                    let required = DEPENDENCIES.iter().any(|d| d.name == name && d.required);
                    if required {
                        return Err(e);
                    }
                    warn!(dependency = %name, error = %e, "Optional dependency not installed");
                }
            }
        }
        Ok(installed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_table() {
        assert_eq!(PackageManager::Apt.package_name("java"), "openjdk-17-jre-headless");
        assert_eq!(PackageManager::Dnf.package_name("java"), "java-17-openjdk-headless");
        assert_eq!(PackageManager::Zypper.package_name("java"), "java-17-openjdk-headless");
        assert_eq!(PackageManager::Pacman.package_name("java"), "jre-openjdk");
        assert_eq!(PackageManager::Pacman.package_name("tmux"), "tmux");
    }

    #[test]
    fn install_commands() {
        assert_eq!(
            PackageManager::Apt.install_command("tmux", true),
            vec!["apt-get", "install", "-y", "tmux"]
        );
        assert_eq!(
            PackageManager::Pacman.install_command("unzip", false),
            vec!["sudo", "pacman", "-S", "--noconfirm", "unzip"]
        );
        assert_eq!(
            PackageManager::Yum.install_command("wget", false),
            vec!["sudo", "yum", "install", "-y", "wget"]
        );
    }

    #[test]
    fn only_required_dependencies_block() {
        let report = DependencyReport {
            checks: vec![
                DependencyCheck {
                    name: "java".into(),
                    required: true,
                    present: false,
                    detail: None,
                },
                DependencyCheck {
                    name: "wget".into(),
                    required: false,
                    present: false,
                    detail: None,
                },
                DependencyCheck {
                    name: "tmux".into(),
                    required: true,
                    present: true,
                    detail: Some("tmux 3.4".into()),
                },
            ],
            package_manager: None,
        };
        assert_eq!(report.missing_required(), vec!["java"]);
        assert_eq!(report.missing(), vec!["java", "wget"]);
    }
}
