// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The external `hytale-downloader` tool: locating or installing it, and
//! running it against the master install.

use crate::error::{FleetError, Result};
use crate::fetch::{download_to_file, http_client};
use crate::layout::{SERVER_JAR, SERVER_SUBDIR};
use crate::progress::{ProgressReporter, Scaled};
use crate::scrape::{ParserChain, ProgressParser};
use async_trait::async_trait;
use hsm_config::DownloaderSettings;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

pub const TOOL_NAME: &str = "hytale-downloader";
pub const ARCHIVE_BINARY: &str = "hytale-downloader-linux-amd64";

/// Lines of tool output kept for error reports.
const OUTPUT_TAIL: usize = 20;

/// Where the server jar ended up, if the master install has one.
pub fn locate_server_jar(master_dir: &Path) -> Option<PathBuf> {
    [
        master_dir.join(SERVER_SUBDIR).join(SERVER_JAR),
        master_dir.join(SERVER_JAR),
    ]
    .into_iter()
    .find(|p| p.is_file())
}

/// The server jar must exist after a download.
pub fn verify_payload(master_dir: &Path) -> Result<PathBuf> {
    locate_server_jar(master_dir).ok_or_else(|| FleetError::PayloadMissing(master_dir.to_path_buf()))
}

#[async_trait]
pub trait ServerDownloader: Send + Sync {
    /// Path of a usable downloader binary, installing it when missing.
    async fn ensure_tool(
        &self,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<PathBuf>;

    /// Fetch the server files into `master_dir` and verify them.
    async fn download(
        &self,
        tool: &Path,
        master_dir: &Path,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<()>;
}

pub struct HytaleDownloader {
    settings: DownloaderSettings,
    credentials_path: Option<PathBuf>,
}

impl HytaleDownloader {
    pub fn new(settings: DownloaderSettings) -> Self {
        Self {
            settings,
            credentials_path: None,
        }
    }

    /// OAuth credentials file handed to the tool with `-credentials-path`.
    pub fn with_credentials(mut self, path: Option<PathBuf>) -> Self {
        self.credentials_path = path.filter(|p| p.is_file());
        self
    }

    pub fn arguments(&self) -> Vec<String> {
        let mut args = vec![
            "-patchline".to_string(),
            self.settings.patchline.clone(),
            "-skip-update-check".to_string(),
        ];
        if let Some(path) = &self.credentials_path {
            args.push("-credentials-path".to_string());
            args.push(path.display().to_string());
        }
        args
    }

    async fn install(&self, progress: &dyn ProgressReporter, cancel: &CancellationToken) -> Result<PathBuf> {
        let scratch = tempfile::tempdir().map_err(FleetError::io("creating", std::env::temp_dir()))?;
        let archive = scratch.path().join("hytale-downloader.zip");

        let client = http_client()?;
        download_to_file(
            &client,
            &self.settings.archive_url,
            &archive,
            &Scaled::new(progress, 0.0, 0.8),
            "Downloading hytale-downloader",
            cancel,
        )
        .await?;

        progress.report(0.85, "Extracting hytale-downloader");
        let mut unzip = Command::new("unzip");
        unzip
            .arg("-o")
            .arg("-j")
            .arg(&archive)
            .arg(ARCHIVE_BINARY)
            .arg("-d")
            .arg(scratch.path());
        let status = run_cancellable(unzip, cancel).await?;
        let extracted = scratch.path().join(ARCHIVE_BINARY);
        if !status.success() || !extracted.is_file() {
            return Err(FleetError::Downloader(format!(
                "{ARCHIVE_BINARY} not found in {}",
                self.settings.archive_url
            )));
        }

        let dest = &self.settings.install_path;
        progress.report(0.9, "Installing hytale-downloader");
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(FleetError::io("creating", parent))?;
        }
        tokio::fs::copy(&extracted, dest)
            .await
            .map_err(FleetError::io("installing", dest))?;
        set_executable(dest).await?;

        progress.report(1.0, "hytale-downloader installed");
        info!(path = %dest.display(), "Installed hytale-downloader");
        Ok(dest.clone())
    }
}

#[cfg(unix)]
async fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .await
        .map_err(FleetError::io("chmod", path))
}

#[cfg(not(unix))]
async fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

async fn run_cancellable(mut cmd: Command, cancel: &CancellationToken) -> Result<std::process::ExitStatus> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| FleetError::Downloader(format!("failed to run unzip: {e}")))?;
    tokio::select! {
        status = child.wait() => status.map_err(|e| FleetError::Downloader(e.to_string())),
        _ = cancel.cancelled() => {
            let _ = child.kill().await;
            Err(FleetError::Cancelled)
        }
    }
}

/// One raw output line as text. Bytes that are not UTF-8 are replaced, so
/// odd output only costs a progress signal. `open` drops at end of stream.
fn decode_line(segment: std::io::Result<Option<Vec<u8>>>, open: &mut bool) -> Result<Option<String>> {
    match segment {
        Ok(Some(bytes)) => {
            let text = String::from_utf8_lossy(&bytes);
            Ok(Some(text.trim_end_matches('\r').to_string()))
        }
        Ok(None) => {
            *open = false;
            Ok(None)
        }
        Err(e) => Err(FleetError::Downloader(format!("reading {TOOL_NAME} output: {e}"))),
    }
}

#[async_trait]
impl ServerDownloader for HytaleDownloader {
    async fn ensure_tool(
        &self,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        if let Ok(path) = which::which(TOOL_NAME) {
            debug!(path = %path.display(), "Found hytale-downloader on PATH");
            return Ok(path);
        }
        if self.settings.install_path.is_file() {
            return Ok(self.settings.install_path.clone());
        }
        self.install(progress, cancel).await
    }

    #[instrument(skip(self, progress, cancel), fields(master = %master_dir.display()))]
    async fn download(
        &self,
        tool: &Path,
        master_dir: &Path,
        progress: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<()> {
        tokio::fs::create_dir_all(master_dir)
            .await
            .map_err(FleetError::io("creating", master_dir))?;

        let mut child = Command::new(tool)
            .args(self.arguments())
            .current_dir(master_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FleetError::Downloader(format!("failed to run {}: {e}", tool.display())))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| FleetError::Downloader("stdout not captured".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| FleetError::Downloader("stderr not captured".into()))?;
        let mut out = BufReader::new(stdout).split(b'\n');
        let mut err = BufReader::new(stderr).split(b'\n');
        let (mut out_open, mut err_open) = (true, true);

        let parsers = ParserChain::default();
        let mut tail: VecDeque<String> = VecDeque::with_capacity(OUTPUT_TAIL);
        progress.report(0.0, "Downloading server files");

        while out_open || err_open {
            let line = tokio::select! {
                line = out.next_segment(), if out_open => decode_line(line, &mut out_open)?,
                line = err.next_segment(), if err_open => decode_line(line, &mut err_open)?,
                _ = cancel.cancelled() => {
                    let _ = child.kill().await;
                    return Err(FleetError::Cancelled);
                }
            };
            let Some(line) = line else { continue };
            if let Some(fraction) = parsers.parse(&line) {
                progress.report(fraction, "Downloading server files");
            }
            debug!(target: "hytale_downloader", "{line}");
            if tail.len() == OUTPUT_TAIL {
                tail.pop_front();
            }
            tail.push_back(line);
        }

        let status = tokio::select! {
            status = child.wait() => status.map_err(|e| FleetError::Downloader(e.to_string()))?,
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                return Err(FleetError::Cancelled);
            }
        };
        if !status.success() {
            let output = Vec::from(tail).join("\n");
            warn!(%status, "hytale-downloader failed");
            return Err(FleetError::Downloader(format!("{TOOL_NAME} exited with {status}\n{output}")));
        }

        let jar = verify_payload(master_dir)?;
        progress.report(1.0, "Server files downloaded and verified");
        info!(jar = %jar.display(), "Server files downloaded");
        Ok(())
    }
}
