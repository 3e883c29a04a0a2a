// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use hsm_mux_core::MuxError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FleetError>;

#[derive(Debug, Error)]
pub enum FleetError {
    /// The operator asked to stop; never a failure.
    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid instance ordinal {0}: ordinals start at 1")]
    InvalidOrdinal(u32),

    #[error("missing required dependencies: {}", .0.join(", "))]
    MissingDependencies(Vec<String>),

    #[error("source directory {0} does not exist")]
    SourceMissing(PathBuf),

    #[error("{action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("server {0} is already running")]
    SessionExists(u32),

    #[error("server {0} is not running")]
    SessionMissing(u32),

    #[error("cannot remove the last server instance")]
    LastInstance,

    #[error("fleet size limit of {0} servers reached")]
    FleetLimit(u32),

    #[error("no server instances exist; run bootstrap first")]
    NoInstances,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("server files missing in {0}")]
    PayloadMissing(PathBuf),

    #[error("downloader: {0}")]
    Downloader(String),

    #[error("downloader unavailable ({reason}); install hytale-downloader manually or place the server files in {master}")]
    DownloaderUnavailable { reason: String, master: PathBuf },

    #[error("extension: {0}")]
    Extension(String),

    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("package installation failed: {0}")]
    Install(String),

    #[error(transparent)]
    Mux(#[from] MuxError),

    #[error(transparent)]
    Credentials(#[from] hsm_credentials::Error),

    #[error("background task failed: {0}")]
    Task(String),
}

impl FleetError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FleetError::Cancelled)
    }

    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| FleetError::Io {
            action,
            path,
            source,
        }
    }
}

impl From<tokio::task::JoinError> for FleetError {
    fn from(e: tokio::task::JoinError) -> Self {
        FleetError::Task(e.to_string())
    }
}
