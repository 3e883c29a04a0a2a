// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing TOML in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("reading HSM_* environment: {0}")]
    Env(#[from] config::ConfigError),

    #[error("invalid configuration at `{path}`: {message}")]
    Extract { path: String, message: String },

    #[error("missing configuration path: {0}")]
    MissingPath(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
