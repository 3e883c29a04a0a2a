// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for the token and credential store

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for credentials operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// No token bundle has ever been stored.
    #[error("not authenticated: no session tokens stored")]
    NotAuthenticated,

    /// A bundle exists but must be refreshed before use.
    #[error("session tokens expired at {expired_at}")]
    Expired { expired_at: DateTime<Utc> },

    #[error("game session service is not configured")]
    IssuerUnavailable,

    #[error("game session request failed: {0}")]
    Issuer(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insecure permissions on {0}")]
    PermissionDenied(PathBuf),
}

impl Error {
    /// Absent or expired tokens can be fixed by refreshing.
    pub fn needs_refresh(&self) -> bool {
        matches!(self, Error::NotAuthenticated | Error::Expired { .. })
    }
}
