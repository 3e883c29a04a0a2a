// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! On-disk token and credential files
//!
//! Every file is created as a 0600 temp sibling and renamed into place, so a
//! reader never sees a partial or world-readable file. The directory holding
//! them is restricted to 0700.

use crate::config::CredentialsConfig;
use crate::error::{Error, Result};
use crate::types::{DownloaderCredentials, SessionTokens};
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs as async_fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

async fn write_secret_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            async_fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700)).await?;
        }
    }

    let mut content = serde_json::to_string_pretty(value)?;
    content.push('\n');

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_file = PathBuf::from(temp_name);

    let mut options = async_fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(&temp_file).await?;
    #[cfg(unix)]
    {
        // mode() only applies when the file is created
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600)).await?;
    }
    file.write_all(content.as_bytes()).await?;
    file.sync_all().await?;
    drop(file);

    async_fs::rename(&temp_file, path).await?;
    Ok(())
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match async_fs::read_to_string(path).await {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub async fn save_session_tokens(config: &CredentialsConfig, tokens: &SessionTokens) -> Result<()> {
    if !tokens.is_complete() {
        return Err(Error::Validation(
            "session and identity tokens must both be set".into(),
        ));
    }
    let path = config.session_tokens_file();
    write_secret_json(&path, tokens).await?;
    info!(
        path = %path.display(),
        session_token = %hsm_logging::redact(&tokens.session_token),
        expires_at = %tokens.expires_at,
        "Stored session tokens"
    );
    Ok(())
}

/// Stored bundle regardless of expiry.
pub async fn read_session_tokens(config: &CredentialsConfig) -> Result<Option<SessionTokens>> {
    read_json(&config.session_tokens_file()).await
}

/// A bundle that is usable right now.
///
/// Absence is `NotAuthenticated` and a stale bundle is `Expired`; both are
/// fixed by refreshing through a [`crate::GameSessionIssuer`].
pub async fn load_session_tokens(config: &CredentialsConfig) -> Result<SessionTokens> {
    let tokens = read_session_tokens(config)
        .await?
        .ok_or(Error::NotAuthenticated)?;
    if tokens.is_expired_at(Utc::now()) {
        return Err(Error::Expired {
            expired_at: tokens.expires_at,
        });
    }
    Ok(tokens)
}

/// Removes the stored bundle. Returns whether one existed.
pub async fn clear_session_tokens(config: &CredentialsConfig) -> Result<bool> {
    match async_fs::remove_file(config.session_tokens_file()).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Persists downloader credentials when any are given.
///
/// Returns the path to hand to the downloader: the freshly written file, a
/// previously stored one, or `None` when there is nothing to pass.
pub async fn save_downloader_credentials(
    config: &CredentialsConfig,
    credentials: &DownloaderCredentials,
) -> Result<Option<PathBuf>> {
    let path = config.downloader_credentials_file();
    if credentials.has_credentials() {
        write_secret_json(&path, credentials).await?;
        debug!(path = %path.display(), "Stored downloader credentials");
        return Ok(Some(path));
    }
    Ok(async_fs::try_exists(&path).await?.then_some(path))
}

pub async fn load_downloader_credentials(
    config: &CredentialsConfig,
) -> Result<Option<DownloaderCredentials>> {
    read_json(&config.downloader_credentials_file()).await
}

/// Rejects credential files readable by group or others.
pub async fn validate_permissions(config: &CredentialsConfig) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        for path in [
            config.session_tokens_file(),
            config.downloader_credentials_file(),
        ] {
            let metadata = match async_fs::metadata(&path).await {
                Ok(m) => m,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            if metadata.permissions().mode() & 0o077 != 0 {
                return Err(Error::PermissionDenied(path));
            }
        }
    }
    #[cfg(not(unix))]
    let _ = config;
    Ok(())
}
