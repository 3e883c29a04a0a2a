// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::path::{Path, PathBuf};

pub const SESSION_TOKENS_FILE: &str = ".session-tokens.json";
pub const DOWNLOADER_CREDENTIALS_FILE: &str = ".hytale-downloader-credentials.json";

/// Where credential files live. They sit in the fleet's shared overlay.
#[derive(Debug, Clone)]
pub struct CredentialsConfig {
    storage_dir: PathBuf,
}

impl CredentialsConfig {
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
        }
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn session_tokens_file(&self) -> PathBuf {
        self.storage_dir.join(SESSION_TOKENS_FILE)
    }

    pub fn downloader_credentials_file(&self) -> PathBuf {
        self.storage_dir.join(DOWNLOADER_CREDENTIALS_FILE)
    }
}
