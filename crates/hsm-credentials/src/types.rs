// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How long a freshly issued game session is trusted.
pub const SESSION_LIFETIME_MINUTES: i64 = 55;

/// Short-lived material that lets an instance start authenticated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTokens {
    pub session_token: String,
    pub identity_token: String,
    #[serde(default)]
    pub owner_uuid: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionTokens {
    /// Bundle issued now, valid for the standard session lifetime.
    pub fn issued_now(session_token: String, identity_token: String, owner_uuid: String) -> Self {
        Self {
            session_token,
            identity_token,
            owner_uuid,
            expires_at: Utc::now() + Duration::minutes(SESSION_LIFETIME_MINUTES),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Both tokens present; the server needs the pair or neither.
    pub fn is_complete(&self) -> bool {
        !self.session_token.is_empty() && !self.identity_token.is_empty()
    }
}

/// OAuth client material handed to the downloader tool.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloaderCredentials {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub access_token: String,
}

impl DownloaderCredentials {
    pub fn has_credentials(&self) -> bool {
        !self.access_token.is_empty()
            || (!self.client_id.is_empty() && !self.client_secret.is_empty())
    }
}
