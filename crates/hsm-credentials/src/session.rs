// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Refreshing session tokens through the game-session service

use crate::config::CredentialsConfig;
use crate::error::{Error, Result};
use crate::storage;
use crate::types::SessionTokens;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Issues a new game session for an account.
#[async_trait]
pub trait GameSessionIssuer: Send + Sync {
    async fn create_game_session(
        &self,
        access_token: &str,
        profile_uuid: &str,
    ) -> Result<SessionTokens>;
}

/// Talks to `POST <endpoint>/game-session/new` with a bearer token.
pub struct HttpSessionIssuer {
    client: reqwest::Client,
    endpoint: url::Url,
}

#[derive(Serialize)]
struct NewSessionRequest<'a> {
    uuid: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewSessionResponse {
    session_token: String,
    identity_token: String,
}

impl HttpSessionIssuer {
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = url::Url::parse(endpoint)
            .map_err(|e| Error::Validation(format!("session endpoint {endpoint}: {e}")))?;
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
        })
    }

    fn session_url(&self) -> Result<url::Url> {
        let base = self.endpoint.as_str().trim_end_matches('/');
        url::Url::parse(&format!("{base}/game-session/new"))
            .map_err(|e| Error::Validation(e.to_string()))
    }
}

#[async_trait]
impl GameSessionIssuer for HttpSessionIssuer {
    async fn create_game_session(
        &self,
        access_token: &str,
        profile_uuid: &str,
    ) -> Result<SessionTokens> {
        let url = self.session_url()?;
        debug!(%url, "Requesting new game session");
        let response = self
            .client
            .post(url)
            .bearer_auth(access_token)
            .json(&NewSessionRequest { uuid: profile_uuid })
            .send()
            .await
            .map_err(|e| Error::Issuer(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Issuer(format!("service answered {status}")));
        }
        let body: NewSessionResponse = response
            .json()
            .await
            .map_err(|e| Error::Issuer(e.to_string()))?;

        Ok(SessionTokens::issued_now(
            body.session_token,
            body.identity_token,
            profile_uuid.to_string(),
        ))
    }
}

/// Cached tokens while valid, otherwise a fresh bundle from `issuer`.
///
/// The second value is `true` when the bundle was refreshed.
pub async fn get_or_refresh(
    config: &CredentialsConfig,
    issuer: &dyn GameSessionIssuer,
    access_token: &str,
    profile_uuid: &str,
) -> Result<(SessionTokens, bool)> {
    match storage::load_session_tokens(config).await {
        Ok(tokens) => return Ok((tokens, false)),
        Err(e) if e.needs_refresh() => debug!(reason = %e, "Refreshing session tokens"),
        Err(e) => return Err(e),
    }

    let tokens = issuer
        .create_game_session(access_token, profile_uuid)
        .await?;
    storage::save_session_tokens(config, &tokens).await?;
    info!(expires_at = %tokens.expires_at, "Issued new game session");
    Ok((tokens, true))
}
