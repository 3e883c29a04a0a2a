// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only
#![allow(clippy::disallowed_methods)] // CLI commands intentionally print to stdout/stderr

//! Session token and downloader credential commands

use crate::context::Context;
use crate::GlobalArgs;
use anyhow::Result;
use clap::Subcommand;
use hsm_credentials::{
    clear_session_tokens, get_or_refresh, read_session_tokens, save_downloader_credentials,
    save_session_tokens, validate_permissions, DownloaderCredentials, Error as CredentialsError,
    HttpSessionIssuer, SessionTokens,
};
use hsm_logging::redact;

#[derive(Subcommand)]
pub enum TokensCommands {
    /// Show the stored session tokens (redacted)
    Show,
    /// Store a session and identity token pair
    Set {
        #[arg(long)]
        session_token: String,
        #[arg(long)]
        identity_token: String,
        /// Account that owns the servers
        #[arg(long, default_value = "")]
        owner_uuid: String,
    },
    /// Remove the stored session tokens
    Clear,
    /// Request a new game session unless the cached one is still valid
    Refresh {
        #[arg(long, env = "HSM_ACCESS_TOKEN", hide_env_values = true)]
        access_token: String,
        #[arg(long)]
        profile_uuid: String,
        /// Discard the cached tokens first
        #[arg(long)]
        force: bool,
    },
    /// Store OAuth credentials for the server downloader
    Downloader {
        #[arg(long, default_value = "")]
        client_id: String,
        #[arg(long, default_value = "", hide_env_values = true, env = "HSM_DOWNLOADER_SECRET")]
        client_secret: String,
        #[arg(long, default_value = "")]
        access_token: String,
    },
}

impl TokensCommands {
    pub async fn run(self, global: &GlobalArgs) -> Result<()> {
        let ctx = Context::load(global)?;
        let store = ctx.credentials();

        match self {
            TokensCommands::Show => {
                validate_permissions(&store).await?;
                match read_session_tokens(&store).await? {
                    None => println!("Not authenticated: no session tokens stored"),
                    Some(tokens) => print_tokens(&tokens),
                }
            }
            TokensCommands::Set {
                session_token,
                identity_token,
                owner_uuid,
            } => {
                let tokens = SessionTokens::issued_now(session_token, identity_token, owner_uuid);
                save_session_tokens(&store, &tokens).await?;
                println!("Session tokens stored, valid until {}", tokens.expires_at);
            }
            TokensCommands::Clear => {
                if clear_session_tokens(&store).await? {
                    println!("Session tokens removed");
                } else {
                    println!("No session tokens stored");
                }
            }
            TokensCommands::Refresh {
                access_token,
                profile_uuid,
                force,
            } => {
                let endpoint = ctx
                    .config
                    .auth
                    .session_endpoint
                    .as_deref()
                    .ok_or(CredentialsError::IssuerUnavailable)?;
                let issuer = HttpSessionIssuer::new(endpoint)?;
                if force {
                    clear_session_tokens(&store).await?;
                }
                let (tokens, refreshed) =
                    get_or_refresh(&store, &issuer, &access_token, &profile_uuid).await?;
                if refreshed {
                    println!("New session issued, valid until {}", tokens.expires_at);
                } else {
                    println!("Cached session still valid until {}", tokens.expires_at);
                }
            }
            TokensCommands::Downloader {
                client_id,
                client_secret,
                access_token,
            } => {
                let credentials = DownloaderCredentials {
                    client_id,
                    client_secret,
                    access_token,
                };
                match save_downloader_credentials(&store, &credentials).await? {
                    Some(path) if credentials.has_credentials() => {
                        println!("Downloader credentials stored in {}", path.display())
                    }
                    Some(path) => println!(
                        "Nothing new given; keeping credentials in {}",
                        path.display()
                    ),
                    None => anyhow::bail!(
                        "give --access-token, or --client-id with --client-secret"
                    ),
                }
            }
        }
        Ok(())
    }
}

fn print_tokens(tokens: &SessionTokens) {
    let state = if tokens.is_expired() { "expired" } else { "valid" };
    println!("Session tokens {state} (expires {})", tokens.expires_at);
    println!("  session token:  {}", redact(&tokens.session_token));
    println!("  identity token: {}", redact(&tokens.identity_token));
    if !tokens.owner_uuid.is_empty() {
        println!("  owner:          {}", tokens.owner_uuid);
    }
}
