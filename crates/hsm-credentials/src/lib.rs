// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Credential material for Hytale server instances
//!
//! Two kinds of secrets are kept in the fleet's shared directory:
//! - the session token bundle passed to each server at start, which expires
//!   and is refreshed through a [`GameSessionIssuer`];
//! - the downloader's OAuth credentials.
//!
//! Both are JSON files readable only by the owner.

pub mod config;
pub mod error;
pub mod session;
pub mod storage;
pub mod types;

pub use config::CredentialsConfig;
pub use error::{Error, Result};
pub use session::{get_or_refresh, GameSessionIssuer, HttpSessionIssuer};
pub use storage::*;
pub use types::*;
