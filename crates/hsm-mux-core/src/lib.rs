// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Detached terminal session primitives.
//!
//! A server instance runs inside one named, detached session. The fleet layer
//! only needs to create such a session, probe it, type into it, read back its
//! scrollback and tear it down; every backend implements exactly that surface.

use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    #[error("{0} is not available on this system")]
    NotAvailable(&'static str),
    #[error("session {0} does not exist")]
    SessionNotFound(String),
    #[error("session {0} already exists")]
    SessionExists(String),
    #[error("{0}")]
    CommandFailed(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A backend able to host named, detached sessions.
///
/// Calls against distinct session names are independent and may run
/// concurrently. Lifecycle calls for the same name must be serialized by the
/// caller.
#[cfg_attr(feature = "mock", mockall::automock)]
pub trait SessionMux: Send + Sync {
    /// Short backend identifier, e.g. `"tmux"`.
    fn id(&self) -> &'static str;

    fn is_available(&self) -> bool;

    /// Launches `command` (program followed by its arguments) in a new
    /// detached session named `name` whose working directory is `workdir`.
    fn create_detached_session(
        &self,
        name: &str,
        workdir: &Path,
        command: &[String],
    ) -> Result<(), MuxError>;

    /// Liveness probe with no side effects.
    fn has_session(&self, name: &str) -> bool;

    /// Types `text` into the session and presses Enter.
    fn send_keys(&self, name: &str, text: &str) -> Result<(), MuxError>;

    /// Returns the last `lines` lines of the session's scrollback.
    fn capture_pane(&self, name: &str, lines: usize) -> Result<String, MuxError>;

    fn kill_session(&self, name: &str) -> Result<(), MuxError>;

    /// Names of every session currently hosted by the backend.
    fn list_sessions(&self) -> Result<Vec<String>, MuxError>;
}
