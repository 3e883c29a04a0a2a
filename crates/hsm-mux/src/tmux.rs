// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! tmux session backend
//!
//! Implements the SessionMux trait for tmux using its command-line interface.
//! Session targets are always passed with the `=` prefix so `hytale-server-1`
//! never matches `hytale-server-10` by prefix.

use hsm_mux_core::{MuxError, SessionMux};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, instrument};

/// tmux session backend
#[derive(Debug, Clone, Default)]
pub struct TmuxMultiplexer {
    /// Optional `-L` socket name, keeps tests away from the user's server
    socket: Option<String>,
}

impl TmuxMultiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a dedicated tmux server socket.
    pub fn with_socket(socket: impl Into<String>) -> Self {
        Self {
            socket: Some(socket.into()),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("tmux");
        if let Some(socket) = &self.socket {
            cmd.args(["-L", socket]);
        }
        cmd
    }

    /// Run a tmux command and return its output
    fn run_tmux_command(&self, args: &[&str]) -> Result<String, MuxError> {
        let output = self.command().args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MuxError::NotAvailable("tmux")
            } else {
                MuxError::Io(e)
            }
        })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(MuxError::CommandFailed(format!(
                "tmux {} failed: {}",
                args.join(" "),
                stderr.trim()
            )))
        }
    }
}

fn session_target(name: &str) -> String {
    format!("={name}")
}

fn pane_target(name: &str) -> String {
    format!("={name}:")
}

impl SessionMux for TmuxMultiplexer {
    fn id(&self) -> &'static str {
        "tmux"
    }

    fn is_available(&self) -> bool {
        Command::new("tmux")
            .arg("-V")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    #[instrument(skip(self, command), fields(component = "hsm_mux"))]
    fn create_detached_session(
        &self,
        name: &str,
        workdir: &Path,
        command: &[String],
    ) -> Result<(), MuxError> {
        if self.has_session(name) {
            return Err(MuxError::SessionExists(name.to_string()));
        }
        let workdir = workdir.to_string_lossy();
        let mut args = vec!["new-session", "-d", "-s", name, "-c", workdir.as_ref()];
        args.extend(command.iter().map(String::as_str));
        debug!(program = ?command.first(), "Creating detached tmux session");
        self.run_tmux_command(&args)?;
        Ok(())
    }

    fn has_session(&self, name: &str) -> bool {
        self.command()
            .args(["has-session", "-t", &session_target(name)])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn send_keys(&self, name: &str, text: &str) -> Result<(), MuxError> {
        if !self.has_session(name) {
            return Err(MuxError::SessionNotFound(name.to_string()));
        }
        let target = pane_target(name);
        // -l sends the text literally, Enter goes separately as a key name
        self.run_tmux_command(&["send-keys", "-t", &target, "-l", text])?;
        self.run_tmux_command(&["send-keys", "-t", &target, "C-m"])?;
        Ok(())
    }

    fn capture_pane(&self, name: &str, lines: usize) -> Result<String, MuxError> {
        if !self.has_session(name) {
            return Err(MuxError::SessionNotFound(name.to_string()));
        }
        let start = format!("-{lines}");
        let captured =
            self.run_tmux_command(&["capture-pane", "-p", "-t", &pane_target(name), "-S", &start])?;
        Ok(last_lines(&captured, lines))
    }

    fn kill_session(&self, name: &str) -> Result<(), MuxError> {
        if !self.has_session(name) {
            return Err(MuxError::SessionNotFound(name.to_string()));
        }
        self.run_tmux_command(&["kill-session", "-t", &session_target(name)])?;
        Ok(())
    }

    fn list_sessions(&self) -> Result<Vec<String>, MuxError> {
        match self.run_tmux_command(&["list-sessions", "-F", "#{session_name}"]) {
            Ok(out) => Ok(out.lines().map(str::to_string).collect()),
            // No server means no sessions
            Err(MuxError::CommandFailed(msg))
                if msg.contains("no server running") || msg.contains("error connecting") =>
            {
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}

/// `capture-pane -S -N` also returns the visible pane; keep only the tail.
fn last_lines(text: &str, lines: usize) -> String {
    let trimmed = text.trim_end_matches('\n');
    if trimmed.is_empty() || lines == 0 {
        return String::new();
    }
    let all: Vec<&str> = trimmed.split('\n').collect();
    let mut tail = all[all.len().saturating_sub(lines)..].join("\n");
    tail.push('\n');
    tail
}
