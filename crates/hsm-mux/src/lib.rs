// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Session backends for the fleet supervisor.

use tracing::{debug, info, instrument};

pub mod tmux;

pub use hsm_mux_core::{MuxError, SessionMux};
pub use tmux::TmuxMultiplexer;

/// Get the session backend for the current system.
#[instrument(fields(component = "hsm_mux", operation = "default_multiplexer"))]
pub fn default_multiplexer() -> Result<Box<dyn SessionMux>, MuxError> {
    let tmux = TmuxMultiplexer::new();
    if tmux.is_available() {
        info!(multiplexer = "tmux", "Found available multiplexer");
        return Ok(Box::new(tmux));
    }
    debug!(multiplexer = "tmux", "Multiplexer not available");
    Err(MuxError::NotAvailable("tmux"))
}
