// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Streaming HTTP downloads to disk.

use crate::error::{FleetError, Result};
use crate::progress::ProgressReporter;
use futures::StreamExt;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const USER_AGENT: &str = concat!("hytale-server-manager/", env!("CARGO_PKG_VERSION"));
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

pub fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(HTTP_TIMEOUT)
        .build()?)
}

/// Download `url` into `dest`, reporting the received fraction when the
/// server announces a length. The body goes to a sibling `.part` file that
/// is renamed into place only once complete.
pub async fn download_to_file(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    progress: &dyn ProgressReporter,
    label: &str,
    cancel: &CancellationToken,
) -> Result<u64> {
    let response = tokio::select! {
        r = client.get(url).send() => r?.error_for_status()?,
        _ = cancel.cancelled() => return Err(FleetError::Cancelled),
    };
    let total = response.content_length().filter(|n| *n > 0);

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(FleetError::io("creating", parent))?;
    }
    let partial = dest.with_extension("part");
    let mut file = tokio::fs::File::create(&partial)
        .await
        .map_err(FleetError::io("creating", &partial))?;

    let mut received: u64 = 0;
    let mut stream = response.bytes_stream();
    loop {
        let chunk = tokio::select! {
            chunk = stream.next() => chunk,
            _ = cancel.cancelled() => {
                drop(file);
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(FleetError::Cancelled);
            }
        };
        let Some(chunk) = chunk else { break };
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(FleetError::io("writing", &partial))?;
        received += chunk.len() as u64;
        if let Some(total) = total {
            progress.report(received as f64 / total as f64, label);
        }
    }
    file.flush().await.map_err(FleetError::io("writing", &partial))?;
    drop(file);

    tokio::fs::rename(&partial, dest)
        .await
        .map_err(FleetError::io("renaming", dest))?;
    debug!(url, path = %dest.display(), bytes = received, "Downloaded");
    Ok(received)
}
