// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Typed extraction from the merged JSON

use crate::error::{ConfigError, Result};
use serde::de::DeserializeOwned;
use serde_json::Value as J;

/// Extract the entire root configuration as a typed value
pub fn get<T: DeserializeOwned>(root: &J) -> Result<T> {
    serde_path_to_error::deserialize(root.clone()).map_err(|e| ConfigError::Extract {
        path: e.path().to_string(),
        message: e.inner().to_string(),
    })
}

/// Extract a subsection of configuration at a dotted path
pub fn get_at<T: DeserializeOwned>(root: &J, dotted: &str) -> Result<T> {
    let mut cur = root;
    for p in dotted.split('.') {
        cur = cur
            .get(p)
            .ok_or_else(|| ConfigError::MissingPath(dotted.to_string()))?;
    }
    serde_path_to_error::deserialize(cur.clone()).map_err(|e| ConfigError::Extract {
        path: format!("{dotted}.{}", e.path()),
        message: e.inner().to_string(),
    })
}
