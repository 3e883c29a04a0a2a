// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Environment variable and CLI flag overlays

use crate::error::Result;
use serde_json::{Map, Value as J};

/// `HSM_*` variables that steer the tooling itself rather than the fleet.
const NON_CONFIG_KEYS: &[&str] = &[
    "home",
    "system-config",
    "user-config",
    "log-dir",
    "access-token",
    "downloader-secret",
];

/// Create JSON overlay from HSM_* environment variables.
///
/// `HSM_BASE_PORT=6000` becomes `base-port = 6000` and
/// `HSM_DOWNLOADER__PATCHLINE=pre-release` becomes `downloader.patchline`.
pub fn env_overlay() -> Result<J> {
    let built = config::Config::builder()
        .add_source(
            config::Environment::with_prefix("HSM")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let raw = built.try_deserialize::<Map<String, J>>()?;
    let mut overlay = normalize_keys(J::Object(raw));
    if let J::Object(map) = &mut overlay {
        map.retain(|k, _| !NON_CONFIG_KEYS.contains(&k.as_str()));
    }
    Ok(overlay)
}

/// Lowercases keys and turns `snake_case` segments into `kebab-case`.
fn normalize_keys(value: J) -> J {
    match value {
        J::Object(map) => J::Object(
            map.into_iter()
                .map(|(k, v)| (k.to_lowercase().replace('_', "-"), normalize_keys(v)))
                .collect(),
        ),
        other => other,
    }
}

/// Create JSON overlay from CLI flag key=value pairs.
///
/// Values that read as JSON scalars (`6000`, `true`) keep their type,
/// everything else is a string.
pub fn flags_overlay(kv_pairs: &[(&str, &str)]) -> J {
    let mut root = J::Object(Map::new());
    for (k, v) in kv_pairs {
        crate::merge::insert_dotted(&mut root, k, scalar_from_flag(v));
    }
    root
}

fn scalar_from_flag(raw: &str) -> J {
    match serde_json::from_str::<J>(raw) {
        Ok(v @ (J::Number(_) | J::Bool(_))) => v,
        _ => J::String(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;

    #[test]
    fn flags_keep_scalar_types() {
        let overlay = flags_overlay(&[
            ("base-port", "6000"),
            ("extension.enabled", "false"),
            ("data-dir", "/srv/hytale"),
        ]);
        assert_eq!(
            overlay,
            json!({
                "base-port": 6000,
                "extension": { "enabled": false },
                "data-dir": "/srv/hytale"
            })
        );
    }

    #[test]
    #[serial]
    fn env_overlay_reads_prefixed_variables() {
        std::env::set_var("HSM_BASE_PORT", "7000");
        std::env::set_var("HSM_DOWNLOADER__PATCHLINE", "pre-release");
        std::env::set_var("HSM_LOG_DIR", "/tmp/ignored");

        let overlay = env_overlay().unwrap();

        std::env::remove_var("HSM_BASE_PORT");
        std::env::remove_var("HSM_DOWNLOADER__PATCHLINE");
        std::env::remove_var("HSM_LOG_DIR");

        assert_eq!(overlay["base-port"], 7000);
        assert_eq!(overlay["downloader"]["patchline"], "pre-release");
        assert!(overlay.get("log-dir").is_none());
    }
}
