// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Provenance tracking for configuration values

use serde_json::Value as J;
use std::collections::BTreeMap;

/// Configuration scope precedence order
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum Scope {
    Default,
    System,
    User,
    Env,
    CliConfig,
    Flags,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Scope::Default => "default",
            Scope::System => "system",
            Scope::User => "user",
            Scope::Env => "env",
            Scope::CliConfig => "config-file",
            Scope::Flags => "flags",
        };
        f.write_str(name)
    }
}

#[derive(Default, Clone, Debug)]
pub struct Provenance {
    /// Maps dotted key paths to the winning scope
    pub winner: BTreeMap<String, Scope>,
    /// Maps dotted key paths to change history [(scope, value)]
    pub changes: BTreeMap<String, Vec<(Scope, J)>>,
}

impl Provenance {
    /// Record every leaf of `layer` as set by `scope`. Arrays count as leaves.
    pub fn record_layer(&mut self, layer: &J, scope: Scope) {
        self.record_at(layer, scope, "");
    }

    fn record_at(&mut self, layer: &J, scope: Scope, prefix: &str) {
        match layer {
            J::Object(obj) => {
                for (k, v) in obj {
                    let key = if prefix.is_empty() {
                        k.clone()
                    } else {
                        format!("{prefix}.{k}")
                    };
                    self.record_at(v, scope, &key);
                }
            }
            J::Null => {}
            _ => {
                self.winner.insert(prefix.to_string(), scope);
                self.changes
                    .entry(prefix.to_string())
                    .or_default()
                    .push((scope, layer.clone()));
            }
        }
    }
}
