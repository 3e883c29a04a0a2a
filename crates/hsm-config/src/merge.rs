// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! JSON merging functionality

use serde_json::{Map, Value as J};

/// Objects are merged recursively, scalars/arrays replace the left value.
/// A `null` on the right never erases a value.
pub fn merge_two_json(base: &mut J, layer: J) {
    match (base, layer) {
        (J::Object(a), J::Object(b)) => {
            for (k, v) in b {
                merge_two_json(a.entry(k).or_insert(J::Null), v);
            }
        }
        (_, J::Null) => {}
        (a, b) => *a = b,
    }
}

/// Insert a value at a dotted path, creating intermediate objects and
/// replacing any scalar that sits where an object is needed.
pub fn insert_dotted(root: &mut J, dotted: &str, v: J) {
    let mut parts: Vec<&str> = dotted.split('.').filter(|p| !p.is_empty()).collect();
    let Some(last) = parts.pop() else {
        return;
    };

    let mut cur = root;
    for p in parts {
        if !cur.is_object() {
            *cur = J::Object(Map::new());
        }
        let J::Object(map) = cur else {
            return;
        };
        cur = map.entry(p).or_insert_with(|| J::Object(Map::new()));
    }

    if !cur.is_object() {
        *cur = J::Object(Map::new());
    }
    if let J::Object(map) = cur {
        map.insert(last.to_string(), v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_objects_merge_and_arrays_replace() {
        let mut base = json!({
            "base-port": 5520,
            "jvm-args": ["-Xmx8G"],
            "downloader": { "patchline": "production", "install-path": "/usr/local/bin/x" }
        });
        merge_two_json(
            &mut base,
            json!({
                "jvm-args": ["-Xmx4G", "-XX:+UseZGC"],
                "downloader": { "patchline": "pre-release" },
                "max-players": null
            }),
        );
        assert_eq!(base["base-port"], 5520);
        assert_eq!(base["jvm-args"], json!(["-Xmx4G", "-XX:+UseZGC"]));
        assert_eq!(base["downloader"]["patchline"], "pre-release");
        assert_eq!(base["downloader"]["install-path"], "/usr/local/bin/x");
    }

    #[test]
    fn insert_dotted_builds_intermediate_objects() {
        let mut root = json!({ "auth": "scalar" });
        insert_dotted(&mut root, "auth.session-endpoint", json!("https://auth.local"));
        insert_dotted(&mut root, "base-port", json!(6000));
        assert_eq!(root["auth"]["session-endpoint"], "https://auth.local");
        assert_eq!(root["base-port"], 6000);
    }
}
