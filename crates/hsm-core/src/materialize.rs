// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Projecting the master install and the shared overlay into instances.
//!
//! Copies are plain overwrites, so re-running one after an interruption
//! converges on the same tree.

use crate::error::{FleetError, Result};
use crate::layout::{FleetLayout, Ordinal, INSTANCE_CONFIG_FILE, MODS_DIR};
use std::fs;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use walkdir::WalkDir;

/// Instance-owned entries that a master copy must never touch.
pub const MASTER_EXCLUDES: &[&str] = &["universe", "logs", INSTANCE_CONFIG_FILE];

/// The overlay never carries an instance config.
pub const SHARED_EXCLUDES: &[&str] = &[INSTANCE_CONFIG_FILE];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub files: u64,
    pub dirs: u64,
    pub bytes: u64,
}

fn is_excluded(relative: &Path, excludes: &[&str]) -> bool {
    excludes.iter().any(|ex| relative.starts_with(ex))
}

/// Recursively copy `src` into `dst`, skipping any entry whose path relative
/// to `src` is, or lies under, one of `excludes`.
///
/// Permission bits are preserved. `cancel` is checked before every entry.
pub fn copy_tree(
    src: &Path,
    dst: &Path,
    excludes: &[&str],
    cancel: &CancellationToken,
) -> Result<CopyStats> {
    if !src.is_dir() {
        return Err(FleetError::SourceMissing(src.to_path_buf()));
    }

    let mut stats = CopyStats::default();
    let walker = WalkDir::new(src)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            entry
                .path()
                .strip_prefix(src)
                .map(|rel| rel.as_os_str().is_empty() || !is_excluded(rel, excludes))
                .unwrap_or(true)
        });

    for entry in walker {
        if cancel.is_cancelled() {
            return Err(FleetError::Cancelled);
        }
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            FleetError::Io {
                action: "walking",
                path,
                source: e.into(),
            }
        })?;

        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|_| FleetError::SourceMissing(entry.path().to_path_buf()))?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(FleetError::io("creating", &target))?;
            let perms = entry
                .metadata()
                .map_err(|e| FleetError::Io {
                    action: "reading",
                    path: entry.path().to_path_buf(),
                    source: e.into(),
                })?
                .permissions();
            fs::set_permissions(&target, perms).map_err(FleetError::io("chmod", &target))?;
            stats.dirs += 1;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
            stats.files += 1;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(FleetError::io("creating", parent))?;
            }
            // fs::copy carries the permission bits over
            let bytes = fs::copy(entry.path(), &target).map_err(FleetError::io("copying to", &target))?;
            stats.files += 1;
            stats.bytes += bytes;
        }
    }

    Ok(stats)
}

#[cfg(unix)]
fn copy_symlink(src: &Path, target: &Path) -> Result<()> {
    let link = fs::read_link(src).map_err(FleetError::io("reading link", src))?;
    if fs::symlink_metadata(target).is_ok() {
        fs::remove_file(target).map_err(FleetError::io("replacing", target))?;
    }
    std::os::unix::fs::symlink(&link, target).map_err(FleetError::io("linking", target))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, target: &Path) -> Result<()> {
    fs::copy(src, target).map_err(FleetError::io("copying to", target))?;
    Ok(())
}

/// Master install into instance `ordinal`, leaving world state, logs and the
/// instance config alone.
#[instrument(skip(layout, cancel), fields(ordinal = %ordinal))]
pub fn copy_master_to_instance(
    layout: &FleetLayout,
    ordinal: Ordinal,
    cancel: &CancellationToken,
) -> Result<CopyStats> {
    let stats = copy_tree(
        &layout.master_dir(),
        &layout.instance_dir(ordinal),
        MASTER_EXCLUDES,
        cancel,
    )?;
    debug!(files = stats.files, bytes = stats.bytes, "Copied master install");
    Ok(stats)
}

/// Shared overlay into instance `ordinal`.
///
/// A fleet without an overlay yet gets an empty one (with `mods/`) and
/// nothing is copied.
#[instrument(skip(layout, cancel), fields(ordinal = %ordinal))]
pub fn copy_shared_to_instance(
    layout: &FleetLayout,
    ordinal: Ordinal,
    cancel: &CancellationToken,
) -> Result<CopyStats> {
    let shared = layout.shared_dir();
    if !shared.is_dir() {
        let mods = shared.join(MODS_DIR);
        fs::create_dir_all(&mods).map_err(FleetError::io("creating", &mods))?;
        debug!("Created empty shared overlay");
        return Ok(CopyStats::default());
    }
    copy_tree(&shared, &layout.instance_dir(ordinal), SHARED_EXCLUDES, cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn snapshot(root: &Path) -> Vec<(String, Vec<u8>)> {
        let mut files: Vec<_> = WalkDir::new(root)
            .into_iter()
            .map(|e| e.unwrap())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let rel = e.path().strip_prefix(root).unwrap().display().to_string();
                (rel, fs::read(e.path()).unwrap())
            })
            .collect();
        files.sort();
        files
    }

    #[test]
    fn excluded_paths_and_subtrees_are_skipped() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        write(&src.join("Server/HytaleServer.jar"), "jar");
        write(&src.join("universe/worlds/default/chunk.bin"), "master world");
        write(&src.join("logs/latest.log"), "master log");
        write(&src.join("config.json"), "{}");
        write(&src.join("universe-notes.txt"), "kept");

        let dst = dir.path().join("dst");
        let stats = copy_tree(&src, &dst, MASTER_EXCLUDES, &CancellationToken::new()).unwrap();

        assert!(dst.join("Server/HytaleServer.jar").exists());
        assert!(dst.join("universe-notes.txt").exists());
        assert!(!dst.join("universe").exists());
        assert!(!dst.join("logs").exists());
        assert!(!dst.join("config.json").exists());
        assert_eq!(stats.files, 2);
    }

    #[test]
    fn missing_source_is_reported() {
        let dir = TempDir::new().unwrap();
        let err = copy_tree(
            &dir.path().join("nope"),
            &dir.path().join("dst"),
            &[],
            &CancellationToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, FleetError::SourceMissing(_)));
    }

    #[test]
    fn cancellation_is_distinct() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        write(&src.join("a.txt"), "a");
        let token = CancellationToken::new();
        token.cancel();

        let err = copy_tree(&src, &dir.path().join("dst"), &[], &token).unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn copying_twice_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        write(&src.join("Server/HytaleServer.jar"), "jar-bytes");
        write(&src.join("Assets.zip"), "assets");
        write(&src.join("Server/lib/a.so"), "lib");
        let dst = dir.path().join("dst");
        let token = CancellationToken::new();

        copy_tree(&src, &dst, MASTER_EXCLUDES, &token).unwrap();
        let first = snapshot(&dst);
        copy_tree(&src, &dst, MASTER_EXCLUDES, &token).unwrap();
        assert_eq!(snapshot(&dst), first);
    }

    #[cfg(unix)]
    #[test]
    fn permission_bits_are_preserved() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let script = src.join("start.sh");
        write(&script, "#!/bin/sh\n");
        fs::set_permissions(&script, fs::Permissions::from_mode(0o750)).unwrap();

        let dst = dir.path().join("dst");
        copy_tree(&src, &dst, &[], &CancellationToken::new()).unwrap();
        let mode = fs::metadata(dst.join("start.sh")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o750);
    }

    #[test]
    fn master_copy_preserves_instance_state() {
        let dir = TempDir::new().unwrap();
        let layout = FleetLayout::new(dir.path(), 5520, "hytale", "hytale-server");
        let master = layout.master_dir();
        write(&master.join("Server/HytaleServer.jar"), "v2");
        write(&master.join("universe/worlds/default/level.dat"), "master world");
        write(&master.join("logs/server.log"), "master log");
        write(&master.join("config.json"), "{\"ServerName\":\"master\"}");

        let ord = Ordinal::FIRST;
        let instance = layout.instance_dir(ord);
        write(&instance.join("universe/worlds/default/level.dat"), "instance world");
        write(&instance.join("logs/server.log"), "instance log");
        write(&instance.join("config.json"), "{\"ServerName\":\"hytale-1\"}");

        copy_master_to_instance(&layout, ord, &CancellationToken::new()).unwrap();

        let read = |p: &str| fs::read_to_string(instance.join(p)).unwrap();
        assert_eq!(read("Server/HytaleServer.jar"), "v2");
        assert_eq!(read("universe/worlds/default/level.dat"), "instance world");
        assert_eq!(read("logs/server.log"), "instance log");
        assert_eq!(read("config.json"), "{\"ServerName\":\"hytale-1\"}");
    }

    #[test]
    fn missing_overlay_is_created_empty() {
        let dir = TempDir::new().unwrap();
        let layout = FleetLayout::new(dir.path(), 5520, "hytale", "hytale-server");
        let stats =
            copy_shared_to_instance(&layout, Ordinal::FIRST, &CancellationToken::new()).unwrap();
        assert_eq!(stats, CopyStats::default());
        assert!(layout.mods_dir().is_dir());
    }
}
