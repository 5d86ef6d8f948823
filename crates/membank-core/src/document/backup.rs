//! Backup and restore: a directory snapshot of the whole store under a
//! sibling `backups/` directory.
//!
//! Grounded on the teacher's directory-walking in `FsBackend::list_content_ids`,
//! reusing `write_atomic` for every copied file so a crash mid-restore never
//! leaves a half-written document.

use crate::error::{MemoryBankError, Result};
use crate::paths::{ensure_dir, write_atomic, StoreLayout};
use chrono::Utc;
use std::fs;
use std::path::Path;

pub struct RestoreOutcome {
    pub restored_files: Vec<String>,
    pub pre_restore_backup_id: Option<String>,
}

/// Copies every regular file directly under `layout.root()` (the document
/// set; the `graph/` subdirectory is included too, to make a backup a full
/// point-in-time copy of the store) into a new `backups/<timestamp>-<id>`
/// directory. Returns the new backup's leaf name.
pub fn backup(layout: &StoreLayout) -> Result<String> {
    let backups_root = layout.backups_dir();
    ensure_dir(&backups_root)?;

    let timestamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
    let backup_id = format!("{}-{}", timestamp, layout.store_id());
    let dest = backups_root.join(&backup_id);
    ensure_dir(&dest)?;

    copy_tree(layout.root(), &dest)?;

    Ok(backup_id)
}

/// Lists backup ids under `backups/`, newest first (lexicographic order on
/// the timestamp-prefixed name is chronological order).
pub fn list_backups(layout: &StoreLayout) -> Result<Vec<String>> {
    let backups_root = layout.backups_dir();
    if !backups_root.exists() {
        return Ok(Vec::new());
    }
    let mut ids = Vec::new();
    for entry in fs::read_dir(&backups_root).map_err(MemoryBankError::Io)? {
        let entry = entry.map_err(MemoryBankError::Io)?;
        if entry.path().is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                ids.push(name.to_string());
            }
        }
    }
    ids.sort();
    ids.reverse();
    Ok(ids)
}

/// Replaces the store directory's contents with those from `backup_id`.
/// Optionally takes a fresh backup of the current state first so a restore
/// is itself recoverable.
pub fn restore(
    layout: &StoreLayout,
    backup_id: &str,
    create_pre_restore_backup: bool,
) -> Result<RestoreOutcome> {
    let backup_dir = layout.backups_dir().join(backup_id);
    if !backup_dir.exists() {
        return Err(MemoryBankError::FileNotFound(format!(
            "backup not found: {backup_id}"
        )));
    }

    let pre_restore_backup_id = if create_pre_restore_backup && layout.root().exists() {
        Some(backup(layout)?)
    } else {
        None
    };

    ensure_dir(layout.root())?;
    let restored_files = copy_tree(&backup_dir, layout.root())?;

    Ok(RestoreOutcome {
        restored_files,
        pre_restore_backup_id,
    })
}

/// Recursively copies `src` into `dst`, writing each file atomically.
/// Returns the relative paths (as `/`-joined strings) of every file copied.
fn copy_tree(src: &Path, dst: &Path) -> Result<Vec<String>> {
    let mut copied = Vec::new();
    copy_tree_inner(src, dst, src, &mut copied)?;
    Ok(copied)
}

fn copy_tree_inner(
    src_root: &Path,
    dst_root: &Path,
    current: &Path,
    copied: &mut Vec<String>,
) -> Result<()> {
    for entry in fs::read_dir(current).map_err(MemoryBankError::Io)? {
        let entry = entry.map_err(MemoryBankError::Io)?;
        let path = entry.path();
        let relative = path
            .strip_prefix(src_root)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");

        if path.is_dir() {
            // `backups/` living under the store root would recurse into
            // itself; the layout never places it there, but guard anyway.
            if path == dst_root {
                continue;
            }
            ensure_dir(&dst_root.join(relative.as_str()))?;
            copy_tree_inner(src_root, dst_root, &path, copied)?;
        } else if path.is_file() {
            let bytes = fs::read(&path).map_err(MemoryBankError::Io)?;
            write_atomic(&dst_root.join(relative.as_str()), &bytes)?;
            copied.push(relative);
        }
    }
    Ok(())
}
