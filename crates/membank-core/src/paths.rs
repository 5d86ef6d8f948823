//! Per-store directory layout and the atomic-write primitive.
//!
//! Grounded on the teacher's `FsBackend` (`store/fs_backend.rs`): every
//! mutating write goes through a temp-sibling-then-rename, never a direct
//! truncate-in-place write.

use crate::error::{MemoryBankError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// The five core documents recognized by the document store, in a stable
/// canonical order (used for templating and for `list()` tie-breaks).
pub const CORE_DOCUMENTS: [&str; 5] = [
    "product-context.md",
    "active-context.md",
    "progress.md",
    "decision-log.md",
    "system-patterns.md",
];

/// Legacy camelCase filenames mapped to their canonical kebab-case name,
/// for `migrate_file_naming`.
pub const LEGACY_DOCUMENT_NAMES: [(&str, &str); 5] = [
    ("productContext.md", "product-context.md"),
    ("activeContext.md", "active-context.md"),
    ("progress.md", "progress.md"),
    ("decisionLog.md", "decision-log.md"),
    ("systemPatterns.md", "system-patterns.md"),
];

pub const GRAPH_DIR: &str = "graph";
pub const GRAPH_LOG_FILE: &str = "graph.jsonl";
pub const GRAPH_SNAPSHOT_FILE: &str = "graph.snapshot.json";
pub const GRAPH_INDEX_FILE: &str = "graph.index.json";
pub const GRAPH_RENDER_FILE: &str = "graph.md";

/// Identifies a store by its absolute root path and a derived id (the
/// directory's basename).
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
    store_id: String,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let store_id = root
            .file_name()
            .and_then(|s| s.to_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                MemoryBankError::InvalidInput(format!(
                    "store path {} has no basename to derive a store id from",
                    root.display()
                ))
            })?;
        Ok(Self { root, store_id })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store_id(&self) -> &str {
        &self.store_id
    }

    pub fn document_path(&self, filename: &str) -> PathBuf {
        self.root.join(filename)
    }

    pub fn graph_dir(&self) -> PathBuf {
        self.root.join(GRAPH_DIR)
    }

    pub fn graph_log_path(&self) -> PathBuf {
        self.graph_dir().join(GRAPH_LOG_FILE)
    }

    pub fn graph_snapshot_path(&self) -> PathBuf {
        self.graph_dir().join(GRAPH_SNAPSHOT_FILE)
    }

    pub fn graph_index_path(&self) -> PathBuf {
        self.graph_dir().join(GRAPH_INDEX_FILE)
    }

    pub fn graph_render_path(&self) -> PathBuf {
        self.graph_dir().join(GRAPH_RENDER_FILE)
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.root
            .parent()
            .map(|p| p.join("backups"))
            .unwrap_or_else(|| self.root.join("backups"))
    }

    pub fn ensure_root(&self) -> Result<()> {
        ensure_dir(&self.root)
    }

    pub fn ensure_graph_dir(&self) -> Result<()> {
        ensure_dir(&self.graph_dir())
    }
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(MemoryBankError::Io)?;
    }
    Ok(())
}

/// Writes `bytes` to `path` by materializing a temp sibling and renaming it
/// over the target. No reader ever observes a partial write: `path` either
/// has its pre-write bytes or its post-write bytes.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    ensure_dir(dir)?;
    let tmp_name = format!(
        ".{}.tmp-{}",
        path.file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("membank"),
        Uuid::new_v4()
    );
    let tmp_path = dir.join(tmp_name);
    fs::write(&tmp_path, bytes).map_err(MemoryBankError::Io)?;
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        MemoryBankError::Io(e)
    })?;
    Ok(())
}

/// Appends `bytes` to `path` with an OS-level append open. Not atomic across
/// processes (the event log is single-process by design, see spec §5), but
/// safe against partial-line torn writes under normal append semantics.
pub fn append_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    use std::io::Write;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    ensure_dir(dir)?;
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(MemoryBankError::Io)?;
    file.write_all(bytes).map_err(MemoryBankError::Io)?;
    file.flush().map_err(MemoryBankError::Io)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn store_id_derived_from_basename() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("my-project");
        let layout = StoreLayout::new(&root).unwrap();
        assert_eq!(layout.store_id(), "my-project");
        assert_eq!(layout.document_path("progress.md"), root.join("progress.md"));
    }

    #[test]
    fn write_atomic_never_leaves_partial_content() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("doc.md");
        write_atomic(&file, b"hello").unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "hello");
        write_atomic(&file, b"world!!").unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "world!!");
    }

    #[test]
    fn append_bytes_creates_and_extends() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("log.jsonl");
        append_bytes(&file, b"line1\n").unwrap();
        append_bytes(&file, b"line2\n").unwrap();
        assert_eq!(fs::read_to_string(&file).unwrap(), "line1\nline2\n");
    }

    #[test]
    fn backups_dir_is_sibling_of_root() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("proj");
        let layout = StoreLayout::new(&root).unwrap();
        assert_eq!(layout.backups_dir(), dir.path().join("backups"));
    }
}
