//! Process-wide registry of open store paths.
//!
//! A `GraphStore` holds an exclusive in-process lock over its own state,
//! but nothing stops a caller from constructing two `GraphStore`s (or a
//! `GraphStore` and a `DocumentStore`-backed writer) over the same
//! directory — this registry closes that gap with an explicit
//! `open`/`close` pair, per the design note in spec.md §9 ("In-process
//! singletons"). No teacher precedent for this concern: it is a direct
//! transcription of that note, not an enrichment from the example pack.

use crate::error::{MemoryBankError, Result};
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

static OPEN_STORES: Lazy<Mutex<HashSet<PathBuf>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Held for as long as a store is open. Dropping it (or calling
/// [`close`]) releases the path for a future `open`.
pub struct StoreHandle {
    path: PathBuf,
}

impl StoreHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreHandle {
    fn drop(&mut self) {
        let mut guard = OPEN_STORES.lock().expect("registry lock poisoned");
        guard.remove(&self.path);
    }
}

/// Registers `path` as open in this process. Fails if a handle for the
/// same (canonicalized) path is already outstanding.
pub fn open(path: impl AsRef<Path>) -> Result<StoreHandle> {
    let canonical = canonicalize_best_effort(path.as_ref());
    let mut guard = OPEN_STORES.lock().expect("registry lock poisoned");
    if !guard.insert(canonical.clone()) {
        return Err(MemoryBankError::InvalidInput(format!(
            "store already open in this process: {}",
            canonical.display()
        )));
    }
    Ok(StoreHandle { path: canonical })
}

/// Releases `handle`'s path. Equivalent to dropping it; spelled out for
/// callers that want the release to be explicit at a call site.
pub fn close(handle: StoreHandle) {
    drop(handle);
}

fn canonicalize_best_effort(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_open_of_same_path_is_rejected() {
        let dir = tempdir().unwrap();
        let _first = open(dir.path()).unwrap();
        let err = open(dir.path()).unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    #[test]
    fn closing_releases_the_path_for_reopen() {
        let dir = tempdir().unwrap();
        let first = open(dir.path()).unwrap();
        close(first);
        assert!(open(dir.path()).is_ok());
    }

    #[test]
    fn distinct_paths_can_both_be_open() {
        let dir_a = tempdir().unwrap();
        let dir_b = tempdir().unwrap();
        let _a = open(dir_a.path()).unwrap();
        let _b = open(dir_b.path()).unwrap();
    }
}
