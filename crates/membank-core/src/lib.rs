//! Memory bank core: a document store for five structured markdown files
//! plus a knowledge graph, backed by a single directory on disk.
//!
//! Grounded on the teacher's crate layout (`padz-core` wiring `store`,
//! `model`, and `config` behind one facade type); [`MemoryBank`] plays the
//! role `padz-core`'s `PadStore` plays there, combining the document and
//! graph components behind the one entry point the tool surface calls.

pub mod config;
pub mod digest;
pub mod document;
pub mod error;
pub mod fingerprint;
pub mod graph;
pub mod model;
pub mod paths;
pub mod registry;
pub mod writers;

pub use config::MemoryBankConfig;
pub use digest::{context_digest, ContextDigest, DigestOptions};
pub use document::DocumentStore;
pub use error::{MemoryBankError, Result};
pub use graph::GraphStore;
pub use paths::StoreLayout;
pub use writers::{
    add_progress_entry, add_session_note, update_tasks, AddProgressEntryRequest,
    AddSessionNoteRequest, ProgressCategory, UpdateTasksRequest,
};

/// A single open store: its document set and its knowledge graph, plus the
/// process-registry handle that keeps a second `MemoryBank` from opening
/// the same directory concurrently.
///
/// Holding both components behind one type also matches how most tool-surface
/// operations are scoped in spec.md §6: a single `store_id`/path picks out
/// both the documents and the graph together, never one without the other.
pub struct MemoryBank {
    documents: DocumentStore,
    graph: GraphStore,
    _handle: registry::StoreHandle,
}

/// Answer to `get_memory_bank_status`.
#[derive(Debug, Clone)]
pub struct MemoryBankStatus {
    pub store_id: String,
    pub documents_present: Vec<String>,
    pub graph_stats: graph::GraphStats,
}

impl MemoryBank {
    /// `initialize_memory_bank`: opens (creating on first use) the store
    /// rooted at `path`. Fails if this process already has a `MemoryBank`
    /// open on the same (canonicalized) path.
    pub fn initialize(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let handle = registry::open(path.as_ref())?;
        let layout = StoreLayout::new(path.as_ref())?;

        // Validate the graph log before materializing anything else: a
        // store whose log has a bad marker must fail with no modification
        // at all, not five freshly-templated documents left behind (spec
        // §8 property 10).
        let graph = GraphStore::initialize(layout.clone())?;

        let documents = DocumentStore::new(layout);
        documents.initialize()?;

        Ok(Self {
            documents,
            graph,
            _handle: handle,
        })
    }

    pub fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    pub fn graph(&self) -> &GraphStore {
        &self.graph
    }

    /// `get_context_digest`: the compact synthesis used for handing a fresh
    /// agent session just enough state to continue working.
    pub fn context_digest(&self, opts: &DigestOptions) -> ContextDigest {
        context_digest(&self.documents, Some(&self.graph), opts)
    }

    /// `get_context_bundle`: every core document's current content and
    /// ETag in one call, for priming a fresh session without five reads.
    /// A document that doesn't exist yet is simply absent from the map.
    pub fn context_bundle(&self) -> std::collections::BTreeMap<String, (Vec<u8>, String)> {
        let mut bundle = std::collections::BTreeMap::new();
        for name in paths::CORE_DOCUMENTS {
            if let Ok(pair) = self.documents.read(name) {
                bundle.insert(name.to_string(), pair);
            }
        }
        bundle
    }

    /// `get_memory_bank_status`: which core documents exist and the graph's
    /// current size, for a quick health check before doing real work.
    pub fn status(&self) -> Result<MemoryBankStatus> {
        let files = self.documents.list()?;
        let present: Vec<String> = paths::CORE_DOCUMENTS
            .iter()
            .filter(|name| files.contains(&name.to_string()))
            .map(|name| name.to_string())
            .collect();
        Ok(MemoryBankStatus {
            store_id: self.documents.layout().store_id().to_string(),
            documents_present: present,
            graph_stats: self.graph.stats(),
        })
    }

    /// `create_backup`: a full point-in-time copy of the store directory.
    pub fn create_backup(&self) -> Result<String> {
        document::backup::backup(self.documents.layout())
    }

    /// `list_backups`: backup ids newest first.
    pub fn list_backups(&self) -> Result<Vec<String>> {
        document::backup::list_backups(self.documents.layout())
    }

    /// `restore_backup`: restores `backup_id` over this store's directory.
    /// Mutates the document set and graph log out from under this
    /// `MemoryBank`'s in-memory state, so callers should re-`initialize`
    /// afterward rather than keep using this instance.
    pub fn restore_backup(
        &self,
        backup_id: &str,
        create_pre_restore_backup: bool,
    ) -> Result<document::backup::RestoreOutcome> {
        document::backup::restore(self.documents.layout(), backup_id, create_pre_restore_backup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn initialize_creates_core_documents_and_empty_graph() {
        let dir = tempdir().unwrap();
        let bank = MemoryBank::initialize(dir.path()).unwrap();
        let files = bank.documents().list().unwrap();
        assert_eq!(files.len(), 5);
        assert_eq!(bank.graph().stats().entity_count, 0);
    }

    #[test]
    fn a_second_open_of_the_same_path_is_rejected() {
        let dir = tempdir().unwrap();
        let _first = MemoryBank::initialize(dir.path()).unwrap();
        let second = MemoryBank::initialize(dir.path());
        assert!(second.is_err());
    }

    #[test]
    fn backup_then_restore_round_trips_document_content() {
        let dir = tempdir().unwrap();
        let bank = MemoryBank::initialize(dir.path()).unwrap();
        bank.documents()
            .write("active-context.md", b"hello world", None)
            .unwrap();

        let backup_id = bank.create_backup().unwrap();
        bank.documents()
            .write("active-context.md", b"overwritten", None)
            .unwrap();

        bank.restore_backup(&backup_id, false).unwrap();
        let (bytes, _) = bank.documents().read("active-context.md").unwrap();
        assert_eq!(bytes, b"hello world");
    }
}
