//! Document store: atomic, versioned read/write over a fixed set of named
//! markdown documents.
//!
//! Grounded on the teacher's `StorageBackend` trait (`store/backend.rs`) and
//! `FsBackend` (`store/fs_backend.rs`), generalized from per-pad content
//! files keyed by `Uuid` to fixed document filenames.

use crate::error::{MemoryBankError, Result};
use crate::fingerprint::etag;
use crate::model::{BatchOutcome, DocumentSearchHit, WriteRequest};
use crate::paths::{write_atomic, StoreLayout, CORE_DOCUMENTS, LEGACY_DOCUMENT_NAMES};

use std::collections::BTreeMap;
use std::fs;

/// Validates a filename is a safe, flat (non-path) name.
fn validate_filename(filename: &str) -> Result<()> {
    if filename.is_empty()
        || filename.contains('/')
        || filename.contains('\\')
        || filename == "."
        || filename == ".."
    {
        return Err(MemoryBankError::Validation(format!(
            "invalid filename: {filename}"
        )));
    }
    Ok(())
}

pub struct DocumentStore {
    layout: StoreLayout,
}

impl DocumentStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Ensures the store directory exists and every core document is
    /// present, populating absent ones with their template content.
    pub fn initialize(&self) -> Result<()> {
        self.layout.ensure_root()?;
        for name in CORE_DOCUMENTS {
            let path = self.layout.document_path(name);
            if !path.exists() {
                let content = crate::document::templates::template_for(name).unwrap_or("");
                write_atomic(&path, content.as_bytes())?;
            }
        }
        Ok(())
    }

    pub fn read(&self, filename: &str) -> Result<(Vec<u8>, String)> {
        validate_filename(filename)?;
        let path = self.layout.document_path(filename);
        if !path.exists() {
            return Err(MemoryBankError::FileNotFound(filename.to_string()));
        }
        let bytes = fs::read(&path).map_err(MemoryBankError::Io)?;
        let tag = etag(&bytes);
        Ok((bytes, tag))
    }

    pub fn read_string(&self, filename: &str) -> Result<(String, String)> {
        let (bytes, tag) = self.read(filename)?;
        let text = String::from_utf8(bytes).map_err(|e| {
            MemoryBankError::Validation(format!("{filename} is not valid UTF-8: {e}"))
        })?;
        Ok((text, tag))
    }

    pub fn write(
        &self,
        filename: &str,
        bytes: &[u8],
        if_match: Option<&str>,
    ) -> Result<String> {
        validate_filename(filename)?;
        let path = self.layout.document_path(filename);

        if let Some(expected) = if_match {
            let current = if path.exists() {
                fs::read(&path).map_err(MemoryBankError::Io)?
            } else {
                Vec::new()
            };
            let actual = etag(&current);
            if actual != expected {
                return Err(MemoryBankError::EtagConflict {
                    file: filename.to_string(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        write_atomic(&path, bytes)?;
        Ok(etag(bytes))
    }

    /// Lists every regular file directly in the store root, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let root = self.layout.root();
        if !root.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(root).map_err(MemoryBankError::Io)? {
            let entry = entry.map_err(MemoryBankError::Io)?;
            let path = entry.path();
            if path.is_file() {
                if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn batch_read(
        &self,
        filenames: &[String],
    ) -> BTreeMap<String, BatchOutcome<(Vec<u8>, String)>> {
        let mut out = BTreeMap::new();
        for filename in filenames {
            let outcome = match self.read(filename) {
                Ok(pair) => BatchOutcome::Ok(pair),
                Err(e) => BatchOutcome::Error {
                    code: e.code().to_string(),
                    message: e.to_string(),
                },
            };
            out.insert(filename.clone(), outcome);
        }
        out
    }

    /// Sequential batch write. Each entry is written atomically on its own;
    /// there is no all-or-nothing semantics across the batch. When
    /// `stop_on_error` is set, the first failure halts processing and every
    /// remaining entry is reported with an `IO_ERROR`-shaped "skipped"
    /// outcome rather than attempted.
    pub fn batch_write(
        &self,
        requests: Vec<WriteRequest>,
        stop_on_error: bool,
    ) -> BTreeMap<String, BatchOutcome<String>> {
        let mut out = BTreeMap::new();
        let mut halted = false;
        for req in requests {
            if halted {
                out.insert(
                    req.filename.clone(),
                    BatchOutcome::Error {
                        code: "SKIPPED".to_string(),
                        message: "skipped after a prior error in this batch".to_string(),
                    },
                );
                continue;
            }
            match self.write(&req.filename, &req.bytes, req.if_match.as_deref()) {
                Ok(tag) => {
                    out.insert(req.filename.clone(), BatchOutcome::Ok(tag));
                }
                Err(e) => {
                    out.insert(
                        req.filename.clone(),
                        BatchOutcome::Error {
                            code: e.code().to_string(),
                            message: e.to_string(),
                        },
                    );
                    if stop_on_error {
                        halted = true;
                    }
                }
            }
        }
        out
    }

    /// Linear substring search over a set of documents (all of `list()` when
    /// `files` is empty), capped at `max_results` hits, document order then
    /// line order. Per spec §1 Non-goals this is a plain scan, no index.
    pub fn search(
        &self,
        query: &str,
        files: &[String],
        max_results: usize,
        case_sensitive: bool,
    ) -> Result<Vec<DocumentSearchHit>> {
        let targets: Vec<String> = if files.is_empty() {
            self.list()?
        } else {
            files.to_vec()
        };

        let needle = if case_sensitive {
            query.to_string()
        } else {
            query.to_lowercase()
        };

        let mut hits = Vec::new();
        'files: for filename in targets {
            let (text, _) = match self.read_string(&filename) {
                Ok(pair) => pair,
                Err(_) => continue,
            };
            for (idx, line) in text.lines().enumerate() {
                let haystack = if case_sensitive {
                    line.to_string()
                } else {
                    line.to_lowercase()
                };
                if haystack.contains(&needle) {
                    hits.push(DocumentSearchHit {
                        filename: filename.clone(),
                        line_number: idx + 1,
                        line_text: line.to_string(),
                    });
                    if hits.len() >= max_results {
                        break 'files;
                    }
                }
            }
        }
        Ok(hits)
    }

    /// Renames legacy camelCase filenames to canonical kebab-case ones.
    /// Idempotent: a second call finds no legacy names left to rename.
    pub fn migrate_file_naming(&self) -> Result<Vec<(String, String)>> {
        let mut renamed = Vec::new();
        for (legacy, canonical) in LEGACY_DOCUMENT_NAMES {
            if legacy == canonical {
                continue;
            }
            let legacy_path = self.layout.document_path(legacy);
            let canonical_path = self.layout.document_path(canonical);
            if legacy_path.exists() && !canonical_path.exists() {
                fs::rename(&legacy_path, &canonical_path).map_err(MemoryBankError::Io)?;
                renamed.push((legacy.to_string(), canonical.to_string()));
            }
        }
        Ok(renamed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_in(dir: &std::path::Path) -> DocumentStore {
        let layout = StoreLayout::new(dir).unwrap();
        DocumentStore::new(layout)
    }

    #[test]
    fn initialize_populates_core_documents() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store.initialize().unwrap();
        let files = store.list().unwrap();
        for name in CORE_DOCUMENTS {
            assert!(files.contains(&name.to_string()), "missing {name}");
        }
    }

    #[test]
    fn read_missing_file_fails_not_found() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let err = store.read("nope.md").unwrap_err();
        assert_eq!(err.code(), "FILE_NOT_FOUND");
    }

    #[test]
    fn write_then_read_roundtrips_bytes_and_etag() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let tag = store.write("progress.md", b"a", None).unwrap();
        let (bytes, read_tag) = store.read("progress.md").unwrap();
        assert_eq!(bytes, b"a");
        assert_eq!(read_tag, tag);
    }

    #[test]
    fn etag_conflict_on_stale_precondition() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let etag_a = store.write("progress.md", b"a", None).unwrap();
        let (_, read_etag) = store.read("progress.md").unwrap();
        assert_eq!(read_etag, etag_a);

        store.write("progress.md", b"b", None).unwrap();

        let err = store
            .write("progress.md", b"c", Some(&etag_a))
            .unwrap_err();
        assert_eq!(err.code(), "ETAG_CONFLICT");

        let (content, _) = store.read("progress.md").unwrap();
        assert_eq!(content, b"b");
    }

    #[test]
    fn list_is_sorted() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store.write("b.md", b"1", None).unwrap();
        store.write("a.md", b"1", None).unwrap();
        assert_eq!(store.list().unwrap(), vec!["a.md", "b.md"]);
    }

    #[test]
    fn batch_write_continues_past_errors_by_default() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store.write("progress.md", b"a", None).unwrap();
        let (_, etag_a) = store.read("progress.md").unwrap();
        store.write("progress.md", b"b", None).unwrap();

        let reqs = vec![
            WriteRequest {
                filename: "progress.md".into(),
                bytes: b"c".to_vec(),
                if_match: Some(etag_a),
            },
            WriteRequest {
                filename: "decision-log.md".into(),
                bytes: b"d".to_vec(),
                if_match: None,
            },
        ];
        let results = store.batch_write(reqs, false);
        assert!(matches!(
            results.get("progress.md"),
            Some(BatchOutcome::Error { .. })
        ));
        assert!(matches!(
            results.get("decision-log.md"),
            Some(BatchOutcome::Ok(_))
        ));
    }

    #[test]
    fn batch_write_stops_on_error_when_requested() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let reqs = vec![
            WriteRequest {
                filename: "progress.md".into(),
                bytes: b"x".to_vec(),
                if_match: Some("W/\"bogus\"".to_string()),
            },
            WriteRequest {
                filename: "decision-log.md".into(),
                bytes: b"y".to_vec(),
                if_match: None,
            },
        ];
        let results = store.batch_write(reqs, true);
        assert!(matches!(
            results.get("progress.md"),
            Some(BatchOutcome::Error { .. })
        ));
        let skipped = results.get("decision-log.md").unwrap();
        match skipped {
            BatchOutcome::Error { code, .. } => assert_eq!(code, "SKIPPED"),
            _ => panic!("expected skipped entry"),
        }
    }

    #[test]
    fn migrate_file_naming_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store.write("productContext.md", b"legacy", None).unwrap();

        let renamed = store.migrate_file_naming().unwrap();
        assert_eq!(renamed, vec![("productContext.md".to_string(), "product-context.md".to_string())]);
        assert!(store.read("product-context.md").is_ok());

        let renamed_again = store.migrate_file_naming().unwrap();
        assert!(renamed_again.is_empty());
    }

    #[test]
    fn search_finds_case_insensitive_substring_across_files() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store.write("progress.md", b"line one\nJWT rollout done\n", None).unwrap();
        store.write("decision-log.md", b"nothing relevant here\n", None).unwrap();

        let hits = store.search("jwt", &[], 20, false).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].filename, "progress.md");
        assert_eq!(hits[0].line_number, 2);
    }

    #[test]
    fn search_respects_max_results() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store.write("progress.md", b"match\nmatch\nmatch\n", None).unwrap();
        let hits = store.search("match", &[], 2, false).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn reject_path_separators_in_filename() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let err = store.write("../escape.md", b"x", None).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}
