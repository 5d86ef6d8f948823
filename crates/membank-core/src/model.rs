//! Shared value types used across the document store and graph engine.

use serde::{Deserialize, Serialize};

/// A file's content alongside its current fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    pub bytes: Vec<u8>,
    pub etag: String,
}

impl FileContent {
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }
}

/// The outcome of one entry in a batch operation: either the per-file
/// success payload, or a structured error with its code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome<T> {
    Ok(T),
    Error { code: String, message: String },
}

/// A single file write request for `batch_write`.
#[derive(Debug, Clone)]
pub struct WriteRequest {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub if_match: Option<String>,
}

/// One matching line from `DocumentStore::search`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSearchHit {
    pub filename: String,
    pub line_number: usize,
    pub line_text: String,
}
