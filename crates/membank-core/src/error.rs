//! Error taxonomy for the memory bank core.
//!
//! Every variant maps to one of the stable string codes a tool-dispatch layer
//! returns to a caller (`{ error, code, message }`). The codes themselves are
//! part of the external contract, so [`MemoryBankError::code`] returns the
//! exact strings rather than `Debug`-derived variant names.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemoryBankError {
    #[error("store not initialized: {0}")]
    NotInitialized(String),

    #[error("graph log marker missing or mismatched: {0}")]
    MarkerMismatch(String),

    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("relation not found: {from} -> {to} ({relation_type})")]
    RelationNotFound {
        from: String,
        to: String,
        relation_type: String,
    },

    #[error("observation not found: {0}")]
    ObservationNotFound(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("etag conflict on {file}: expected {expected}, found {actual}")]
    EtagConflict {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("operation cancelled")]
    Cancelled,
}

impl MemoryBankError {
    /// The stable machine-readable code a caller should match on.
    pub fn code(&self) -> &'static str {
        match self {
            MemoryBankError::NotInitialized(_) => "NOT_INITIALIZED",
            MemoryBankError::MarkerMismatch(_) => "MARKER_MISMATCH",
            MemoryBankError::EntityNotFound(_) => "ENTITY_NOT_FOUND",
            MemoryBankError::RelationNotFound { .. } => "RELATION_NOT_FOUND",
            MemoryBankError::ObservationNotFound(_) => "NOT_FOUND",
            MemoryBankError::FileNotFound(_) => "FILE_NOT_FOUND",
            MemoryBankError::InvalidInput(_) => "INVALID_INPUT",
            MemoryBankError::Io(_) => "IO_ERROR",
            MemoryBankError::EtagConflict { .. } => "ETAG_CONFLICT",
            MemoryBankError::Validation(_) => "VALIDATION_ERROR",
            MemoryBankError::Serialization(_) => "VALIDATION_ERROR",
            MemoryBankError::Cancelled => "IO_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, MemoryBankError>;
