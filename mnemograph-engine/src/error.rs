//! Error types for mnemograph-engine

use thiserror::Error;

/// Errors that can occur in the retrieval and relationship engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// RocksDB error
    #[error("Storage error: {0}")]
    Storage(#[from] rocksdb::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// UUID parsing error
    #[error("UUID error: {0}")]
    Uuid(#[from] uuid::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Zero or non-finite vector cannot be normalized
    #[error("Degenerate vector: {0}")]
    DegenerateVector(String),

    /// Vector length differs from the configured embedding dimension
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Unknown or malformed predicate operator in a filter specification
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Chunking configuration with overlap >= max tokens
    #[error("Invalid chunk config: overlap_tokens {overlap_tokens} must be < max_tokens {max_tokens}")]
    InvalidChunkConfig {
        max_tokens: usize,
        overlap_tokens: usize,
    },

    /// Referenced record/entity id is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Write names a record kind with no registered schema
    #[error("Unknown record kind: {0}")]
    UnknownKind(String),

    /// Write attributes fail the kind's structural schema
    #[error("Schema violation: {0}")]
    SchemaViolation(String),
}

impl EngineError {
    /// Create a degenerate-vector error
    pub fn degenerate(msg: impl Into<String>) -> Self {
        Self::DegenerateVector(msg.into())
    }

    /// Create an invalid-filter error
    pub fn invalid_filter(msg: impl Into<String>) -> Self {
        Self::InvalidFilter(msg.into())
    }

    /// Create a not-found error
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    /// Create an unknown-kind error
    pub fn unknown_kind(kind: impl Into<String>) -> Self {
        Self::UnknownKind(kind.into())
    }

    /// Create a schema-violation error
    pub fn schema_violation(msg: impl Into<String>) -> Self {
        Self::SchemaViolation(msg.into())
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
