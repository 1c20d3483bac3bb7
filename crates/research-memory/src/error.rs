//! ============================================================================
//! Memory Errors - Failure taxonomy for the memory layer
//! ============================================================================
//! An empty search result is not an error; it is an empty `Vec`.
//! ============================================================================

use serde::{Deserialize, Serialize};

/// Result alias used across the crate
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Error types for the memory layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum MemoryError {
    /// Store unreachable, credential rejected, or any store-side failure
    #[error("Vector store error: {0}")]
    Connectivity(String),

    /// Embedder output and collection configuration disagree
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A stored payload lacks a field needed to rebuild its record
    #[error("Malformed record in {collection}: missing field '{field}'")]
    MalformedRecord { collection: String, field: String },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl MemoryError {
    pub(crate) fn connectivity(context: &str, err: impl std::fmt::Display) -> Self {
        MemoryError::Connectivity(format!("{}: {}", context, err))
    }

    pub(crate) fn malformed(collection: &str, field: &str) -> Self {
        MemoryError::MalformedRecord {
            collection: collection.to_string(),
            field: field.to_string(),
        }
    }
}
