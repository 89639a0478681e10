//! Error types for the strata core library.
//!
//! Decision outcomes (kept / consolidated / expired / protected) are plain
//! values, never errors — this taxonomy covers genuine failures only.

use thiserror::Error;

/// Top-level error type for all strata operations.
#[derive(Error, Debug)]
pub enum StrataError {
    /// A memory record failed validation before scoring.
    #[error("validation failed for memory {id}: {reason}")]
    Validation {
        /// The offending record.
        id: crate::types::MemoryId,
        /// What was wrong with it.
        reason: String,
    },

    /// A store operation referenced a memory that does not exist.
    /// The engine treats this as non-fatal for the affected memory.
    #[error("memory not found: {0}")]
    NotFound(crate::types::MemoryId),

    /// A store operation failed for one memory. Caught per-memory during a
    /// cycle and recorded in the report; never aborts the cycle.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// Invalid configuration — weights not summing to 1.0, non-monotonic
    /// tier tables, and the like. Fatal at engine construction time.
    #[error("configuration error: {0}")]
    Config(String),

    /// SQLite error from the reference store backend.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, StrataError>;
