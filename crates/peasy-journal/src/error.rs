//! Error types for peasy-journal

use thiserror::Error;

/// Journal error type
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid sequence range
    #[error("Invalid sequence range: {0}..{1}")]
    InvalidRange(u64, u64),

    /// No entry with this sequence number
    #[error("Entry not found: #{0}")]
    EntryNotFound(u64),

    /// The entry exists but its state was not kept
    #[error("State not recorded for entry #{0}")]
    StateNotRecorded(u64),

    /// Replaying into a store failed
    #[error("Replay error: {0}")]
    Replay(#[from] peasy_core::Error),

    /// Export error
    #[error("Export error: {0}")]
    ExportError(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for journal operations
pub type Result<T> = std::result::Result<T, Error>;
