//! Error types for the media library.
//!
//! Library-layer operations return [`LibraryError`]; adapters and the CLI
//! work with `anyhow` and are converted at the orchestrator boundary.

use thiserror::Error;

/// Errors produced by the library, acquisition and playback layers
#[derive(Debug, Error)]
pub enum LibraryError {
    /// Missing or malformed input (no locator, bad id, unknown format)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Unknown item id or missing blob
    #[error("Not found: {0}")]
    NotFound(String),

    /// The external resolver/encoder failed
    #[error("Resolution failed: {0}")]
    Resolution(String),

    /// A blob or record could not be written, renamed or located
    #[error("Storage error: {0}")]
    Storage(String),

    /// Requested byte range lies outside the blob
    #[error("Requested range not satisfiable (blob is {length} bytes)")]
    RangeNotSatisfiable { length: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience Result type for library operations
pub type Result<T> = std::result::Result<T, LibraryError>;
