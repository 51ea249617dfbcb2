//! Error types for keepsync-core

use thiserror::Error;

/// Result type alias using keepsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in keepsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Snapshot could not be written or read back
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Sync engine error
    #[error(transparent)]
    Sync(#[from] crate::sync::SyncError),
}
