//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Stored data could not be interpreted.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// A record key cannot be represented by this store.
    #[error("invalid record key: {0}")]
    InvalidKey(String),
}
