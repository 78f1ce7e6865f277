//! Protocol errors.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while encoding, decoding or mapping messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// CBOR encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// A message carried a malformed path.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath {
        /// Path text as received.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A message is structurally valid CBOR but not a valid message.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
