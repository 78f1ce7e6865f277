//! Byte-level remote procedure call surface.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Method name of the command call.
pub const POST_COMMAND: &str = "notesync.CommandService/PostCommand";

/// Method name of the event stream call.
pub const GET_EVENTS: &str = "notesync.EventService/GetEvents";

/// Status code of a failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcCode {
    /// The call was cancelled.
    Cancelled,
    /// Unclassified failure.
    Unknown,
    /// The request was malformed.
    InvalidArgument,
    /// The deadline passed before the call completed.
    DeadlineExceeded,
    /// The method does not exist.
    Unimplemented,
    /// The server failed internally.
    Internal,
    /// The server cannot be reached.
    Unavailable,
}

impl RpcCode {
    /// Returns true for conditions that affect every call until the
    /// connection recovers.
    pub fn is_transient(&self) -> bool {
        matches!(self, RpcCode::Unavailable | RpcCode::DeadlineExceeded)
    }
}

impl fmt::Display for RpcCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RpcCode::Cancelled => "CANCELLED",
            RpcCode::Unknown => "UNKNOWN",
            RpcCode::InvalidArgument => "INVALID_ARGUMENT",
            RpcCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
            RpcCode::Unimplemented => "UNIMPLEMENTED",
            RpcCode::Internal => "INTERNAL",
            RpcCode::Unavailable => "UNAVAILABLE",
        };
        f.write_str(name)
    }
}

/// A failed call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct RpcStatus {
    /// Status code.
    pub code: RpcCode,
    /// Human-readable detail.
    pub message: String,
}

impl RpcStatus {
    /// Creates a status.
    pub fn new(code: RpcCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// A server endpoint answering encoded requests.
///
/// Implementations decode `body` according to `method`, handle it and
/// return the encoded response.
pub trait RpcHandler: Send + Sync {
    /// Handles one call.
    ///
    /// # Errors
    ///
    /// Returns an [`RpcStatus`] when the call itself fails. Application
    /// level failures are reported inside the response message.
    fn call(&self, method: &str, body: &[u8]) -> Result<Vec<u8>, RpcStatus>;
}

impl<H: RpcHandler + ?Sized> RpcHandler for Arc<H> {
    fn call(&self, method: &str, body: &[u8]) -> Result<Vec<u8>, RpcStatus> {
        (**self).call(method, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_codes() {
        assert!(RpcCode::Unavailable.is_transient());
        assert!(RpcCode::DeadlineExceeded.is_transient());
        assert!(!RpcCode::Internal.is_transient());
        assert!(!RpcCode::InvalidArgument.is_transient());
    }

    #[test]
    fn status_display() {
        let status = RpcStatus::new(RpcCode::Unavailable, "connection refused");
        assert_eq!(status.to_string(), "UNAVAILABLE: connection refused");
    }
}
