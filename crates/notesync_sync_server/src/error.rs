//! Error types for the command server.

use notesync_core::CoreError;
use notesync_sync_protocol::{ProtocolError, RpcCode, RpcStatus};
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the command server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A request could not be decoded or mapped.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The event log failed.
    #[error("event log error: {0}")]
    Core(#[from] CoreError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns true if the caller sent something wrong.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::InvalidRequest(_) | ServerError::Protocol(_)
        )
    }

    /// Returns true if the server failed.
    pub fn is_server_error(&self) -> bool {
        matches!(self, ServerError::Core(_) | ServerError::Internal(_))
    }
}

impl From<ServerError> for RpcStatus {
    fn from(err: ServerError) -> Self {
        let code = if err.is_client_error() {
            RpcCode::InvalidArgument
        } else {
            RpcCode::Internal
        };
        RpcStatus::new(code, err.to_string())
    }
}
