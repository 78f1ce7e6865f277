//! Error types for the sync engine.

use notesync_core::{AggId, CoreError};
use notesync_storage::StorageError;
use notesync_sync_protocol::{ProtocolError, RpcCode, RpcStatus};
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during synchronization.
#[derive(Error, Debug)]
pub enum SyncError {
    /// A remote call failed at the transport level.
    #[error("rpc failed with {code}: {message}")]
    Rpc {
        /// Status code.
        code: RpcCode,
        /// Error message.
        message: String,
    },

    /// The remote side answered with a failure status.
    #[error("remote rejected command for {agg_id}: {reason}")]
    Rejected {
        /// Aggregate the command addressed.
        agg_id: AggId,
        /// Error description from the remote side.
        reason: String,
    },

    /// Applying an event or command locally failed.
    #[error("local application failed: {0}")]
    Core(#[from] CoreError),

    /// A message could not be built or read.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// State or cursor persistence failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// State or cursor encoding failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// No pending conflict exists for the aggregate.
    #[error("no conflict pending for {0}")]
    NoConflict(AggId),

    /// The aggregate id does not belong to any known aggregate kind.
    #[error("unsupported aggregate {0}")]
    UnsupportedAggregate(AggId),

    /// Compensating events could not be derived.
    #[error("cannot compensate {agg_id}: {reason}")]
    Compensation {
        /// Aggregate being compensated.
        agg_id: AggId,
        /// Why.
        reason: String,
    },
}

impl SyncError {
    /// Returns true if the remote side could not be reached and the call
    /// may succeed later.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Rpc { code, .. } => code.is_transient(),
            _ => false,
        }
    }

    pub(crate) fn compensation(agg_id: &str, reason: impl Into<String>) -> Self {
        Self::Compensation {
            agg_id: agg_id.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<RpcStatus> for SyncError {
    fn from(status: RpcStatus) -> Self {
        Self::Rpc {
            code: status.code,
            message: status.message,
        }
    }
}
