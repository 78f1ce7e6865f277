//! Error types for the core model.

use crate::types::{AggId, EventId, Revision};
use notesync_storage::StorageError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors produced by the note and folder model, event stores and the
/// command executor.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A path or path segment is malformed.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The command expected a different aggregate revision.
    #[error("concurrency conflict on {agg_id}: expected revision {expected}, actual {actual}")]
    ConcurrencyConflict {
        /// Aggregate the command targeted.
        agg_id: AggId,
        /// Revision the command was written against.
        expected: Revision,
        /// Revision found in the store.
        actual: Revision,
    },

    /// The event store refused an append because revisions do not line up.
    #[error("append rejected for {agg_id}: current revision {current}, event revision {revision}")]
    AppendRejected {
        /// Aggregate the event belongs to.
        agg_id: AggId,
        /// Revision currently stored.
        current: Revision,
        /// Revision carried by the rejected event.
        revision: Revision,
    },

    /// An event or command is not valid for the aggregate's current state.
    #[error("invalid transition for {agg_id}: {reason}")]
    InvalidTransition {
        /// Aggregate id.
        agg_id: AggId,
        /// Why the transition was refused.
        reason: String,
    },

    /// An event or command was routed to the wrong aggregate.
    #[error("aggregate mismatch: expected {expected}, got {actual}")]
    AggregateMismatch {
        /// Aggregate the caller addressed.
        expected: AggId,
        /// Aggregate carried by the event or command.
        actual: AggId,
    },

    /// A command kind was handed to an executor for another aggregate kind.
    #[error("unsupported command for {kind} aggregates: {command}")]
    UnsupportedCommand {
        /// Aggregate kind of the executor.
        kind: &'static str,
        /// Name of the command.
        command: &'static str,
    },

    /// A projection was requested beyond the end of the log.
    #[error("revision {revision} of {agg_id} not found (latest {latest})")]
    RevisionNotFound {
        /// Aggregate id.
        agg_id: AggId,
        /// Requested revision.
        revision: Revision,
        /// Latest revision available.
        latest: Revision,
    },

    /// A staging log already holds a different event under this id.
    #[error("duplicate event id {0}")]
    DuplicateEvent(EventId),

    /// The event is not present in the staging log.
    #[error("event {0} not found")]
    EventNotFound(EventId),

    /// A batched command does not address the request's aggregate.
    #[error("command for {actual} in request for {expected}")]
    RequestMismatch {
        /// Aggregate id of the request.
        expected: AggId,
        /// Aggregate id of the command.
        actual: AggId,
    },

    /// Event serialization failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl CoreError {
    /// Creates an invalid transition error.
    pub fn invalid_transition(agg_id: impl Into<AggId>, reason: impl Into<String>) -> Self {
        Self::InvalidTransition {
            agg_id: agg_id.into(),
            reason: reason.into(),
        }
    }

    /// Returns true for optimistic concurrency failures, whether detected by
    /// the executor or by the store.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(
            self,
            CoreError::ConcurrencyConflict { .. } | CoreError::AppendRejected { .. }
        )
    }
}
