//! Protocol messages.

use crate::error::{ProtocolError, ProtocolResult};
use notesync_core::{AggId, Event, EventId, Revision};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// CBOR encoding shared by all messages.
pub trait CborMessage: Serialize + DeserializeOwned + Sized {
    /// Encodes to CBOR.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Codec`] if encoding fails.
    fn encode(&self) -> ProtocolResult<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes)
            .map_err(|e| ProtocolError::Codec(e.to_string()))?;
        Ok(bytes)
    }

    /// Decodes from CBOR.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Codec`] if the bytes are not a valid
    /// message.
    fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        ciborium::from_reader(bytes).map_err(|e| ProtocolError::Codec(e.to_string()))
    }
}

/// The command carried by a [`PostCommandRequest`].
///
/// Paths travel in their textual form (`"a/b"`, `""` for the root) and are
/// validated when the request is mapped back to a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandMessage {
    /// Create a note.
    CreateNote {
        /// Location.
        path: String,
        /// Title.
        title: String,
        /// Content.
        content: String,
    },
    /// Delete a note.
    DeleteNote,
    /// Restore a deleted note.
    UndeleteNote,
    /// Change the title.
    ChangeTitle {
        /// New title.
        title: String,
    },
    /// Change the content.
    ChangeContent {
        /// New content.
        content: String,
    },
    /// Move a note.
    Move {
        /// New location.
        path: String,
    },
    /// Add or replace an attachment.
    AddAttachment {
        /// Attachment name.
        name: String,
        /// Attachment bytes.
        content: Vec<u8>,
    },
    /// Remove an attachment.
    DeleteAttachment {
        /// Attachment name.
        name: String,
    },
    /// Create a folder.
    CreateFolder {
        /// Location.
        path: String,
    },
    /// Delete a folder.
    DeleteFolder {
        /// Location.
        path: String,
    },
}

/// One remote command call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostCommandRequest {
    /// Target aggregate.
    pub agg_id: AggId,
    /// Revision the command was written against.
    pub last_revision: Revision,
    /// The command.
    pub command: CommandMessage,
}

impl CborMessage for PostCommandRequest {}

/// Application-level outcome of a command call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandStatus {
    /// The command was accepted.
    Success,
    /// The command was rejected.
    Failure,
}

/// Answer to a [`PostCommandRequest`].
///
/// `new_event_id == 0` means the command was accepted without producing an
/// event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostCommandResponse {
    /// Outcome.
    pub status: CommandStatus,
    /// Why the command failed; empty on success.
    pub error_description: String,
    /// Id of the appended remote event, or 0.
    pub new_event_id: EventId,
    /// Revision of the aggregate after the command.
    pub new_revision: Revision,
}

impl PostCommandResponse {
    /// Creates a success response.
    pub fn success(new_event_id: EventId, new_revision: Revision) -> Self {
        Self {
            status: CommandStatus::Success,
            error_description: String::new(),
            new_event_id,
            new_revision,
        }
    }

    /// Creates a failure response.
    pub fn failure(error_description: impl Into<String>) -> Self {
        Self {
            status: CommandStatus::Failure,
            error_description: error_description.into(),
            new_event_id: 0,
            new_revision: 0,
        }
    }

    /// Returns true for a success status.
    pub fn is_success(&self) -> bool {
        self.status == CommandStatus::Success
    }

    /// Returns true if the command produced a remote event.
    pub fn has_event(&self) -> bool {
        self.new_event_id > 0
    }
}

impl CborMessage for PostCommandResponse {}

/// Request for remote events after a cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetEventsRequest {
    /// Only events with a greater id are returned.
    pub after_event_id: EventId,
    /// Maximum number of events to return.
    pub limit: u32,
}

impl GetEventsRequest {
    /// Creates a request.
    pub fn new(after_event_id: EventId, limit: u32) -> Self {
        Self {
            after_event_id,
            limit,
        }
    }
}

impl CborMessage for GetEventsRequest {}

/// A page of remote events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetEventsResponse {
    /// Events ordered by id.
    pub events: Vec<Event>,
    /// Whether more events follow the last one returned.
    pub has_more: bool,
}

impl GetEventsResponse {
    /// Creates a response.
    pub fn new(events: Vec<Event>, has_more: bool) -> Self {
        Self { events, has_more }
    }

    /// Returns the id of the last event, if any.
    pub fn last_event_id(&self) -> Option<EventId> {
        self.events.last().map(|event| event.event_id)
    }
}

impl CborMessage for GetEventsResponse {}
