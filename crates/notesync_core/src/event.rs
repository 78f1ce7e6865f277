//! Events: committed state transitions of one aggregate.

use crate::path::Path;
use crate::types::{AggId, AggregateKind, EventId, Revision};
use serde::{Deserialize, Serialize};

/// Transitions of a [`Note`](crate::Note).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteEvent {
    /// The note came into existence.
    Created {
        /// Location of the note.
        path: Path,
        /// Initial title.
        title: String,
        /// Initial content.
        content: String,
    },
    /// The note was deleted.
    Deleted,
    /// A deleted note was restored.
    Undeleted,
    /// The title changed.
    TitleChanged {
        /// New title.
        title: String,
    },
    /// The content changed.
    ContentChanged {
        /// New content.
        content: String,
    },
    /// The note moved to another folder.
    Moved {
        /// New location.
        path: Path,
    },
    /// An attachment was added or replaced.
    AttachmentAdded {
        /// Attachment name.
        name: String,
        /// Attachment bytes.
        content: Vec<u8>,
    },
    /// An attachment was removed.
    AttachmentDeleted {
        /// Attachment name.
        name: String,
    },
}

impl NoteEvent {
    /// Returns the variant name.
    pub fn name(&self) -> &'static str {
        match self {
            NoteEvent::Created { .. } => "NoteCreated",
            NoteEvent::Deleted => "NoteDeleted",
            NoteEvent::Undeleted => "NoteUndeleted",
            NoteEvent::TitleChanged { .. } => "TitleChanged",
            NoteEvent::ContentChanged { .. } => "ContentChanged",
            NoteEvent::Moved { .. } => "NoteMoved",
            NoteEvent::AttachmentAdded { .. } => "AttachmentAdded",
            NoteEvent::AttachmentDeleted { .. } => "AttachmentDeleted",
        }
    }
}

/// Transitions of a [`Folder`](crate::Folder).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FolderEvent {
    /// The folder came into existence.
    Created {
        /// Location of the folder.
        path: Path,
    },
    /// The folder was deleted.
    Deleted {
        /// Location of the folder.
        path: Path,
    },
}

impl FolderEvent {
    /// Returns the variant name.
    pub fn name(&self) -> &'static str {
        match self {
            FolderEvent::Created { .. } => "FolderCreated",
            FolderEvent::Deleted { .. } => "FolderDeleted",
        }
    }
}

/// Kind-specific payload of an [`Event`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPayload {
    /// Note transition.
    Note(NoteEvent),
    /// Folder transition.
    Folder(FolderEvent),
}

impl EventPayload {
    /// Returns the aggregate kind this payload applies to.
    pub fn kind(&self) -> AggregateKind {
        match self {
            EventPayload::Note(_) => AggregateKind::Note,
            EventPayload::Folder(_) => AggregateKind::Folder,
        }
    }

    /// Returns the variant name.
    pub fn name(&self) -> &'static str {
        match self {
            EventPayload::Note(event) => event.name(),
            EventPayload::Folder(event) => event.name(),
        }
    }
}

impl From<NoteEvent> for EventPayload {
    fn from(event: NoteEvent) -> Self {
        EventPayload::Note(event)
    }
}

impl From<FolderEvent> for EventPayload {
    fn from(event: FolderEvent) -> Self {
        EventPayload::Folder(event)
    }
}

/// One committed state transition of one aggregate.
///
/// `revision` is the aggregate revision *after* the event. `event_id` is
/// assigned by the log that stores the event and is `0` until then.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Log-assigned id, monotonic within one store.
    pub event_id: EventId,
    /// Aggregate the event belongs to.
    pub agg_id: AggId,
    /// Resulting aggregate revision.
    pub revision: Revision,
    /// What happened.
    pub payload: EventPayload,
}

impl Event {
    /// Creates an event that has not been assigned an id yet.
    pub fn new(agg_id: impl Into<AggId>, revision: Revision, payload: impl Into<EventPayload>) -> Self {
        Self {
            event_id: 0,
            agg_id: agg_id.into(),
            revision,
            payload: payload.into(),
        }
    }

    /// Returns the same event carrying `event_id`.
    #[must_use]
    pub fn with_event_id(mut self, event_id: EventId) -> Self {
        self.event_id = event_id;
        self
    }

    /// Returns the same event carrying `revision`.
    #[must_use]
    pub fn with_revision(mut self, revision: Revision) -> Self {
        self.revision = revision;
        self
    }

    /// Returns the aggregate kind of the payload.
    pub fn kind(&self) -> AggregateKind {
        self.payload.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_event_is_unassigned() {
        let event = Event::new("note-1", 1, NoteEvent::Deleted);
        assert_eq!(event.event_id, 0);
        assert_eq!(event.kind(), AggregateKind::Note);
        assert_eq!(event.payload.name(), "NoteDeleted");

        let event = event.with_event_id(7).with_revision(3);
        assert_eq!(event.event_id, 7);
        assert_eq!(event.revision, 3);
    }

    #[test]
    fn folder_payload_kind() {
        let payload: EventPayload = FolderEvent::Created { path: Path::root() }.into();
        assert_eq!(payload.kind(), AggregateKind::Folder);
        assert_eq!(payload.name(), "FolderCreated");
    }
}
