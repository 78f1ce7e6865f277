//! The note aggregate.

use crate::aggregate::Aggregate;
use crate::error::{CoreError, CoreResult};
use crate::event::{Event, EventPayload, NoteEvent};
use crate::path::Path;
use crate::types::{AggId, AggregateKind, Existence, Revision};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A note: title, content and named attachments at a location.
///
/// Field values survive deletion, so a deleted note can still be compared
/// and restored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    agg_id: AggId,
    revision: Revision,
    existence: Existence,
    path: Path,
    title: String,
    content: String,
    attachments: BTreeMap<String, Vec<u8>>,
}

impl Note {
    /// Returns the location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the content.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns all attachments by name.
    pub fn attachments(&self) -> &BTreeMap<String, Vec<u8>> {
        &self.attachments
    }

    /// Returns one attachment.
    pub fn attachment(&self, name: &str) -> Option<&[u8]> {
        self.attachments.get(name).map(Vec::as_slice)
    }

    fn require_born(&self, what: &str) -> CoreResult<()> {
        if self.existence == Existence::NotYetCreated {
            return Err(CoreError::invalid_transition(
                &self.agg_id,
                format!("cannot {what} a note that was never created"),
            ));
        }
        Ok(())
    }
}

impl Aggregate for Note {
    type Event = NoteEvent;

    const KIND: AggregateKind = AggregateKind::Note;

    fn empty(agg_id: &str) -> Self {
        Self {
            agg_id: agg_id.to_string(),
            revision: 0,
            existence: Existence::NotYetCreated,
            path: Path::root(),
            title: String::new(),
            content: String::new(),
            attachments: BTreeMap::new(),
        }
    }

    fn agg_id(&self) -> &str {
        &self.agg_id
    }

    fn revision(&self) -> Revision {
        self.revision
    }

    fn existence(&self) -> Existence {
        self.existence
    }

    fn transition(&self, event: &NoteEvent) -> CoreResult<Self> {
        let mut next = self.clone();
        match event {
            NoteEvent::Created {
                path,
                title,
                content,
            } => {
                if self.existence != Existence::NotYetCreated {
                    return Err(CoreError::invalid_transition(
                        &self.agg_id,
                        "note already created",
                    ));
                }
                next.existence = Existence::Exists;
                next.path = path.clone();
                next.title = title.clone();
                next.content = content.clone();
            }
            NoteEvent::Deleted => {
                self.require_born("delete")?;
                next.existence = Existence::Deleted;
            }
            NoteEvent::Undeleted => {
                self.require_born("undelete")?;
                next.existence = Existence::Exists;
            }
            NoteEvent::TitleChanged { title } => {
                self.require_born("retitle")?;
                next.title = title.clone();
            }
            NoteEvent::ContentChanged { content } => {
                self.require_born("edit")?;
                next.content = content.clone();
            }
            NoteEvent::Moved { path } => {
                self.require_born("move")?;
                next.path = path.clone();
            }
            NoteEvent::AttachmentAdded { name, content } => {
                self.require_born("attach to")?;
                next.attachments.insert(name.clone(), content.clone());
            }
            NoteEvent::AttachmentDeleted { name } => {
                self.require_born("detach from")?;
                next.attachments.remove(name);
            }
        }
        Ok(next)
    }

    fn with_revision(mut self, revision: Revision) -> Self {
        self.revision = revision;
        self
    }

    fn payload(event: &Event) -> Option<&NoteEvent> {
        match &event.payload {
            EventPayload::Note(payload) => Some(payload),
            EventPayload::Folder(_) => None,
        }
    }

    fn wrap(event: NoteEvent) -> EventPayload {
        EventPayload::Note(event)
    }
}
