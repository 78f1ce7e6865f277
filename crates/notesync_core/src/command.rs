//! Commands: requested transitions, validated before they become events.

use crate::path::Path;
use crate::types::{AggId, AggregateKind, Revision};
use serde::{Deserialize, Serialize};

/// What a command asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandPayload {
    /// Create a note.
    CreateNote {
        /// Location of the note.
        path: Path,
        /// Initial title.
        title: String,
        /// Initial content.
        content: String,
    },
    /// Delete a note.
    DeleteNote,
    /// Restore a deleted note.
    UndeleteNote,
    /// Change a note's title.
    ChangeTitle {
        /// New title.
        title: String,
    },
    /// Change a note's content.
    ChangeContent {
        /// New content.
        content: String,
    },
    /// Move a note.
    Move {
        /// New location.
        path: Path,
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
        /// Location of the folder.
        path: Path,
    },
    /// Delete a folder.
    DeleteFolder {
        /// Location of the folder.
        path: Path,
    },
}

impl CommandPayload {
    /// Returns the aggregate kind the command targets.
    pub fn kind(&self) -> AggregateKind {
        match self {
            CommandPayload::CreateNote { .. }
            | CommandPayload::DeleteNote
            | CommandPayload::UndeleteNote
            | CommandPayload::ChangeTitle { .. }
            | CommandPayload::ChangeContent { .. }
            | CommandPayload::Move { .. }
            | CommandPayload::AddAttachment { .. }
            | CommandPayload::DeleteAttachment { .. } => AggregateKind::Note,
            CommandPayload::CreateFolder { .. } | CommandPayload::DeleteFolder { .. } => {
                AggregateKind::Folder
            }
        }
    }

    /// Returns the command name.
    pub fn name(&self) -> &'static str {
        match self {
            CommandPayload::CreateNote { .. } => "CreateNote",
            CommandPayload::DeleteNote => "DeleteNote",
            CommandPayload::UndeleteNote => "UndeleteNote",
            CommandPayload::ChangeTitle { .. } => "ChangeTitle",
            CommandPayload::ChangeContent { .. } => "ChangeContent",
            CommandPayload::Move { .. } => "Move",
            CommandPayload::AddAttachment { .. } => "AddAttachment",
            CommandPayload::DeleteAttachment { .. } => "DeleteAttachment",
            CommandPayload::CreateFolder { .. } => "CreateFolder",
            CommandPayload::DeleteFolder { .. } => "DeleteFolder",
        }
    }

    /// Returns true for creation commands.
    pub fn is_creation(&self) -> bool {
        matches!(
            self,
            CommandPayload::CreateNote { .. } | CommandPayload::CreateFolder { .. }
        )
    }
}

/// A command addressed to one aggregate.
///
/// `last_revision` is the revision the caller based the command on. When
/// present, the executor rejects the command if the aggregate has moved on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Target aggregate.
    pub agg_id: AggId,
    /// Expected current revision of the target.
    pub last_revision: Option<Revision>,
    /// Requested transition.
    pub payload: CommandPayload,
}

impl Command {
    /// Creates a command with an explicit revision expectation.
    pub fn new(agg_id: impl Into<AggId>, last_revision: Option<Revision>, payload: CommandPayload) -> Self {
        Self {
            agg_id: agg_id.into(),
            last_revision,
            payload,
        }
    }

    /// Creates a `CreateNote` command.
    pub fn create_note(
        agg_id: impl Into<AggId>,
        path: Path,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::new(
            agg_id,
            None,
            CommandPayload::CreateNote {
                path,
                title: title.into(),
                content: content.into(),
            },
        )
    }

    /// Creates a `CreateFolder` command. The folder id is derived from `path`.
    pub fn create_folder(path: Path) -> Self {
        Self::new(
            crate::Folder::agg_id_for(&path),
            None,
            CommandPayload::CreateFolder { path },
        )
    }

    /// Creates a `DeleteFolder` command.
    pub fn delete_folder(path: Path, last_revision: Option<Revision>) -> Self {
        Self::new(
            crate::Folder::agg_id_for(&path),
            last_revision,
            CommandPayload::DeleteFolder { path },
        )
    }

    /// Returns the aggregate kind the command targets.
    pub fn kind(&self) -> AggregateKind {
        self.payload.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_kinds() {
        let create = Command::create_note("note-1", Path::root(), "T", "");
        assert_eq!(create.kind(), AggregateKind::Note);
        assert!(create.payload.is_creation());
        assert_eq!(create.last_revision, None);

        let folder = Command::create_folder(Path::new(["work"]).unwrap());
        assert_eq!(folder.kind(), AggregateKind::Folder);
        assert_eq!(folder.agg_id, crate::Folder::agg_id_for(&Path::new(["work"]).unwrap()));
        assert_eq!(folder.payload.name(), "CreateFolder");
    }
}
