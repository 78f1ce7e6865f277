//! Turns events back into the commands that reproduce them.

use notesync_core::{Command, CommandPayload, Event, EventPayload, FolderEvent, NoteEvent, Revision};

/// Returns the command that reproduces `event` on another log whose copy
/// of the aggregate is at `last_revision`.
pub fn event_to_command(event: &Event, last_revision: Option<Revision>) -> Command {
    let payload = match &event.payload {
        EventPayload::Note(note) => match note {
            NoteEvent::Created {
                path,
                title,
                content,
            } => CommandPayload::CreateNote {
                path: path.clone(),
                title: title.clone(),
                content: content.clone(),
            },
            NoteEvent::Deleted => CommandPayload::DeleteNote,
            NoteEvent::Undeleted => CommandPayload::UndeleteNote,
            NoteEvent::TitleChanged { title } => CommandPayload::ChangeTitle {
                title: title.clone(),
            },
            NoteEvent::ContentChanged { content } => CommandPayload::ChangeContent {
                content: content.clone(),
            },
            NoteEvent::Moved { path } => CommandPayload::Move { path: path.clone() },
            NoteEvent::AttachmentAdded { name, content } => CommandPayload::AddAttachment {
                name: name.clone(),
                content: content.clone(),
            },
            NoteEvent::AttachmentDeleted { name } => {
                CommandPayload::DeleteAttachment { name: name.clone() }
            }
        },
        EventPayload::Folder(folder) => match folder {
            FolderEvent::Created { path } => CommandPayload::CreateFolder { path: path.clone() },
            FolderEvent::Deleted { path } => CommandPayload::DeleteFolder { path: path.clone() },
        },
    };
    Command::new(event.agg_id.clone(), last_revision, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notesync_core::{Path, Folder};

    #[test]
    fn note_created_maps_to_create_note() {
        let event = Event::new(
            "note-1",
            1,
            NoteEvent::Created {
                path: Path::root(),
                title: "T".into(),
                content: "c".into(),
            },
        );
        let command = event_to_command(&event, Some(0));

        assert_eq!(command.agg_id, "note-1");
        assert_eq!(command.last_revision, Some(0));
        assert_eq!(
            command.payload,
            CommandPayload::CreateNote {
                path: Path::root(),
                title: "T".into(),
                content: "c".into(),
            }
        );
    }

    #[test]
    fn folder_events_map_to_folder_commands() {
        let path = Path::new(["work"]).unwrap();
        let event = Event::new(
            Folder::agg_id_for(&path),
            2,
            FolderEvent::Deleted { path: path.clone() },
        );
        let command = event_to_command(&event, Some(1));
        assert_eq!(command, Command::delete_folder(path, Some(1)));
    }

    #[test]
    fn attachment_events() {
        let event = Event::new(
            "note-1",
            3,
            NoteEvent::AttachmentAdded {
                name: "a.png".into(),
                content: vec![1],
            },
        );
        assert_eq!(event_to_command(&event, None).payload.name(), "AddAttachment");

        let event = Event::new("note-1", 4, NoteEvent::AttachmentDeleted { name: "a.png".into() });
        assert_eq!(event_to_command(&event, None).payload.name(), "DeleteAttachment");
    }
}
