//! Property-based test generators using proptest.
//!
//! Edit commands produced here are valid against any existing note, so a
//! script of them never fails to execute.

use notesync_core::{Command, CommandPayload, NoteEvent, Path};
use proptest::prelude::*;

/// Strategy for generating valid path segments.
pub fn segment_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9 _-]{0,11}")
        .expect("Invalid regex")
        .prop_filter("Segment must not be blank", |s| !s.trim().is_empty())
}

/// Strategy for generating valid paths, the root included.
pub fn path_strategy() -> impl Strategy<Value = Path> {
    prop::collection::vec(segment_strategy(), 0..4)
        .prop_map(|segments| Path::new(segments).expect("generated segments are valid"))
}

/// Strategy for generating note event payloads that apply to a live note.
pub fn live_note_event_strategy() -> impl Strategy<Value = NoteEvent> {
    prop_oneof![
        "[a-z]{0,8}".prop_map(|title| NoteEvent::TitleChanged { title }),
        "[a-z ]{0,16}".prop_map(|content| NoteEvent::ContentChanged { content }),
        path_strategy().prop_map(|path| NoteEvent::Moved { path }),
        ("[a-c]", prop::collection::vec(any::<u8>(), 0..4))
            .prop_map(|(name, content)| NoteEvent::AttachmentAdded { name, content }),
    ]
}

/// Strategy for generating edits of an existing note.
pub fn note_edit_strategy(agg_id: &'static str) -> impl Strategy<Value = Command> {
    live_note_event_strategy().prop_map(move |event| {
        let payload = match event {
            NoteEvent::TitleChanged { title } => CommandPayload::ChangeTitle { title },
            NoteEvent::ContentChanged { content } => CommandPayload::ChangeContent { content },
            NoteEvent::Moved { path } => CommandPayload::Move { path },
            NoteEvent::AttachmentAdded { name, content } => {
                CommandPayload::AddAttachment { name, content }
            }
            _ => CommandPayload::ChangeTitle {
                title: String::new(),
            },
        };
        Command::new(agg_id, None, payload)
    })
}

/// Strategy for generating a script of edits of an existing note.
pub fn edit_script_strategy(
    agg_id: &'static str,
    max_len: usize,
) -> impl Strategy<Value = Vec<Command>> {
    prop::collection::vec(note_edit_strategy(agg_id), 0..=max_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn prop_paths_round_trip(path in path_strategy()) {
            prop_assert_eq!(Path::parse(&path.to_string()).unwrap(), path);
        }

        #[test]
        fn prop_edits_target_the_note(script in edit_script_strategy("note-1", 6)) {
            for command in script {
                prop_assert_eq!(command.agg_id.as_str(), "note-1");
                prop_assert!(!command.payload.is_creation());
            }
        }
    }
}
