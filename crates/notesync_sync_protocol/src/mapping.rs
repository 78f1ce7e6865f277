//! Mapping between core commands and command requests.

use crate::error::{ProtocolError, ProtocolResult};
use crate::messages::{CommandMessage, PostCommandRequest};
use notesync_core::{Command, CommandPayload, Path};

/// Builds the request for a command.
///
/// A command without a revision expectation is sent with
/// `last_revision = 0`.
pub fn command_to_request(command: &Command) -> PostCommandRequest {
    let message = match &command.payload {
        CommandPayload::CreateNote {
            path,
            title,
            content,
        } => CommandMessage::CreateNote {
            path: path.to_string(),
            title: title.clone(),
            content: content.clone(),
        },
        CommandPayload::DeleteNote => CommandMessage::DeleteNote,
        CommandPayload::UndeleteNote => CommandMessage::UndeleteNote,
        CommandPayload::ChangeTitle { title } => CommandMessage::ChangeTitle {
            title: title.clone(),
        },
        CommandPayload::ChangeContent { content } => CommandMessage::ChangeContent {
            content: content.clone(),
        },
        CommandPayload::Move { path } => CommandMessage::Move {
            path: path.to_string(),
        },
        CommandPayload::AddAttachment { name, content } => CommandMessage::AddAttachment {
            name: name.clone(),
            content: content.clone(),
        },
        CommandPayload::DeleteAttachment { name } => {
            CommandMessage::DeleteAttachment { name: name.clone() }
        }
        CommandPayload::CreateFolder { path } => CommandMessage::CreateFolder {
            path: path.to_string(),
        },
        CommandPayload::DeleteFolder { path } => CommandMessage::DeleteFolder {
            path: path.to_string(),
        },
    };

    PostCommandRequest {
        agg_id: command.agg_id.clone(),
        last_revision: command.last_revision.unwrap_or(0),
        command: message,
    }
}

/// Rebuilds the command carried by a request.
///
/// The request's `last_revision` always becomes the command's revision
/// expectation.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidPath`] if a path does not parse.
pub fn request_to_command(request: &PostCommandRequest) -> ProtocolResult<Command> {
    let payload = match &request.command {
        CommandMessage::CreateNote {
            path,
            title,
            content,
        } => CommandPayload::CreateNote {
            path: parse_path(path)?,
            title: title.clone(),
            content: content.clone(),
        },
        CommandMessage::DeleteNote => CommandPayload::DeleteNote,
        CommandMessage::UndeleteNote => CommandPayload::UndeleteNote,
        CommandMessage::ChangeTitle { title } => CommandPayload::ChangeTitle {
            title: title.clone(),
        },
        CommandMessage::ChangeContent { content } => CommandPayload::ChangeContent {
            content: content.clone(),
        },
        CommandMessage::Move { path } => CommandPayload::Move {
            path: parse_path(path)?,
        },
        CommandMessage::AddAttachment { name, content } => CommandPayload::AddAttachment {
            name: name.clone(),
            content: content.clone(),
        },
        CommandMessage::DeleteAttachment { name } => {
            CommandPayload::DeleteAttachment { name: name.clone() }
        }
        CommandMessage::CreateFolder { path } => CommandPayload::CreateFolder {
            path: parse_path(path)?,
        },
        CommandMessage::DeleteFolder { path } => CommandPayload::DeleteFolder {
            path: parse_path(path)?,
        },
    };

    if request.agg_id.is_empty() {
        return Err(ProtocolError::InvalidMessage("empty aggregate id".into()));
    }

    Ok(Command::new(
        request.agg_id.clone(),
        Some(request.last_revision),
        payload,
    ))
}

fn parse_path(text: &str) -> ProtocolResult<Path> {
    Path::parse(text).map_err(|e| ProtocolError::InvalidPath {
        path: text.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;

    pub(crate) fn path_strategy() -> impl Strategy<Value = Path> {
        prop::collection::vec("[a-z0-9][a-z0-9 ._-]{0,7}", 0..4)
            .prop_map(|segments| Path::new(segments).unwrap())
    }

    pub(crate) fn payload_strategy() -> impl Strategy<Value = CommandPayload> {
        prop_oneof![
            (path_strategy(), ".{0,12}", ".{0,24}").prop_map(|(path, title, content)| {
                CommandPayload::CreateNote {
                    path,
                    title,
                    content,
                }
            }),
            Just(CommandPayload::DeleteNote),
            Just(CommandPayload::UndeleteNote),
            ".{0,12}".prop_map(|title| CommandPayload::ChangeTitle { title }),
            ".{0,24}".prop_map(|content| CommandPayload::ChangeContent { content }),
            path_strategy().prop_map(|path| CommandPayload::Move { path }),
            (".{1,8}", prop::collection::vec(any::<u8>(), 0..32))
                .prop_map(|(name, content)| CommandPayload::AddAttachment { name, content }),
            ".{1,8}".prop_map(|name| CommandPayload::DeleteAttachment { name }),
            path_strategy().prop_map(|path| CommandPayload::CreateFolder { path }),
            path_strategy().prop_map(|path| CommandPayload::DeleteFolder { path }),
        ]
    }

    pub(crate) fn command_strategy() -> impl Strategy<Value = Command> {
        ("[a-z:-]{1,12}", any::<u64>(), payload_strategy())
            .prop_map(|(agg_id, revision, payload)| Command::new(agg_id, Some(revision), payload))
    }

    proptest! {
        #[test]
        fn prop_command_survives_request(command in command_strategy()) {
            let request = command_to_request(&command);
            prop_assert_eq!(request.last_revision, command.last_revision.unwrap());
            prop_assert_eq!(request_to_command(&request).unwrap(), command);
        }

        #[test]
        fn prop_missing_revision_becomes_zero(payload in payload_strategy()) {
            let command = Command::new("note-1", None, payload.clone());
            let rebuilt = request_to_command(&command_to_request(&command)).unwrap();
            prop_assert_eq!(rebuilt.last_revision, Some(0));
            prop_assert_eq!(rebuilt.payload, payload);
        }
    }

    #[test]
    fn create_note_without_revision_sends_zero() {
        let command = Command::create_note("note-1", Path::root(), "T", "");
        let request = command_to_request(&command);

        assert_eq!(request.agg_id, "note-1");
        assert_eq!(request.last_revision, 0);
        assert_eq!(
            request.command,
            CommandMessage::CreateNote {
                path: String::new(),
                title: "T".into(),
                content: String::new(),
            }
        );
    }

    #[test]
    fn request_back_to_command() {
        let command = Command::new(
            "note-1",
            Some(4),
            CommandPayload::Move {
                path: Path::new(["a", "b"]).unwrap(),
            },
        );
        let request = command_to_request(&command);
        assert_eq!(request.command, CommandMessage::Move { path: "a/b".into() });
        assert_eq!(request_to_command(&request).unwrap(), command);
    }

    #[test]
    fn invalid_path_rejected() {
        let request = PostCommandRequest {
            agg_id: "folder:a".into(),
            last_revision: 0,
            command: CommandMessage::CreateFolder { path: "a//b".into() },
        };
        assert!(matches!(
            request_to_command(&request),
            Err(ProtocolError::InvalidPath { .. })
        ));
    }

    #[test]
    fn empty_agg_id_rejected() {
        let request = PostCommandRequest {
            agg_id: String::new(),
            last_revision: 0,
            command: CommandMessage::DeleteNote,
        };
        assert!(matches!(
            request_to_command(&request),
            Err(ProtocolError::InvalidMessage(_))
        ));
    }
}
