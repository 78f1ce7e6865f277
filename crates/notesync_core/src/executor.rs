//! Command execution with optimistic concurrency.
//!
//! A command is checked against the latest snapshot of its aggregate,
//! mapped to a candidate event, and appended only if it changes state.
//! Batches are fail-fast: the first failing command stops the batch, and
//! commands before it stay committed.

use crate::aggregate::Aggregate;
use crate::cache::{BoundedSnapshotCache, SnapshotCache};
use crate::command::{Command, CommandPayload};
use crate::config::CacheConfig;
use crate::error::{CoreError, CoreResult};
use crate::event::{Event, FolderEvent, NoteEvent};
use crate::event_store::EventStore;
use crate::folder::Folder;
use crate::note::Note;
use crate::projector::Projector;
use crate::types::{AggId, AggregateKind, Existence};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a command came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOrigin {
    /// Authored on this side.
    Local,
    /// Replayed from the other side by the synchronizer.
    Remote,
}

/// A batch of commands for one aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    /// Caller-chosen id, echoed in the result.
    pub request_id: String,
    /// Aggregate every command must address.
    pub agg_id: AggId,
    /// Commands, executed in order.
    pub commands: Vec<Command>,
    /// Origin, for diagnostics.
    pub origin: CommandOrigin,
}

impl CommandRequest {
    /// Creates a request.
    pub fn new(
        request_id: impl Into<String>,
        agg_id: impl Into<AggId>,
        commands: Vec<Command>,
        origin: CommandOrigin,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            agg_id: agg_id.into(),
            commands,
            origin,
        }
    }
}

/// Result of a [`CommandRequest`].
///
/// `outcome` has one entry per executed command. `Ok(None)` means the
/// command succeeded without changing state. Commands after the first
/// failure are not executed and are counted in `skipped`.
#[derive(Debug)]
pub struct CommandResult {
    /// Id of the request.
    pub request_id: String,
    /// Per-command outcome, in order.
    pub outcome: Vec<CoreResult<Option<Event>>>,
    /// Commands not executed because an earlier one failed.
    pub skipped: usize,
}

impl CommandResult {
    /// Returns true if every command succeeded.
    pub fn is_success(&self) -> bool {
        self.skipped == 0 && self.outcome.iter().all(Result::is_ok)
    }

    /// Returns the events appended by this request.
    pub fn events(&self) -> Vec<&Event> {
        self.outcome
            .iter()
            .filter_map(|outcome| outcome.as_ref().ok().and_then(Option::as_ref))
            .collect()
    }

    /// Returns the failure that stopped the batch, if any.
    pub fn error(&self) -> Option<&CoreError> {
        self.outcome.iter().find_map(|outcome| outcome.as_ref().err())
    }
}

fn run_batch(
    request: &CommandRequest,
    mut execute: impl FnMut(&Command) -> CoreResult<Option<Event>>,
) -> CommandResult {
    let mut outcome = Vec::with_capacity(request.commands.len());
    for command in &request.commands {
        let result = if command.agg_id == request.agg_id {
            execute(command)
        } else {
            Err(CoreError::RequestMismatch {
                expected: request.agg_id.clone(),
                actual: command.agg_id.clone(),
            })
        };
        let failed = result.is_err();
        if let Err(err) = &result {
            warn!(
                request_id = %request.request_id,
                agg_id = %command.agg_id,
                command = command.payload.name(),
                origin = ?request.origin,
                error = %err,
                "command failed"
            );
        }
        outcome.push(result);
        if failed {
            break;
        }
    }
    let skipped = request.commands.len() - outcome.len();
    CommandResult {
        request_id: request.request_id.clone(),
        outcome,
        skipped,
    }
}

/// Maps a command to a candidate event for aggregates of kind `A`.
pub trait CommandToEventMapper<A: Aggregate>: Send + Sync {
    /// Returns the candidate event, or `None` if the command is already
    /// satisfied by `aggregate`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnsupportedCommand`] for commands of another
    /// aggregate kind.
    fn map(&self, aggregate: &A, command: &CommandPayload) -> CoreResult<Option<A::Event>>;
}

/// Maps note commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoteCommandMapper;

impl CommandToEventMapper<Note> for NoteCommandMapper {
    fn map(&self, _note: &Note, command: &CommandPayload) -> CoreResult<Option<NoteEvent>> {
        let event = match command {
            CommandPayload::CreateNote {
                path,
                title,
                content,
            } => NoteEvent::Created {
                path: path.clone(),
                title: title.clone(),
                content: content.clone(),
            },
            CommandPayload::DeleteNote => NoteEvent::Deleted,
            CommandPayload::UndeleteNote => NoteEvent::Undeleted,
            CommandPayload::ChangeTitle { title } => NoteEvent::TitleChanged {
                title: title.clone(),
            },
            CommandPayload::ChangeContent { content } => NoteEvent::ContentChanged {
                content: content.clone(),
            },
            CommandPayload::Move { path } => NoteEvent::Moved { path: path.clone() },
            CommandPayload::AddAttachment { name, content } => NoteEvent::AttachmentAdded {
                name: name.clone(),
                content: content.clone(),
            },
            CommandPayload::DeleteAttachment { name } => {
                NoteEvent::AttachmentDeleted { name: name.clone() }
            }
            CommandPayload::CreateFolder { .. } | CommandPayload::DeleteFolder { .. } => {
                return Err(CoreError::UnsupportedCommand {
                    kind: AggregateKind::Note.as_str(),
                    command: command.name(),
                });
            }
        };
        Ok(Some(event))
    }
}

/// Maps folder commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct FolderCommandMapper;

impl CommandToEventMapper<Folder> for FolderCommandMapper {
    fn map(&self, folder: &Folder, command: &CommandPayload) -> CoreResult<Option<FolderEvent>> {
        match command {
            CommandPayload::CreateFolder { path } => {
                if folder.existence() == Existence::Exists && folder.path() == path {
                    return Ok(None);
                }
                Ok(Some(FolderEvent::Created { path: path.clone() }))
            }
            CommandPayload::DeleteFolder { path } => {
                Ok(Some(FolderEvent::Deleted { path: path.clone() }))
            }
            _ => Err(CoreError::UnsupportedCommand {
                kind: AggregateKind::Folder.as_str(),
                command: command.name(),
            }),
        }
    }
}

/// Executes commands against aggregates of kind `A`.
pub struct CommandExecutor<A: Aggregate> {
    store: Arc<dyn EventStore>,
    projector: Projector<A>,
    mapper: Box<dyn CommandToEventMapper<A>>,
    write_lock: Mutex<()>,
}

impl<A: Aggregate> CommandExecutor<A> {
    /// Creates an executor.
    pub fn new(
        store: Arc<dyn EventStore>,
        cache: Arc<dyn SnapshotCache<A>>,
        mapper: Box<dyn CommandToEventMapper<A>>,
    ) -> Self {
        Self {
            projector: Projector::new(Arc::clone(&store), cache),
            store,
            mapper,
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the projector used to load snapshots.
    pub fn projector(&self) -> &Projector<A> {
        &self.projector
    }

    /// Executes one command.
    ///
    /// Returns the appended event, or `None` when the command does not
    /// change state.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConcurrencyConflict`] if `last_revision` does not
    /// match, a transition error if the command is not valid in the current
    /// state, or a storage error from the append. Nothing is appended on
    /// error.
    pub fn execute_command(&self, command: &Command) -> CoreResult<Option<Event>> {
        let _guard = self.write_lock.lock();

        let snapshot = self.projector.project(&command.agg_id, None)?;
        if let Some(expected) = command.last_revision {
            if expected != snapshot.revision() {
                return Err(CoreError::ConcurrencyConflict {
                    agg_id: command.agg_id.clone(),
                    expected,
                    actual: snapshot.revision(),
                });
            }
        }

        let Some(candidate) = self.mapper.map(&snapshot, &command.payload)? else {
            return Ok(None);
        };
        let next = snapshot.transition(&candidate)?;
        if next == snapshot {
            debug!(agg_id = %command.agg_id, command = command.payload.name(), "command changes nothing");
            return Ok(None);
        }

        let event = self.store.append(Event::new(
            command.agg_id.clone(),
            snapshot.revision() + 1,
            A::wrap(candidate),
        ))?;
        self.projector
            .cache()
            .put(next.with_revision(event.revision));
        Ok(Some(event))
    }

    /// Executes a batch, stopping at the first failure.
    pub fn execute(&self, request: &CommandRequest) -> CommandResult {
        run_batch(request, |command| self.execute_command(command))
    }
}

/// Routes commands to the note or folder executor of one event store.
pub struct CommandProcessor {
    store: Arc<dyn EventStore>,
    notes: CommandExecutor<Note>,
    folders: CommandExecutor<Folder>,
}

impl CommandProcessor {
    /// Creates a processor with bounded snapshot caches.
    pub fn new(store: Arc<dyn EventStore>, config: &CacheConfig) -> Self {
        Self {
            notes: CommandExecutor::new(
                Arc::clone(&store),
                Arc::new(BoundedSnapshotCache::new(config.clone())),
                Box::new(NoteCommandMapper),
            ),
            folders: CommandExecutor::new(
                Arc::clone(&store),
                Arc::new(BoundedSnapshotCache::new(config.clone())),
                Box::new(FolderCommandMapper),
            ),
            store,
        }
    }

    /// Returns the underlying event store.
    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    /// Returns the note executor.
    pub fn notes(&self) -> &CommandExecutor<Note> {
        &self.notes
    }

    /// Returns the folder executor.
    pub fn folders(&self) -> &CommandExecutor<Folder> {
        &self.folders
    }

    /// Executes one command on the executor for its kind.
    ///
    /// # Errors
    ///
    /// See [`CommandExecutor::execute_command`].
    pub fn process(&self, command: &Command, origin: CommandOrigin) -> CoreResult<Option<Event>> {
        debug!(
            agg_id = %command.agg_id,
            command = command.payload.name(),
            last_revision = ?command.last_revision,
            ?origin,
            "processing command"
        );
        match command.kind() {
            AggregateKind::Note => self.notes.execute_command(command),
            AggregateKind::Folder => self.folders.execute_command(command),
        }
    }

    /// Executes a batch, stopping at the first failure.
    pub fn execute(&self, request: &CommandRequest) -> CommandResult {
        run_batch(request, |command| self.process(command, request.origin))
    }

    /// Projects the latest state of a note.
    ///
    /// # Errors
    ///
    /// Returns any replay error.
    pub fn note(&self, agg_id: &str) -> CoreResult<Note> {
        self.notes.projector().project(agg_id, None)
    }

    /// Projects the latest state of a folder.
    ///
    /// # Errors
    ///
    /// Returns any replay error.
    pub fn folder(&self, agg_id: &str) -> CoreResult<Folder> {
        self.folders.projector().project(agg_id, None)
    }
}
