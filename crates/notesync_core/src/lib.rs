//! # notesync core
//!
//! Event-sourced model of a note hierarchy.
//!
//! This crate provides:
//! - [`Path`], the validated location of notes and folders
//! - the [`Note`] and [`Folder`] aggregates and their events and commands
//! - [`EventLog`], an append-only event store, and [`StagingLog`], the
//!   removable variant used as an outbound or inbound mailbox
//! - [`Projector`] with a bounded [`SnapshotCache`]
//! - [`CommandExecutor`] and [`CommandProcessor`] with optimistic
//!   concurrency
//!
//! ## Example
//!
//! ```rust
//! use notesync_core::{CacheConfig, Command, CommandOrigin, CommandProcessor, EventLog, Path};
//! use std::sync::Arc;
//!
//! let store = Arc::new(EventLog::in_memory());
//! let processor = CommandProcessor::new(store, &CacheConfig::default());
//!
//! let command = Command::create_note("note-1", Path::root(), "Groceries", "milk");
//! let event = processor.process(&command, CommandOrigin::Local).unwrap().unwrap();
//! assert_eq!(event.revision, 1);
//! assert_eq!(processor.note("note-1").unwrap().title(), "Groceries");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod aggregate;
mod cache;
mod command;
mod config;
mod error;
mod event;
mod event_store;
mod executor;
mod feed;
mod folder;
mod note;
mod path;
mod projector;
mod serializer;
mod staging;
mod types;

pub use aggregate::{replay, Aggregate};
pub use cache::{BoundedSnapshotCache, NoopCache, SnapshotCache};
pub use command::{Command, CommandPayload};
pub use config::CacheConfig;
pub use error::{CoreError, CoreResult};
pub use event::{Event, EventPayload, FolderEvent, NoteEvent};
pub use event_store::{EventLog, EventStore};
pub use executor::{
    CommandExecutor, CommandOrigin, CommandProcessor, CommandRequest, CommandResult,
    CommandToEventMapper, FolderCommandMapper, NoteCommandMapper,
};
pub use feed::{ChangeFeed, StateFeed};
pub use folder::Folder;
pub use note::Note;
pub use path::Path;
pub use projector::Projector;
pub use serializer::{CborEventSerializer, EventSerializer};
pub use staging::{ModifiableEventStore, StagingLog};
pub use types::{AggId, AggregateKind, EventId, Existence, Revision};
