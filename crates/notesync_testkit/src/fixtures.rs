//! Event fixtures and replica directories.

use notesync_core::{Command, Event, NoteEvent, Path, Revision};
use notesync_sync_engine::ClientStores;
use std::path::PathBuf;
use tempfile::TempDir;

/// A `NoteCreated` event at the root with empty content.
pub fn note_created(agg_id: &str, title: &str) -> Event {
    Event::new(
        agg_id,
        1,
        NoteEvent::Created {
            path: Path::root(),
            title: title.into(),
            content: String::new(),
        },
    )
}

/// A `TitleChanged` event.
pub fn title_changed(agg_id: &str, revision: Revision, title: &str) -> Event {
    Event::new(agg_id, revision, NoteEvent::TitleChanged { title: title.into() })
}

/// A `CreateNote` command at the root with empty content.
pub fn create_note_command(agg_id: &str, title: &str) -> Command {
    Command::create_note(agg_id, Path::root(), title, "")
}

/// A replica directory with automatic cleanup.
pub struct TestReplicaDir {
    /// The opened stores.
    pub stores: ClientStores,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: TempDir,
}

impl TestReplicaDir {
    /// Creates and opens an empty replica directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let stores = ClientStores::open(temp_dir.path()).expect("Failed to open replica stores");
        Self { stores, temp_dir }
    }

    /// Returns the directory path.
    pub fn path(&self) -> PathBuf {
        self.temp_dir.path().to_path_buf()
    }

    /// Opens the directory again, as a restarted process would.
    pub fn reopen(&self) -> ClientStores {
        ClientStores::open(self.temp_dir.path()).expect("Failed to reopen replica stores")
    }
}

impl Default for TestReplicaDir {
    fn default() -> Self {
        Self::new()
    }
}
