//! Top-level assembly of one synchronizing replica.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::importer::{LocalEventImporter, RemoteEventImporter};
use crate::state::{FileStateStore, ImportCursor, MemoryStateStore, StateStore, SynchronizerState};
use crate::strategy::{
    CompositeStrategy, ConflictData, IdGenerator, ManualMergeStrategy,
    MergingSynchronizationStrategy, NoConflictStrategy, ResolutionChoice,
};
use crate::synchronizer::{SyncPassReport, Synchronizer};
use crate::transport::{CommandService, EventService};
use notesync_core::{
    AggId, CacheConfig, CborEventSerializer, Command, CommandOrigin, CommandProcessor, Event,
    EventLog, EventStore, Folder, ModifiableEventStore, Note, StagingLog, StateFeed,
};
use notesync_storage::DirectoryRecordStore;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tracing::{info, warn};

/// The persistent pieces of a replica.
pub struct ClientStores {
    /// The local event log.
    pub events: Arc<dyn EventStore>,
    /// Local events waiting to be sent.
    pub outbound: Arc<dyn ModifiableEventStore>,
    /// Remote events waiting to be applied.
    pub inbound: Arc<dyn ModifiableEventStore>,
    /// Synchronizer state.
    pub state: Arc<dyn StateStore<SynchronizerState>>,
    /// Position of the local importer.
    pub local_cursor: Arc<dyn StateStore<ImportCursor>>,
    /// Position of the remote importer.
    pub remote_cursor: Arc<dyn StateStore<ImportCursor>>,
}

impl ClientStores {
    /// Stores that live in memory.
    pub fn in_memory() -> Self {
        Self {
            events: Arc::new(EventLog::in_memory()),
            outbound: Arc::new(StagingLog::in_memory()),
            inbound: Arc::new(StagingLog::in_memory()),
            state: Arc::new(MemoryStateStore::new()),
            local_cursor: Arc::new(MemoryStateStore::new()),
            remote_cursor: Arc::new(MemoryStateStore::new()),
        }
    }

    /// Opens or creates the stores of a replica directory.
    ///
    /// Layout: `events/`, `outbound/` and `inbound/` hold one file per
    /// event; `state.cbor`, `local_cursor.cbor` and `remote_cursor.cbor`
    /// hold the synchronizer state and the importer positions.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created or an existing
    /// event cannot be loaded.
    pub fn open(dir: &Path) -> SyncResult<Self> {
        let events = EventLog::open(
            Box::new(DirectoryRecordStore::open(&dir.join("events"))?),
            Box::new(CborEventSerializer),
        )?;
        let outbound = StagingLog::open(
            Box::new(DirectoryRecordStore::open(&dir.join("outbound"))?),
            Box::new(CborEventSerializer),
        )?;
        let inbound = StagingLog::open(
            Box::new(DirectoryRecordStore::open(&dir.join("inbound"))?),
            Box::new(CborEventSerializer),
        )?;
        Ok(Self {
            events: Arc::new(events),
            outbound: Arc::new(outbound),
            inbound: Arc::new(inbound),
            state: Arc::new(FileStateStore::new(dir.join("state.cbor"))),
            local_cursor: Arc::new(FileStateStore::new(dir.join("local_cursor.cbor"))),
            remote_cursor: Arc::new(FileStateStore::new(dir.join("remote_cursor.cbor"))),
        })
    }
}

/// A conflicted aggregate of either kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Conflict {
    /// A conflicted note.
    Note(ConflictData<Note>),
    /// A conflicted folder.
    Folder(ConflictData<Folder>),
}

/// Builder for [`SyncClient`].
pub struct SyncClientBuilder {
    stores: ClientStores,
    commands: Arc<dyn CommandService>,
    events: Arc<dyn EventService>,
    config: SyncConfig,
    cache: CacheConfig,
    id_generator: Option<IdGenerator>,
}

impl SyncClientBuilder {
    /// Sets the synchronizer configuration.
    #[must_use]
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the snapshot cache configuration.
    #[must_use]
    pub fn with_cache_config(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Sets the id generator for copies kept by [`ResolutionChoice::Both`].
    #[must_use]
    pub fn with_id_generator(mut self, id_generator: IdGenerator) -> Self {
        self.id_generator = Some(id_generator);
        self
    }

    /// Wires the replica together.
    ///
    /// Diverged aggregates go through the fast path first and fall back to
    /// manual resolution.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored synchronizer state cannot be read.
    pub fn assemble(self) -> SyncResult<SyncClient> {
        let ClientStores {
            events,
            outbound,
            inbound,
            state,
            local_cursor,
            remote_cursor,
        } = self.stores;

        let processor = Arc::new(CommandProcessor::new(Arc::clone(&events), &self.cache));
        let conflicts = Arc::new(StateFeed::<BTreeSet<AggId>>::default());

        let mut notes = ManualMergeStrategy::<Note>::new(Arc::clone(&conflicts));
        let mut folders = ManualMergeStrategy::<Folder>::new(Arc::clone(&conflicts));
        if let Some(generator) = self.id_generator {
            notes = notes.with_id_generator(Arc::clone(&generator));
            folders = folders.with_id_generator(generator);
        }
        let notes = Arc::new(notes);
        let folders = Arc::new(folders);

        let strategy = CompositeStrategy::new()
            .with(Arc::new(NoConflictStrategy))
            .with(Arc::new(MergingSynchronizationStrategy::new(
                processor.notes().projector().clone(),
                notes.clone(),
            )))
            .with(Arc::new(MergingSynchronizationStrategy::new(
                processor.folders().projector().clone(),
                folders.clone(),
            )));

        let local_importer = LocalEventImporter::new(
            events,
            Arc::clone(&outbound),
            local_cursor,
            self.config.import_batch_size,
        );
        let remote_importer = RemoteEventImporter::new(
            self.events,
            Arc::clone(&inbound),
            remote_cursor,
            self.config.import_batch_size,
            self.config.rpc_deadline,
        );

        let synchronizer = Synchronizer::new(
            self.config,
            Arc::clone(&processor),
            Arc::clone(&outbound),
            Arc::clone(&inbound),
            self.commands,
            Arc::new(strategy),
        )
        .with_state_store(state)?;

        Ok(SyncClient {
            processor,
            outbound,
            inbound,
            local_importer,
            remote_importer,
            synchronizer,
            notes,
            folders,
            conflicts,
        })
    }
}

/// One replica: a local log synchronized with a remote service.
///
/// ```rust
/// use notesync_core::{Command, Path};
/// use notesync_sync_engine::{ClientStores, MockTransport, SyncClient};
/// use std::sync::Arc;
///
/// let transport = Arc::new(MockTransport::new());
/// let client = SyncClient::builder(ClientStores::in_memory(), transport.clone(), transport)
///     .assemble()
///     .unwrap();
///
/// client.execute(&Command::create_note("note-1", Path::root(), "T", "")).unwrap();
/// assert_eq!(client.note("note-1").unwrap().title(), "T");
/// ```
pub struct SyncClient {
    processor: Arc<CommandProcessor>,
    outbound: Arc<dyn ModifiableEventStore>,
    inbound: Arc<dyn ModifiableEventStore>,
    local_importer: LocalEventImporter,
    remote_importer: RemoteEventImporter,
    synchronizer: Synchronizer,
    notes: Arc<ManualMergeStrategy<Note>>,
    folders: Arc<ManualMergeStrategy<Folder>>,
    conflicts: Arc<StateFeed<BTreeSet<AggId>>>,
}

impl SyncClient {
    /// Starts building a replica over `stores` talking to the given services.
    pub fn builder(
        stores: ClientStores,
        commands: Arc<dyn CommandService>,
        events: Arc<dyn EventService>,
    ) -> SyncClientBuilder {
        SyncClientBuilder {
            stores,
            commands,
            events,
            config: SyncConfig::default(),
            cache: CacheConfig::default(),
            id_generator: None,
        }
    }

    /// Returns the local command processor.
    pub fn processor(&self) -> &Arc<CommandProcessor> {
        &self.processor
    }

    /// Returns the synchronizer.
    pub fn synchronizer(&self) -> &Synchronizer {
        &self.synchronizer
    }

    /// Returns the outbound staging log.
    pub fn outbound(&self) -> &Arc<dyn ModifiableEventStore> {
        &self.outbound
    }

    /// Returns the inbound staging log.
    pub fn inbound(&self) -> &Arc<dyn ModifiableEventStore> {
        &self.inbound
    }

    /// Executes a local edit.
    ///
    /// # Errors
    ///
    /// Returns the executor's error; nothing is appended in that case.
    pub fn execute(&self, command: &Command) -> SyncResult<Option<Event>> {
        Ok(self.processor.process(command, CommandOrigin::Local)?)
    }

    /// Projects the latest local state of a note.
    ///
    /// # Errors
    ///
    /// Returns any replay error.
    pub fn note(&self, agg_id: &str) -> SyncResult<Note> {
        Ok(self.processor.note(agg_id)?)
    }

    /// Projects the latest local state of a folder.
    ///
    /// # Errors
    ///
    /// Returns any replay error.
    pub fn folder(&self, agg_id: &str) -> SyncResult<Folder> {
        Ok(self.processor.folder(agg_id)?)
    }

    /// Imports new events from both sides and runs one pass.
    ///
    /// An unreachable remote only skips the remote import; local events
    /// are still staged and the report says the remote was unavailable.
    ///
    /// # Errors
    ///
    /// Returns an error if a local store fails or the remote answers with
    /// a non-transient error.
    pub fn sync_once(&self) -> SyncResult<SyncPassReport> {
        let staged = self.local_importer.import()?;
        let (fetched, remote_unavailable) = match self.remote_importer.import() {
            Ok(fetched) => (fetched, false),
            Err(err) if err.is_transient() => {
                warn!(error = %err, "remote events unavailable");
                (0, true)
            }
            Err(err) => return Err(err),
        };

        let mut report = self.synchronizer.synchronize()?;
        report.remote_unavailable |= remote_unavailable;
        info!(staged, fetched, clean = report.is_clean(), "sync finished");
        Ok(report)
    }

    /// Returns the synchronizer state.
    pub fn state(&self) -> SynchronizerState {
        self.synchronizer.state()
    }

    /// Returns the ids waiting for a manual decision.
    pub fn conflicts(&self) -> BTreeSet<AggId> {
        self.conflicts.get()
    }

    /// Subscribes to the set of conflicted ids. The current set is
    /// delivered first.
    pub fn conflict_updates(&self) -> Receiver<BTreeSet<AggId>> {
        self.conflicts.subscribe()
    }

    /// Returns the pinned versions of a conflicted aggregate.
    pub fn conflict_data(&self, agg_id: &str) -> Option<Conflict> {
        if Folder::is_folder_id(agg_id) {
            self.folders.conflict_data(agg_id).map(Conflict::Folder)
        } else {
            self.notes.conflict_data(agg_id).map(Conflict::Note)
        }
    }

    /// Records a decision for a conflicted aggregate. It takes effect on
    /// the next [`sync_once`](Self::sync_once).
    ///
    /// Returns the id of the copy made by [`ResolutionChoice::Both`].
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NoConflict`] if the aggregate is not waiting
    /// for a decision.
    pub fn resolve(&self, agg_id: &str, choice: ResolutionChoice) -> SyncResult<Option<AggId>> {
        if agg_id.is_empty() {
            return Err(SyncError::UnsupportedAggregate(agg_id.to_string()));
        }
        if Folder::is_folder_id(agg_id) {
            self.folders.resolve(agg_id, choice)
        } else {
            self.notes.resolve(agg_id, choice)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use notesync_core::Path;
    use notesync_sync_protocol::{PostCommandResponse, RpcCode, RpcStatus};
    use tempfile::tempdir;

    fn replica(transport: &Arc<MockTransport>, stores: ClientStores) -> SyncClient {
        SyncClient::builder(stores, transport.clone(), transport.clone())
            .assemble()
            .unwrap()
    }

    #[test]
    fn local_edit_reaches_the_remote() {
        let transport = Arc::new(MockTransport::new());
        let client = replica(&transport, ClientStores::in_memory());

        client
            .execute(&Command::create_note("note-1", Path::root(), "T", "body"))
            .unwrap();
        transport.push_reply(Ok(PostCommandResponse::success(1, 1)));

        let report = client.sync_once().unwrap();
        assert_eq!(report.sent, 1);
        assert!(report.is_clean());
        assert!(client.outbound().events().unwrap().is_empty());
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn remote_event_is_applied_and_its_echo_dropped() {
        let transport = Arc::new(MockTransport::new());
        let client = replica(&transport, ClientStores::in_memory());

        transport.push_event(
            Event::new(
                "note-1",
                1,
                notesync_core::NoteEvent::Created {
                    path: Path::root(),
                    title: "R".into(),
                    content: String::new(),
                },
            )
            .with_event_id(1),
        );

        let report = client.sync_once().unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(client.note("note-1").unwrap().title(), "R");

        // the applied event comes back through the local importer
        let report = client.sync_once().unwrap();
        assert_eq!(report.ignored, 1);
        assert_eq!(report.sent, 0);
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn unreachable_remote_keeps_local_events() {
        let transport = Arc::new(MockTransport::new());
        let client = replica(&transport, ClientStores::in_memory());

        client
            .execute(&Command::create_note("note-1", Path::root(), "T", ""))
            .unwrap();
        transport.push_reply(Err(RpcStatus::new(RpcCode::DeadlineExceeded, "slow")));

        let report = client.sync_once().unwrap();
        assert!(report.remote_unavailable);
        assert_eq!(client.outbound().events().unwrap().len(), 1);
    }

    #[test]
    fn resolve_without_conflict() {
        let transport = Arc::new(MockTransport::new());
        let client = replica(&transport, ClientStores::in_memory());

        assert!(matches!(
            client.resolve("note-1", ResolutionChoice::Local),
            Err(SyncError::NoConflict(_))
        ));
        assert!(matches!(
            client.resolve("", ResolutionChoice::Local),
            Err(SyncError::UnsupportedAggregate(_))
        ));
        assert!(client.conflict_data("note-1").is_none());
        assert!(client.conflicts().is_empty());
    }

    #[test]
    fn replica_directory_survives_restart() {
        let dir = tempdir().unwrap();
        let transport = Arc::new(MockTransport::new());
        {
            let client = replica(&transport, ClientStores::open(dir.path()).unwrap());
            client
                .execute(&Command::create_note("note-1", Path::root(), "T", ""))
                .unwrap();
            transport.push_reply(Ok(PostCommandResponse::success(4, 1)));
            client.sync_once().unwrap();
        }

        let client = replica(&transport, ClientStores::open(dir.path()).unwrap());
        assert_eq!(client.note("note-1").unwrap().title(), "T");
        assert!(client.state().remote_event_ids_to_ignore.contains(&4));

        // the cursor was persisted, so nothing is staged twice
        let report = client.sync_once().unwrap();
        assert_eq!(report.sent, 0);
        assert_eq!(transport.requests().len(), 1);
    }
}
