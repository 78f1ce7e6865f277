//! Synchronizer bookkeeping and its persistence.

use crate::error::{SyncError, SyncResult};
use notesync_core::{AggId, EventId, Revision};
use notesync_storage::SnapshotFile;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::marker::PhantomData;
use std::path::PathBuf;

/// What the synchronizer knows about both sides.
///
/// The value is replaced as a whole on every change; the synchronizer
/// builds the next state from a copy and publishes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynchronizerState {
    /// Highest local revision seen per aggregate.
    pub last_known_local_revisions: BTreeMap<AggId, Revision>,
    /// Highest remote revision seen per aggregate.
    pub last_known_remote_revisions: BTreeMap<AggId, Revision>,
    /// Highest local revision confirmed on the remote side per aggregate.
    pub last_synchronized_local_revisions: BTreeMap<AggId, Revision>,
    /// Local events caused by the synchronizer itself.
    pub local_event_ids_to_ignore: BTreeSet<EventId>,
    /// Remote events caused by the synchronizer itself.
    pub remote_event_ids_to_ignore: BTreeSet<EventId>,
}

impl SynchronizerState {
    /// Returns the last known local revision, `0` if unknown.
    pub fn last_known_local(&self, agg_id: &str) -> Revision {
        self.last_known_local_revisions
            .get(agg_id)
            .copied()
            .unwrap_or(0)
    }

    /// Returns the last known remote revision, `0` if unknown.
    pub fn last_known_remote(&self, agg_id: &str) -> Revision {
        self.last_known_remote_revisions
            .get(agg_id)
            .copied()
            .unwrap_or(0)
    }

    /// Returns the last synchronized local revision, `0` if unknown.
    pub fn last_synchronized_local(&self, agg_id: &str) -> Revision {
        self.last_synchronized_local_revisions
            .get(agg_id)
            .copied()
            .unwrap_or(0)
    }

    /// Raises the last known local revision.
    pub fn observe_local(&mut self, agg_id: &str, revision: Revision) {
        raise(&mut self.last_known_local_revisions, agg_id, revision);
    }

    /// Raises the last known remote revision.
    pub fn observe_remote(&mut self, agg_id: &str, revision: Revision) {
        raise(&mut self.last_known_remote_revisions, agg_id, revision);
    }

    /// Raises the last synchronized local revision.
    pub fn mark_synchronized(&mut self, agg_id: &str, revision: Revision) {
        raise(&mut self.last_synchronized_local_revisions, agg_id, revision);
    }
}

fn raise(map: &mut BTreeMap<AggId, Revision>, agg_id: &str, revision: Revision) {
    let slot = map.entry(agg_id.to_string()).or_insert(0);
    *slot = (*slot).max(revision);
}

/// Import position of a staging importer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportCursor {
    /// Id of the last event copied into staging.
    pub last_event_id: EventId,
}

/// Durable slot for one value.
pub trait StateStore<T>: Send + Sync {
    /// Loads the stored value, `None` if nothing was saved yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored value cannot be read or decoded.
    fn load(&self) -> SyncResult<Option<T>>;

    /// Replaces the stored value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be encoded or written.
    fn save(&self, value: &T) -> SyncResult<()>;
}

/// A [`StateStore`] that keeps the value in memory.
pub struct MemoryStateStore<T> {
    value: Mutex<Option<T>>,
}

impl<T> MemoryStateStore<T> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            value: Mutex::new(None),
        }
    }
}

impl<T> Default for MemoryStateStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send> StateStore<T> for MemoryStateStore<T> {
    fn load(&self) -> SyncResult<Option<T>> {
        Ok(self.value.lock().clone())
    }

    fn save(&self, value: &T) -> SyncResult<()> {
        *self.value.lock() = Some(value.clone());
        Ok(())
    }
}

/// A [`StateStore`] backed by a CBOR-encoded [`SnapshotFile`].
pub struct FileStateStore<T> {
    file: SnapshotFile,
    _value: PhantomData<fn() -> T>,
}

impl<T> FileStateStore<T> {
    /// Creates a store writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: SnapshotFile::new(path),
            _value: PhantomData,
        }
    }

    /// Returns the backing file.
    pub fn file(&self) -> &SnapshotFile {
        &self.file
    }
}

impl<T: Serialize + DeserializeOwned> StateStore<T> for FileStateStore<T> {
    fn load(&self) -> SyncResult<Option<T>> {
        let Some(bytes) = self.file.read()? else {
            return Ok(None);
        };
        ciborium::from_reader(bytes.as_slice())
            .map(Some)
            .map_err(|e| SyncError::Codec(e.to_string()))
    }

    fn save(&self, value: &T) -> SyncResult<()> {
        let mut bytes = Vec::new();
        ciborium::into_writer(value, &mut bytes).map_err(|e| SyncError::Codec(e.to_string()))?;
        self.file.write(&bytes)?;
        Ok(())
    }
}
