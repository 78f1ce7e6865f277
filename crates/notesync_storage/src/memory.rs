//! In-memory record store for testing.

use crate::error::StorageResult;
use crate::record::RecordStore;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// An in-memory record store.
///
/// Suitable for unit tests and for logs that do not need to survive the
/// process.
///
/// # Example
///
/// ```rust
/// use notesync_storage::{InMemoryRecordStore, RecordStore};
///
/// let store = InMemoryRecordStore::new();
/// store.put(7, b"seven").unwrap();
/// assert!(store.remove(7).unwrap());
/// assert!(store.is_empty().unwrap());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: RwLock<BTreeMap<u64, Vec<u8>>>,
}

impl InMemoryRecordStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn put(&self, key: u64, data: &[u8]) -> StorageResult<()> {
        self.records.write().insert(key, data.to_vec());
        Ok(())
    }

    fn get(&self, key: u64) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.records.read().get(&key).cloned())
    }

    fn remove(&self, key: u64) -> StorageResult<bool> {
        Ok(self.records.write().remove(&key).is_some())
    }

    fn keys(&self) -> StorageResult<Vec<u64>> {
        Ok(self.records.read().keys().copied().collect())
    }
}
