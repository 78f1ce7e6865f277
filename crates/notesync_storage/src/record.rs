//! Record store trait definition.

use crate::error::StorageResult;

/// A keyed store of opaque records.
///
/// # Invariants
///
/// - `get` returns exactly the bytes last written by `put` for that key
/// - `keys` is sorted ascending and lists every key currently present
/// - a successful `put` or `remove` is durable for persistent stores
/// - stores are `Send + Sync`; implementations lock internally
pub trait RecordStore: Send + Sync {
    /// Stores `data` under `key`, replacing any previous record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    fn put(&self, key: u64, data: &[u8]) -> StorageResult<()>;

    /// Reads the record stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the record exists but cannot be read.
    fn get(&self, key: u64) -> StorageResult<Option<Vec<u8>>>;

    /// Removes the record stored under `key`.
    ///
    /// Returns `true` if a record was present.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be deleted.
    fn remove(&self, key: u64) -> StorageResult<bool>;

    /// Lists all keys in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be enumerated.
    fn keys(&self) -> StorageResult<Vec<u64>>;

    /// Returns true if the store holds no records.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be enumerated.
    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.keys()?.is_empty())
    }
}
