//! Directory-backed record store: one file per record.

use crate::error::{StorageError, StorageResult};
use crate::record::RecordStore;
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Number of digits in a record file name.
pub const RECORD_NAME_WIDTH: usize = 10;

const TEMP_SUFFIX: &str = ".tmp";

/// A record store that keeps every record in its own file.
///
/// Files are named by the zero-padded decimal key (`0000000001`), so the
/// directory listing is the queue. Opening a store creates the directory
/// but writes nothing into it.
///
/// Writes go to a temporary sibling that is synced and renamed over the
/// final name, so a reader never observes a half-written record.
///
/// # Example
///
/// ```no_run
/// use notesync_storage::{DirectoryRecordStore, RecordStore};
/// use std::path::Path;
///
/// let store = DirectoryRecordStore::open(Path::new("outbound")).unwrap();
/// store.put(1, b"event").unwrap();
/// ```
#[derive(Debug)]
pub struct DirectoryRecordStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl DirectoryRecordStore {
    /// Opens or creates a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: &Path) -> StorageResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    /// Returns the directory holding the records.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file name used for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] if the key does not fit in
    /// [`RECORD_NAME_WIDTH`] digits.
    pub fn record_name(key: u64) -> StorageResult<String> {
        let name = format!("{key:0width$}", width = RECORD_NAME_WIDTH);
        if name.len() > RECORD_NAME_WIDTH {
            return Err(StorageError::InvalidKey(format!(
                "key {key} exceeds {RECORD_NAME_WIDTH} digits"
            )));
        }
        Ok(name)
    }

    fn record_path(&self, key: u64) -> StorageResult<PathBuf> {
        Ok(self.dir.join(Self::record_name(key)?))
    }

    fn parse_name(name: &str) -> Option<u64> {
        if name.len() != RECORD_NAME_WIDTH || !name.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        name.parse().ok()
    }
}

impl RecordStore for DirectoryRecordStore {
    fn put(&self, key: u64, data: &[u8]) -> StorageResult<()> {
        let target = self.record_path(key)?;
        let temp = self
            .dir
            .join(format!("{}{TEMP_SUFFIX}", Self::record_name(key)?));

        let _guard = self.write_lock.lock();
        {
            let mut file = File::create(&temp)?;
            file.write_all(data)?;
            file.sync_all()?;
        }
        fs::rename(&temp, &target)?;
        Ok(())
    }

    fn get(&self, key: u64) -> StorageResult<Option<Vec<u8>>> {
        match fs::read(self.record_path(key)?) {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn remove(&self, key: u64) -> StorageResult<bool> {
        let _guard = self.write_lock.lock();
        match fs::remove_file(self.record_path(key)?) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn keys(&self) -> StorageResult<Vec<u64>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(key) = entry.file_name().to_str().and_then(Self::parse_name) {
                keys.push(key);
            }
        }
        keys.sort_unstable();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryRecordStore;
    use proptest::prelude::*;
    use tempfile::tempdir;

    #[derive(Debug, Clone)]
    enum Op {
        Put(u64, Vec<u8>),
        Remove(u64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u64..16, prop::collection::vec(any::<u8>(), 0..64))
                .prop_map(|(key, data)| Op::Put(key, data)),
            (0u64..16).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_directory_matches_memory(ops in prop::collection::vec(op_strategy(), 0..24)) {
            let dir = tempdir().unwrap();
            let directory = DirectoryRecordStore::open(dir.path()).unwrap();
            let memory = InMemoryRecordStore::new();

            for op in &ops {
                match op {
                    Op::Put(key, data) => {
                        directory.put(*key, data).unwrap();
                        memory.put(*key, data).unwrap();
                    }
                    Op::Remove(key) => {
                        prop_assert_eq!(directory.remove(*key).unwrap(), memory.remove(*key).unwrap());
                    }
                }
            }

            let keys = memory.keys().unwrap();
            prop_assert_eq!(directory.keys().unwrap(), keys.clone());
            for key in keys {
                prop_assert_eq!(directory.get(key).unwrap(), memory.get(key).unwrap());
            }
        }
    }

    #[test]
    fn directory_starts_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("outbound");

        let store = DirectoryRecordStore::open(&path).unwrap();
        assert!(path.is_dir());
        assert!(store.is_empty().unwrap());
        assert_eq!(fs::read_dir(&path).unwrap().count(), 0);
    }

    #[test]
    fn directory_file_per_record() {
        let dir = tempdir().unwrap();
        let store = DirectoryRecordStore::open(dir.path()).unwrap();

        store.put(1, b"first").unwrap();
        store.put(12, b"twelfth").unwrap();

        assert!(dir.path().join("0000000001").is_file());
        assert!(dir.path().join("0000000012").is_file());
        assert_eq!(store.keys().unwrap(), vec![1, 12]);
        assert_eq!(store.get(12).unwrap(), Some(b"twelfth".to_vec()));
    }

    #[test]
    fn directory_remove_deletes_file() {
        let dir = tempdir().unwrap();
        let store = DirectoryRecordStore::open(dir.path()).unwrap();

        store.put(3, b"x").unwrap();
        assert!(store.remove(3).unwrap());
        assert!(!dir.path().join("0000000003").exists());
        assert!(!store.remove(3).unwrap());
        assert_eq!(store.get(3).unwrap(), None);
    }

    #[test]
    fn directory_ignores_foreign_files() {
        let dir = tempdir().unwrap();
        let store = DirectoryRecordStore::open(dir.path()).unwrap();

        fs::write(dir.path().join("README"), b"not a record").unwrap();
        fs::write(dir.path().join("0000000004.tmp"), b"partial").unwrap();
        store.put(4, b"real").unwrap();

        assert_eq!(store.keys().unwrap(), vec![4]);
    }

    #[test]
    fn directory_persists_across_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = DirectoryRecordStore::open(dir.path()).unwrap();
            store.put(9, b"durable").unwrap();
        }
        let store = DirectoryRecordStore::open(dir.path()).unwrap();
        assert_eq!(store.get(9).unwrap(), Some(b"durable".to_vec()));
    }

    #[test]
    fn record_name_padding() {
        assert_eq!(DirectoryRecordStore::record_name(1).unwrap(), "0000000001");
        assert_eq!(
            DirectoryRecordStore::record_name(9_999_999_999).unwrap(),
            "9999999999"
        );
        assert!(matches!(
            DirectoryRecordStore::record_name(10_000_000_000),
            Err(StorageError::InvalidKey(_))
        ));
    }
}
