//! # notesync storage
//!
//! Lowest-level persistence for notesync.
//!
//! Record stores are **opaque keyed byte stores**: they map a `u64` key to
//! a blob and never interpret what they hold. Event logs and staging
//! queues sit on top of them and own all format decisions.
//!
//! ## Available Stores
//!
//! - [`InMemoryRecordStore`] - For tests and ephemeral logs
//! - [`DirectoryRecordStore`] - One file per record, named by its key
//! - [`SnapshotFile`] - A single value replaced atomically on every write
//!
//! ## Example
//!
//! ```rust
//! use notesync_storage::{InMemoryRecordStore, RecordStore};
//!
//! let store = InMemoryRecordStore::new();
//! store.put(1, b"hello").unwrap();
//! assert_eq!(store.get(1).unwrap().as_deref(), Some(&b"hello"[..]));
//! assert_eq!(store.keys().unwrap(), vec![1]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod directory;
mod error;
mod memory;
mod record;
mod snapshot;

pub use directory::{DirectoryRecordStore, RECORD_NAME_WIDTH};
pub use error::{StorageError, StorageResult};
pub use memory::InMemoryRecordStore;
pub use record::RecordStore;
pub use snapshot::SnapshotFile;
