//! Basic identifier types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregate identifier.
pub type AggId = String;

/// Aggregate revision. `0` means the aggregate was never created.
pub type Revision = u64;

/// Log-assigned event identifier. `0` means "not assigned yet".
pub type EventId = u64;

/// Kind of aggregate an event or command belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AggregateKind {
    /// A note.
    Note,
    /// A folder.
    Folder,
}

impl AggregateKind {
    /// Returns a lowercase name for logs and messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateKind::Note => "note",
            AggregateKind::Folder => "folder",
        }
    }
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Three-state existence of an aggregate.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Existence {
    /// No creation event was applied yet.
    #[default]
    NotYetCreated,
    /// Created and not deleted.
    Exists,
    /// Deleted after creation.
    Deleted,
}
