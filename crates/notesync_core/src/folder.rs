//! The folder aggregate.

use crate::aggregate::Aggregate;
use crate::error::{CoreError, CoreResult};
use crate::event::{Event, EventPayload, FolderEvent};
use crate::path::Path;
use crate::types::{AggId, AggregateKind, Existence, Revision};
use serde::{Deserialize, Serialize};

const FOLDER_ID_PREFIX: &str = "folder:";

/// A folder in the note hierarchy.
///
/// A folder is identified by its location: its id is derived from its path
/// with [`Folder::agg_id_for`]. Re-creating a deleted folder at the same
/// path revives the same aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    agg_id: AggId,
    revision: Revision,
    existence: Existence,
    path: Path,
}

impl Folder {
    /// Returns the aggregate id of the folder at `path`.
    pub fn agg_id_for(path: &Path) -> AggId {
        format!("{FOLDER_ID_PREFIX}{path}")
    }

    /// Returns true if `agg_id` names a folder.
    pub fn is_folder_id(agg_id: &str) -> bool {
        agg_id.starts_with(FOLDER_ID_PREFIX)
    }

    /// Returns the path a folder id was derived from.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPath`] if `agg_id` is not a folder id or
    /// its path part does not parse.
    pub fn path_of(agg_id: &str) -> CoreResult<Path> {
        agg_id
            .strip_prefix(FOLDER_ID_PREFIX)
            .ok_or_else(|| CoreError::InvalidPath(format!("{agg_id:?} is not a folder id")))
            .and_then(Path::parse)
    }

    /// Returns the location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn check_path(&self, path: &Path) -> CoreResult<()> {
        let expected = Self::agg_id_for(path);
        if expected != self.agg_id {
            return Err(CoreError::AggregateMismatch {
                expected: self.agg_id.clone(),
                actual: expected,
            });
        }
        Ok(())
    }
}

impl Aggregate for Folder {
    type Event = FolderEvent;

    const KIND: AggregateKind = AggregateKind::Folder;

    fn empty(agg_id: &str) -> Self {
        Self {
            agg_id: agg_id.to_string(),
            revision: 0,
            existence: Existence::NotYetCreated,
            path: Path::root(),
        }
    }

    fn agg_id(&self) -> &str {
        &self.agg_id
    }

    fn revision(&self) -> Revision {
        self.revision
    }

    fn existence(&self) -> Existence {
        self.existence
    }

    fn transition(&self, event: &FolderEvent) -> CoreResult<Self> {
        let mut next = self.clone();
        match event {
            FolderEvent::Created { path } => {
                self.check_path(path)?;
                if self.existence == Existence::Exists {
                    return Err(CoreError::invalid_transition(
                        &self.agg_id,
                        "folder already exists",
                    ));
                }
                next.existence = Existence::Exists;
                next.path = path.clone();
            }
            FolderEvent::Deleted { path } => {
                self.check_path(path)?;
                if self.existence == Existence::NotYetCreated {
                    return Err(CoreError::invalid_transition(
                        &self.agg_id,
                        "cannot delete a folder that was never created",
                    ));
                }
                next.existence = Existence::Deleted;
            }
        }
        Ok(next)
    }

    fn with_revision(mut self, revision: Revision) -> Self {
        self.revision = revision;
        self
    }

    fn payload(event: &Event) -> Option<&FolderEvent> {
        match &event.payload {
            EventPayload::Folder(payload) => Some(payload),
            EventPayload::Note(_) => None,
        }
    }

    fn wrap(event: FolderEvent) -> EventPayload {
        EventPayload::Folder(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn work() -> Path {
        Path::new(["work"]).unwrap()
    }

    #[test]
    fn id_derived_from_path() {
        assert_eq!(Folder::agg_id_for(&work()), "folder:work");
        assert_eq!(Folder::agg_id_for(&Path::root()), "folder:");
        assert!(Folder::is_folder_id("folder:work"));
        assert!(!Folder::is_folder_id("note-1"));
        assert_eq!(Folder::path_of("folder:work").unwrap(), work());
        assert!(Folder::path_of("folder:").unwrap().is_root());
        assert!(Folder::path_of("note-1").is_err());
    }

    #[test]
    fn create_delete_recreate() {
        let id = Folder::agg_id_for(&work());
        let folder = Folder::empty(&id)
            .apply(&Event::new(&id, 1, FolderEvent::Created { path: work() }))
            .unwrap();
        assert_eq!(folder.existence(), Existence::Exists);
        assert_eq!(folder.path(), &work());

        let folder = folder
            .apply(&Event::new(&id, 2, FolderEvent::Deleted { path: work() }))
            .unwrap();
        assert_eq!(folder.existence(), Existence::Deleted);

        let folder = folder
            .apply(&Event::new(&id, 3, FolderEvent::Created { path: work() }))
            .unwrap();
        assert_eq!(folder.existence(), Existence::Exists);
        assert_eq!(folder.revision(), 3);
    }

    #[test]
    fn path_must_match_id() {
        let folder = Folder::empty("folder:work");
        let elsewhere = Path::new(["home"]).unwrap();
        let result = folder.apply(&Event::new(
            "folder:work",
            1,
            FolderEvent::Created { path: elsewhere },
        ));
        assert!(matches!(result, Err(CoreError::AggregateMismatch { .. })));
    }

    #[test]
    fn double_create_rejected() {
        let id = Folder::agg_id_for(&work());
        let folder = Folder::empty(&id)
            .apply(&Event::new(&id, 1, FolderEvent::Created { path: work() }))
            .unwrap();
        assert!(folder
            .apply(&Event::new(&id, 2, FolderEvent::Created { path: work() }))
            .is_err());
    }
}
