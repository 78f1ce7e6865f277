//! Modifiable event logs used as outbound and inbound mailboxes.

use crate::error::{CoreError, CoreResult};
use crate::event::Event;
use crate::feed::ChangeFeed;
use crate::serializer::{CborEventSerializer, EventSerializer};
use crate::types::EventId;
use notesync_storage::{InMemoryRecordStore, RecordStore};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::mpsc::Receiver;
use tracing::trace;

/// An event log that supports removal.
///
/// Unlike [`EventStore`](crate::EventStore), events keep the id assigned
/// by the log they were copied from, and entries disappear once they have
/// been handled. The contents always equal the pending queue.
pub trait ModifiableEventStore: Send + Sync {
    /// Stores a copy of an event under its own `event_id`.
    ///
    /// Adding an identical event twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateEvent`] if a different event is stored
    /// under the same id, or a storage error.
    fn add(&self, event: Event) -> CoreResult<()>;

    /// Removes an event.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EventNotFound`] if the event is not queued, or a
    /// storage error.
    fn remove(&self, event: &Event) -> CoreResult<()>;

    /// Returns all queued events ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read.
    fn events(&self) -> CoreResult<Vec<Event>>;

    /// Returns the queued events of one aggregate ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read.
    fn events_of_aggregate(&self, agg_id: &str) -> CoreResult<Vec<Event>> {
        Ok(self
            .events()?
            .into_iter()
            .filter(|event| event.agg_id == agg_id)
            .collect())
    }

    /// Returns true if an event with this id is queued.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read.
    fn contains(&self, event_id: EventId) -> CoreResult<bool>;

    /// Subscribes to events added from now on.
    fn event_updates(&self) -> Receiver<Event>;
}

/// The standard [`ModifiableEventStore`] over a [`RecordStore`].
///
/// With a [`DirectoryRecordStore`](notesync_storage::DirectoryRecordStore)
/// every queued event is one file named by its event id.
pub struct StagingLog {
    records: Box<dyn RecordStore>,
    serializer: Box<dyn EventSerializer>,
    queue: RwLock<BTreeMap<EventId, Event>>,
    updates: ChangeFeed<Event>,
}

impl StagingLog {
    /// Creates an empty queue in memory.
    pub fn in_memory() -> Self {
        Self {
            records: Box::new(InMemoryRecordStore::new()),
            serializer: Box::new(CborEventSerializer),
            queue: RwLock::new(BTreeMap::new()),
            updates: ChangeFeed::new(),
        }
    }

    /// Opens a queue over existing records.
    ///
    /// # Errors
    ///
    /// Returns an error if a record cannot be read or decoded.
    pub fn open(
        records: Box<dyn RecordStore>,
        serializer: Box<dyn EventSerializer>,
    ) -> CoreResult<Self> {
        let mut queue = BTreeMap::new();
        for key in records.keys()? {
            if let Some(bytes) = records.get(key)? {
                let event = serializer.deserialize(&bytes)?;
                queue.insert(key, event);
            }
        }
        Ok(Self {
            records,
            serializer,
            queue: RwLock::new(queue),
            updates: ChangeFeed::new(),
        })
    }

    /// Returns the number of queued events.
    pub fn len(&self) -> usize {
        self.queue.read().len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.read().is_empty()
    }
}

impl ModifiableEventStore for StagingLog {
    fn add(&self, event: Event) -> CoreResult<()> {
        let mut queue = self.queue.write();
        if let Some(existing) = queue.get(&event.event_id) {
            if *existing == event {
                return Ok(());
            }
            return Err(CoreError::DuplicateEvent(event.event_id));
        }

        let bytes = self.serializer.serialize(&event)?;
        self.records.put(event.event_id, &bytes)?;
        trace!(event_id = event.event_id, agg_id = %event.agg_id, "staged event");
        queue.insert(event.event_id, event.clone());
        self.updates.emit(event);
        Ok(())
    }

    fn remove(&self, event: &Event) -> CoreResult<()> {
        let mut queue = self.queue.write();
        if !queue.contains_key(&event.event_id) {
            return Err(CoreError::EventNotFound(event.event_id));
        }
        self.records.remove(event.event_id)?;
        queue.remove(&event.event_id);
        trace!(event_id = event.event_id, agg_id = %event.agg_id, "unstaged event");
        Ok(())
    }

    fn events(&self) -> CoreResult<Vec<Event>> {
        Ok(self.queue.read().values().cloned().collect())
    }

    fn contains(&self, event_id: EventId) -> CoreResult<bool> {
        Ok(self.queue.read().contains_key(&event_id))
    }

    fn event_updates(&self) -> Receiver<Event> {
        self.updates.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NoteEvent;
    use notesync_storage::DirectoryRecordStore;
    use std::fs;
    use tempfile::tempdir;

    fn event(event_id: EventId, agg_id: &str) -> Event {
        Event::new(agg_id, 1, NoteEvent::Deleted).with_event_id(event_id)
    }

    #[test]
    fn add_keeps_source_ids() {
        let log = StagingLog::in_memory();
        log.add(event(7, "a")).unwrap();
        log.add(event(3, "b")).unwrap();

        let ids: Vec<_> = log.events().unwrap().iter().map(|e| e.event_id).collect();
        assert_eq!(ids, vec![3, 7]);
        assert!(log.contains(7).unwrap());
    }

    #[test]
    fn add_is_idempotent_for_identical_events() {
        let log = StagingLog::in_memory();
        log.add(event(1, "a")).unwrap();
        log.add(event(1, "a")).unwrap();
        assert_eq!(log.len(), 1);

        assert!(matches!(
            log.add(event(1, "other")),
            Err(CoreError::DuplicateEvent(1))
        ));
    }

    #[test]
    fn remove_and_missing() {
        let log = StagingLog::in_memory();
        let e = event(1, "a");
        log.add(e.clone()).unwrap();
        log.remove(&e).unwrap();

        assert!(log.is_empty());
        assert!(matches!(log.remove(&e), Err(CoreError::EventNotFound(1))));
    }

    #[test]
    fn events_of_aggregate_filters() {
        let log = StagingLog::in_memory();
        log.add(event(1, "a")).unwrap();
        log.add(event(2, "b")).unwrap();
        log.add(event(3, "a")).unwrap();

        let ids: Vec<_> = log
            .events_of_aggregate("a")
            .unwrap()
            .iter()
            .map(|e| e.event_id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn directory_mirrors_queue() {
        let dir = tempdir().unwrap();
        let records = DirectoryRecordStore::open(dir.path()).unwrap();
        let log = StagingLog::open(Box::new(records), Box::new(CborEventSerializer)).unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);

        let e = event(1, "a");
        log.add(e.clone()).unwrap();
        assert!(dir.path().join("0000000001").is_file());

        log.remove(&e).unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn reopen_restores_queue() {
        let dir = tempdir().unwrap();
        {
            let records = DirectoryRecordStore::open(dir.path()).unwrap();
            let log = StagingLog::open(Box::new(records), Box::new(CborEventSerializer)).unwrap();
            log.add(event(4, "a")).unwrap();
        }
        let records = DirectoryRecordStore::open(dir.path()).unwrap();
        let log = StagingLog::open(Box::new(records), Box::new(CborEventSerializer)).unwrap();
        assert_eq!(log.events().unwrap(), vec![event(4, "a")]);
    }

    #[test]
    fn updates_on_add() {
        let log = StagingLog::in_memory();
        let rx = log.event_updates();
        log.add(event(1, "a")).unwrap();
        log.add(event(1, "a")).unwrap();
        assert_eq!(rx.try_iter().count(), 1);
    }
}
