//! Append-only event logs.

use crate::error::{CoreError, CoreResult};
use crate::event::Event;
use crate::feed::ChangeFeed;
use crate::serializer::{CborEventSerializer, EventSerializer};
use crate::types::{AggId, EventId, Revision};
use notesync_storage::{InMemoryRecordStore, RecordStore, StorageError};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::mpsc::Receiver;
use tracing::debug;

/// An append-only, per-aggregate revision-ordered event log.
///
/// # Invariants
///
/// - event ids are assigned by the log, strictly increasing, starting at 1
/// - the events of one aggregate carry revisions `1..=n` without gaps
/// - `event_updates` receivers see appended events in append order
pub trait EventStore: Send + Sync {
    /// Appends an event and assigns its id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AppendRejected`] if the aggregate's current
    /// revision is not `event.revision - 1`, or a storage error if the
    /// event cannot be persisted.
    fn append(&self, event: Event) -> CoreResult<Event>;

    /// Returns the events of one aggregate with a revision greater than
    /// `after_revision`, ordered by revision.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    fn events_of_aggregate(
        &self,
        agg_id: &str,
        after_revision: Option<Revision>,
    ) -> CoreResult<Vec<Event>>;

    /// Returns all events with an id greater than `after_event_id`, ordered
    /// by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    fn all_events(&self, after_event_id: Option<EventId>) -> CoreResult<Vec<Event>>;

    /// Returns the latest revision of an aggregate, `0` if unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    fn current_revision(&self, agg_id: &str) -> CoreResult<Revision>;

    /// Returns the id of the newest event, `0` for an empty log.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be read.
    fn last_event_id(&self) -> CoreResult<EventId>;

    /// Subscribes to events appended from now on.
    fn event_updates(&self) -> Receiver<Event>;
}

#[derive(Default)]
struct LogIndex {
    events: BTreeMap<EventId, Event>,
    by_aggregate: HashMap<AggId, Vec<EventId>>,
    last_event_id: EventId,
}

impl LogIndex {
    fn current_revision(&self, agg_id: &str) -> Revision {
        self.by_aggregate
            .get(agg_id)
            .and_then(|ids| ids.last())
            .and_then(|id| self.events.get(id))
            .map_or(0, |event| event.revision)
    }

    fn insert(&mut self, event: Event) {
        self.last_event_id = self.last_event_id.max(event.event_id);
        self.by_aggregate
            .entry(event.agg_id.clone())
            .or_default()
            .push(event.event_id);
        self.events.insert(event.event_id, event);
    }
}

/// The standard [`EventStore`]: events persisted one record per event in a
/// [`RecordStore`], with an in-memory index.
///
/// ```rust
/// use notesync_core::{Event, EventLog, EventStore, NoteEvent};
///
/// let log = EventLog::in_memory();
/// let stored = log.append(Event::new("note-1", 1, NoteEvent::Deleted)).unwrap();
/// assert_eq!(stored.event_id, 1);
/// assert_eq!(log.current_revision("note-1").unwrap(), 1);
/// ```
pub struct EventLog {
    records: Box<dyn RecordStore>,
    serializer: Box<dyn EventSerializer>,
    index: RwLock<LogIndex>,
    updates: ChangeFeed<Event>,
}

impl EventLog {
    /// Creates an empty log that lives in memory.
    pub fn in_memory() -> Self {
        Self {
            records: Box::new(InMemoryRecordStore::new()),
            serializer: Box::new(CborEventSerializer),
            index: RwLock::new(LogIndex::default()),
            updates: ChangeFeed::new(),
        }
    }

    /// Opens a log over existing records, loading and validating them.
    ///
    /// # Errors
    ///
    /// Returns an error if a record cannot be read or decoded, or if the
    /// stored revisions of an aggregate have gaps.
    pub fn open(
        records: Box<dyn RecordStore>,
        serializer: Box<dyn EventSerializer>,
    ) -> CoreResult<Self> {
        let mut index = LogIndex::default();
        for key in records.keys()? {
            let Some(bytes) = records.get(key)? else {
                continue;
            };
            let event = serializer.deserialize(&bytes)?;
            if event.event_id != key {
                return Err(StorageError::Corrupted(format!(
                    "record {key} holds event {}",
                    event.event_id
                ))
                .into());
            }
            let expected = index.current_revision(&event.agg_id) + 1;
            if event.revision != expected {
                return Err(StorageError::Corrupted(format!(
                    "event {} of {} has revision {}, expected {expected}",
                    event.event_id, event.agg_id, event.revision
                ))
                .into());
            }
            index.insert(event);
        }

        debug!(events = index.events.len(), "opened event log");

        Ok(Self {
            records,
            serializer,
            index: RwLock::new(index),
            updates: ChangeFeed::new(),
        })
    }

    /// Returns the number of stored events.
    pub fn len(&self) -> usize {
        self.index.read().events.len()
    }

    /// Returns true if the log holds no events.
    pub fn is_empty(&self) -> bool {
        self.index.read().events.is_empty()
    }
}

impl EventStore for EventLog {
    fn append(&self, mut event: Event) -> CoreResult<Event> {
        let mut index = self.index.write();

        let current = index.current_revision(&event.agg_id);
        if event.revision != current + 1 {
            return Err(CoreError::AppendRejected {
                agg_id: event.agg_id,
                current,
                revision: event.revision,
            });
        }

        event.event_id = index.last_event_id + 1;
        let bytes = self.serializer.serialize(&event)?;
        self.records.put(event.event_id, &bytes)?;
        index.insert(event.clone());

        debug!(
            event_id = event.event_id,
            agg_id = %event.agg_id,
            revision = event.revision,
            kind = event.payload.name(),
            "appended event"
        );

        self.updates.emit(event.clone());
        Ok(event)
    }

    fn events_of_aggregate(
        &self,
        agg_id: &str,
        after_revision: Option<Revision>,
    ) -> CoreResult<Vec<Event>> {
        let index = self.index.read();
        let after = after_revision.unwrap_or(0);
        Ok(index
            .by_aggregate
            .get(agg_id)
            .into_iter()
            .flatten()
            .filter_map(|id| index.events.get(id))
            .filter(|event| event.revision > after)
            .cloned()
            .collect())
    }

    fn all_events(&self, after_event_id: Option<EventId>) -> CoreResult<Vec<Event>> {
        let index = self.index.read();
        let start = after_event_id.unwrap_or(0).saturating_add(1);
        Ok(index.events.range(start..).map(|(_, e)| e.clone()).collect())
    }

    fn current_revision(&self, agg_id: &str) -> CoreResult<Revision> {
        Ok(self.index.read().current_revision(agg_id))
    }

    fn last_event_id(&self) -> CoreResult<EventId> {
        Ok(self.index.read().last_event_id)
    }

    fn event_updates(&self) -> Receiver<Event> {
        self.updates.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NoteEvent;
    use crate::path::Path;
    use notesync_storage::DirectoryRecordStore;
    use tempfile::tempdir;

    fn created(agg_id: &str) -> Event {
        Event::new(
            agg_id,
            1,
            NoteEvent::Created {
                path: Path::root(),
                title: "T".into(),
                content: String::new(),
            },
        )
    }

    fn retitled(agg_id: &str, revision: Revision, title: &str) -> Event {
        Event::new(agg_id, revision, NoteEvent::TitleChanged { title: title.into() })
    }

    #[test]
    fn append_assigns_sequential_ids() {
        let log = EventLog::in_memory();
        let first = log.append(created("a")).unwrap();
        let second = log.append(created("b")).unwrap();
        let third = log.append(retitled("a", 2, "x")).unwrap();

        assert_eq!((first.event_id, second.event_id, third.event_id), (1, 2, 3));
        assert_eq!(log.last_event_id().unwrap(), 3);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn append_rejects_revision_gap() {
        let log = EventLog::in_memory();
        log.append(created("a")).unwrap();

        let result = log.append(retitled("a", 3, "x"));
        assert!(matches!(
            result,
            Err(CoreError::AppendRejected {
                current: 1,
                revision: 3,
                ..
            })
        ));

        let result = log.append(retitled("unknown", 2, "x"));
        assert!(matches!(result, Err(CoreError::AppendRejected { current: 0, .. })));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn events_of_aggregate_after_revision() {
        let log = EventLog::in_memory();
        log.append(created("a")).unwrap();
        log.append(created("b")).unwrap();
        log.append(retitled("a", 2, "x")).unwrap();
        log.append(retitled("a", 3, "y")).unwrap();

        let all = log.events_of_aggregate("a", None).unwrap();
        assert_eq!(all.iter().map(|e| e.revision).collect::<Vec<_>>(), vec![1, 2, 3]);

        let tail = log.events_of_aggregate("a", Some(1)).unwrap();
        assert_eq!(tail.iter().map(|e| e.revision).collect::<Vec<_>>(), vec![2, 3]);

        assert!(log.events_of_aggregate("missing", None).unwrap().is_empty());
    }

    #[test]
    fn all_events_after_id() {
        let log = EventLog::in_memory();
        log.append(created("a")).unwrap();
        log.append(created("b")).unwrap();
        log.append(created("c")).unwrap();

        let ids: Vec<_> = log.all_events(Some(1)).unwrap().iter().map(|e| e.event_id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(log.all_events(None).unwrap().len(), 3);
    }

    #[test]
    fn updates_in_append_order() {
        let log = EventLog::in_memory();
        let rx = log.event_updates();

        log.append(created("a")).unwrap();
        log.append(retitled("a", 2, "x")).unwrap();

        let ids: Vec<_> = rx.try_iter().map(|e| e.event_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn reopen_from_directory() {
        let dir = tempdir().unwrap();
        {
            let records = DirectoryRecordStore::open(dir.path()).unwrap();
            let log = EventLog::open(Box::new(records), Box::new(CborEventSerializer)).unwrap();
            log.append(created("a")).unwrap();
            log.append(retitled("a", 2, "x")).unwrap();
        }

        let records = DirectoryRecordStore::open(dir.path()).unwrap();
        let log = EventLog::open(Box::new(records), Box::new(CborEventSerializer)).unwrap();
        assert_eq!(log.current_revision("a").unwrap(), 2);

        let next = log.append(retitled("a", 3, "y")).unwrap();
        assert_eq!(next.event_id, 3);
    }

    #[test]
    fn open_detects_revision_gap() {
        let records = InMemoryRecordStore::new();
        let serializer = CborEventSerializer;
        let broken = retitled("a", 2, "x").with_event_id(1);
        records.put(1, &serializer.serialize(&broken).unwrap()).unwrap();

        let result = EventLog::open(Box::new(records), Box::new(serializer));
        assert!(matches!(result, Err(CoreError::Storage(StorageError::Corrupted(_)))));
    }
}
