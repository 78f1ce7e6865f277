//! Copies new events into the staging logs.

use crate::error::SyncResult;
use crate::state::{ImportCursor, StateStore};
use crate::transport::EventService;
use notesync_core::{EventStore, ModifiableEventStore};
use notesync_sync_protocol::GetEventsRequest;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Copies events appended to the local log into the outbound staging log.
pub struct LocalEventImporter {
    store: Arc<dyn EventStore>,
    staging: Arc<dyn ModifiableEventStore>,
    cursor: Arc<dyn StateStore<ImportCursor>>,
    batch_size: usize,
}

impl LocalEventImporter {
    /// Creates an importer.
    pub fn new(
        store: Arc<dyn EventStore>,
        staging: Arc<dyn ModifiableEventStore>,
        cursor: Arc<dyn StateStore<ImportCursor>>,
        batch_size: u32,
    ) -> Self {
        Self {
            store,
            staging,
            cursor,
            batch_size: batch_size.max(1) as usize,
        }
    }

    /// Copies every event after the cursor. Returns the number copied.
    ///
    /// # Errors
    ///
    /// Returns an error if the log, the staging log or the cursor fails.
    /// Events copied before the failure stay staged and the cursor keeps
    /// the last completed batch.
    pub fn import(&self) -> SyncResult<usize> {
        let mut cursor = self.cursor.load()?.unwrap_or_default();
        let pending = self.store.all_events(Some(cursor.last_event_id))?;

        let mut copied = 0;
        for batch in pending.chunks(self.batch_size) {
            for event in batch {
                self.staging.add(event.clone())?;
                cursor.last_event_id = event.event_id;
            }
            self.cursor.save(&cursor)?;
            copied += batch.len();
        }

        if copied > 0 {
            debug!(copied, last_event_id = cursor.last_event_id, "imported local events");
        }
        Ok(copied)
    }
}

/// Pulls remote events into the inbound staging log.
pub struct RemoteEventImporter {
    events: Arc<dyn EventService>,
    staging: Arc<dyn ModifiableEventStore>,
    cursor: Arc<dyn StateStore<ImportCursor>>,
    batch_size: u32,
    deadline: Option<Duration>,
}

impl RemoteEventImporter {
    /// Creates an importer.
    pub fn new(
        events: Arc<dyn EventService>,
        staging: Arc<dyn ModifiableEventStore>,
        cursor: Arc<dyn StateStore<ImportCursor>>,
        batch_size: u32,
        deadline: Option<Duration>,
    ) -> Self {
        Self {
            events,
            staging,
            cursor,
            batch_size: batch_size.max(1),
            deadline,
        }
    }

    /// Fetches pages until the remote log is exhausted. Returns the number
    /// of events staged.
    ///
    /// # Errors
    ///
    /// Returns an error if a call, the staging log or the cursor fails.
    /// Pages staged before the failure are kept.
    pub fn import(&self) -> SyncResult<usize> {
        let mut cursor = self.cursor.load()?.unwrap_or_default();
        let mut copied = 0;

        loop {
            let request = GetEventsRequest::new(cursor.last_event_id, self.batch_size);
            let page = self.events.get_events(&request, self.deadline)?;
            let Some(last) = page.last_event_id() else {
                break;
            };

            for event in page.events {
                self.staging.add(event)?;
                copied += 1;
            }
            cursor.last_event_id = last;
            self.cursor.save(&cursor)?;

            if !page.has_more {
                break;
            }
        }

        if copied > 0 {
            debug!(copied, last_event_id = cursor.last_event_id, "imported remote events");
        }
        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryStateStore;
    use crate::transport::MockTransport;
    use notesync_core::{Event, EventLog, NoteEvent, Path, StagingLog};

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

    #[test]
    fn local_import_keeps_ids_and_cursor() {
        let store = Arc::new(EventLog::in_memory());
        let staging = Arc::new(StagingLog::in_memory());
        let cursor: Arc<MemoryStateStore<ImportCursor>> = Arc::new(MemoryStateStore::new());
        let importer = LocalEventImporter::new(store.clone(), staging.clone(), cursor.clone(), 2);

        for agg_id in ["a", "b", "c"] {
            store.append(created(agg_id)).unwrap();
        }
        assert_eq!(importer.import().unwrap(), 3);
        assert_eq!(cursor.load().unwrap(), Some(ImportCursor { last_event_id: 3 }));

        let ids: Vec<_> = staging.events().unwrap().iter().map(|e| e.event_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        // drained events are not copied again
        for event in staging.events().unwrap() {
            staging.remove(&event).unwrap();
        }
        assert_eq!(importer.import().unwrap(), 0);
        assert!(staging.is_empty());
    }

    #[test]
    fn remote_import_pages_through_stream() {
        let transport = Arc::new(MockTransport::new());
        for (id, agg_id) in [(4, "a"), (5, "b"), (9, "c")] {
            transport.push_event(created(agg_id).with_event_id(id));
        }
        let staging = Arc::new(StagingLog::in_memory());
        let cursor: Arc<MemoryStateStore<ImportCursor>> = Arc::new(MemoryStateStore::new());
        let importer = RemoteEventImporter::new(transport.clone(), staging.clone(), cursor.clone(), 2, None);

        assert_eq!(importer.import().unwrap(), 3);
        assert_eq!(cursor.load().unwrap(), Some(ImportCursor { last_event_id: 9 }));
        assert!(staging.contains(9).unwrap());

        transport.push_event(created("d").with_event_id(10));
        assert_eq!(importer.import().unwrap(), 1);
        assert_eq!(staging.len(), 4);
    }
}
