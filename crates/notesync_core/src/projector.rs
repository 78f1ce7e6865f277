//! Reconstructs aggregate state by replay.

use crate::aggregate::Aggregate;
use crate::cache::SnapshotCache;
use crate::error::{CoreError, CoreResult};
use crate::event_store::EventStore;
use crate::types::Revision;
use std::sync::Arc;

/// Projects aggregates of kind `A` from an event store.
///
/// A projection starts from the nearest cached snapshot at or below the
/// requested revision and replays the remaining events from the store.
pub struct Projector<A: Aggregate> {
    store: Arc<dyn EventStore>,
    cache: Arc<dyn SnapshotCache<A>>,
}

impl<A: Aggregate> Clone for Projector<A> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<A: Aggregate> Projector<A> {
    /// Creates a projector.
    pub fn new(store: Arc<dyn EventStore>, cache: Arc<dyn SnapshotCache<A>>) -> Self {
        Self { store, cache }
    }

    /// Returns the state of `agg_id` at `at_revision`, or at its latest
    /// revision when `None`. Unknown aggregates project to
    /// [`Aggregate::empty`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RevisionNotFound`] if the log ends before
    /// `at_revision`, or any replay error.
    pub fn project(&self, agg_id: &str, at_revision: Option<Revision>) -> CoreResult<A> {
        let mut state = self
            .cache
            .get_latest(agg_id, at_revision)
            .unwrap_or_else(|| A::empty(agg_id));

        let tail = self
            .store
            .events_of_aggregate(agg_id, Some(state.revision()))?;
        for event in &tail {
            if at_revision.is_some_and(|target| event.revision > target) {
                break;
            }
            state = state.apply(event)?;
        }

        if let Some(target) = at_revision {
            if state.revision() != target {
                return Err(CoreError::RevisionNotFound {
                    agg_id: agg_id.to_string(),
                    revision: target,
                    latest: state.revision(),
                });
            }
        }

        if !tail.is_empty() {
            self.cache.put(state.clone());
        }
        Ok(state)
    }

    /// Returns the cache shared with this projector.
    pub fn cache(&self) -> &Arc<dyn SnapshotCache<A>> {
        &self.cache
    }
}
