//! Snapshot cache keyed by `(agg_id, revision)`.

use crate::aggregate::Aggregate;
use crate::config::CacheConfig;
use crate::types::{AggId, Revision};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

/// Side table of aggregate snapshots.
///
/// Only snapshots produced by replaying the log from the empty aggregate
/// may be stored; the projector and the command executor are the writers.
pub trait SnapshotCache<A: Aggregate>: Send + Sync {
    /// Stores a snapshot under its own id and revision.
    fn put(&self, snapshot: A);

    /// Exact lookup.
    fn get(&self, agg_id: &str, revision: Revision) -> Option<A>;

    /// Returns the highest cached revision not above `last_revision`
    /// (unbounded when `None`).
    fn get_latest(&self, agg_id: &str, last_revision: Option<Revision>) -> Option<A>;

    /// Evicts one entry.
    fn remove(&self, agg_id: &str, revision: Revision);
}

/// A cache that stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl<A: Aggregate> SnapshotCache<A> for NoopCache {
    fn put(&self, _snapshot: A) {}

    fn get(&self, _agg_id: &str, _revision: Revision) -> Option<A> {
        None
    }

    fn get_latest(&self, _agg_id: &str, _last_revision: Option<Revision>) -> Option<A> {
        None
    }

    fn remove(&self, _agg_id: &str, _revision: Revision) {}
}

struct Slot<A> {
    snapshot: A,
    last_used: AtomicU64,
}

/// An ordered map per aggregate with floor lookup, bounded per aggregate.
///
/// When an aggregate exceeds
/// [`max_snapshots_per_aggregate`](CacheConfig::max_snapshots_per_aggregate)
/// the least recently used snapshot of that aggregate is evicted. Lookups
/// take a read lock only; recency is tracked with atomics.
pub struct BoundedSnapshotCache<A: Aggregate> {
    config: CacheConfig,
    entries: RwLock<HashMap<AggId, BTreeMap<Revision, Slot<A>>>>,
    clock: AtomicU64,
}

impl<A: Aggregate> BoundedSnapshotCache<A> {
    /// Creates an empty cache.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: RwLock::new(HashMap::new()),
            clock: AtomicU64::new(0),
        }
    }

    /// Returns the number of snapshots cached for an aggregate.
    pub fn len_of(&self, agg_id: &str) -> usize {
        self.entries.read().get(agg_id).map_or(0, BTreeMap::len)
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn touch(&self, slot: &Slot<A>) -> A {
        slot.last_used.store(self.tick(), Ordering::Relaxed);
        slot.snapshot.clone()
    }
}

impl<A: Aggregate> SnapshotCache<A> for BoundedSnapshotCache<A> {
    fn put(&self, snapshot: A) {
        let max = self.config.max_snapshots_per_aggregate;
        if max == 0 || snapshot.revision() == 0 {
            return;
        }

        let stamp = self.tick();
        let mut entries = self.entries.write();
        let revisions = entries.entry(snapshot.agg_id().to_string()).or_default();
        revisions.insert(
            snapshot.revision(),
            Slot {
                snapshot,
                last_used: AtomicU64::new(stamp),
            },
        );

        while revisions.len() > max {
            let oldest = revisions
                .iter()
                .min_by_key(|(_, slot)| slot.last_used.load(Ordering::Relaxed))
                .map(|(revision, _)| *revision);
            match oldest {
                Some(revision) => {
                    revisions.remove(&revision);
                }
                None => break,
            }
        }
    }

    fn get(&self, agg_id: &str, revision: Revision) -> Option<A> {
        let entries = self.entries.read();
        entries
            .get(agg_id)
            .and_then(|revisions| revisions.get(&revision))
            .map(|slot| self.touch(slot))
    }

    fn get_latest(&self, agg_id: &str, last_revision: Option<Revision>) -> Option<A> {
        let entries = self.entries.read();
        let revisions = entries.get(agg_id)?;
        let upper = last_revision.unwrap_or(Revision::MAX);
        revisions
            .range(..=upper)
            .next_back()
            .map(|(_, slot)| self.touch(slot))
    }

    fn remove(&self, agg_id: &str, revision: Revision) {
        let mut entries = self.entries.write();
        if let Some(revisions) = entries.get_mut(agg_id) {
            revisions.remove(&revision);
            if revisions.is_empty() {
                entries.remove(agg_id);
            }
        }
    }
}
