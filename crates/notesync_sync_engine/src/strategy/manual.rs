use super::{MergeResult, MergeSolution, MergeStrategy};
use crate::compensator::{DifferenceCompensator, Side};
use crate::difference::{DifferenceAnalyzer, Reconcilable};
use crate::error::{SyncError, SyncResult};
use notesync_core::{AggId, Existence, StateFeed};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Which version a manual resolution keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionChoice {
    /// Keep the local version on both sides.
    Local,
    /// Keep the remote version on both sides.
    Remote,
    /// Keep the remote version, and the local one as a copy under a new id.
    Both,
}

/// The versions of a conflicted aggregate, pinned at specific revisions.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictData<A> {
    /// Conflicted aggregate.
    pub agg_id: AggId,
    /// Common ancestor.
    pub base: A,
    /// Local version.
    pub local: A,
    /// Remote version.
    pub remote: A,
}

/// Produces ids for copies made by [`ResolutionChoice::Both`].
pub type IdGenerator = Arc<dyn Fn() -> AggId + Send + Sync>;

enum Entry<A> {
    Conflicted(ConflictData<A>),
    Resolved {
        inputs: ConflictData<A>,
        solution: MergeSolution,
    },
    Consumed {
        inputs: ConflictData<A>,
        solution: MergeSolution,
    },
}

/// Leaves conflicts to the user.
///
/// Differing versions are recorded and their id is published on the
/// shared conflict set. Once the user picks a [`ResolutionChoice`], the
/// next merge of the same versions returns the resolution; after that the
/// same versions produce no solution and no new conflict, until the
/// synchronizer reports the resolution as carried out and the entry is
/// dropped. Versions that differ from the recorded ones discard any pending
/// resolution and raise the conflict again.
pub struct ManualMergeStrategy<A: Reconcilable> {
    entries: Mutex<HashMap<AggId, Entry<A>>>,
    conflicts: Arc<StateFeed<BTreeSet<AggId>>>,
    id_generator: IdGenerator,
}

impl<A: Reconcilable> ManualMergeStrategy<A> {
    /// Creates a strategy publishing conflicted ids on `conflicts`.
    ///
    /// Copies get ids of the form `<kind>-<uuid>`.
    pub fn new(conflicts: Arc<StateFeed<BTreeSet<AggId>>>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            conflicts,
            id_generator: Arc::new(|| format!("{}-{}", A::KIND, Uuid::new_v4())),
        }
    }

    /// Replaces the id generator used for copies.
    #[must_use]
    pub fn with_id_generator(mut self, id_generator: IdGenerator) -> Self {
        self.id_generator = id_generator;
        self
    }

    /// Returns the shared set of conflicted ids.
    pub fn conflicts(&self) -> &Arc<StateFeed<BTreeSet<AggId>>> {
        &self.conflicts
    }

    /// Returns the versions of a pending conflict.
    pub fn conflict_data(&self, agg_id: &str) -> Option<ConflictData<A>> {
        match self.entries.lock().get(agg_id) {
            Some(Entry::Conflicted(data)) => Some(data.clone()),
            _ => None,
        }
    }

    /// Resolves a pending conflict. The resolution is handed out by the
    /// next merge of the same versions.
    ///
    /// Returns the id of the copy created for [`ResolutionChoice::Both`].
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NoConflict`] if `agg_id` has no pending
    /// conflict, or an error if compensating events cannot be derived.
    pub fn resolve(&self, agg_id: &str, choice: ResolutionChoice) -> SyncResult<Option<AggId>> {
        let mut entries = self.entries.lock();
        let data = match entries.get(agg_id) {
            Some(Entry::Conflicted(data)) => data.clone(),
            _ => return Err(SyncError::NoConflict(agg_id.to_string())),
        };

        let (solution, copy) = self.solve(&data, choice)?;
        entries.insert(
            agg_id.to_string(),
            Entry::Resolved {
                inputs: data,
                solution,
            },
        );
        drop(entries);

        self.unmark(agg_id);
        info!(agg_id, ?choice, copy = ?copy, "conflict resolved");
        Ok(copy)
    }

    fn solve(
        &self,
        data: &ConflictData<A>,
        choice: ResolutionChoice,
    ) -> SyncResult<(MergeSolution, Option<AggId>)> {
        let differences = DifferenceAnalyzer::compare(&data.local, &data.remote);
        match choice {
            ResolutionChoice::Local => {
                let events =
                    DifferenceCompensator::compensate::<A>(&data.agg_id, &differences, Side::Left)?;
                let solution = MergeSolution {
                    new_local_events: Vec::new(),
                    new_remote_events: events.right_events,
                };
                Ok((solution, None))
            }
            ResolutionChoice::Remote => {
                let events =
                    DifferenceCompensator::compensate::<A>(&data.agg_id, &differences, Side::Right)?;
                let solution = MergeSolution {
                    new_local_events: events.left_events,
                    new_remote_events: Vec::new(),
                };
                Ok((solution, None))
            }
            ResolutionChoice::Both => {
                let local_exists = data.local.existence() == Existence::Exists;
                let remote_exists = data.remote.existence() == Existence::Exists;
                if !A::DUPLICABLE || !local_exists || !remote_exists {
                    let keep = if local_exists && !remote_exists {
                        ResolutionChoice::Local
                    } else {
                        ResolutionChoice::Remote
                    };
                    return self.solve(data, keep);
                }

                let (mut solution, _) = self.solve(data, ResolutionChoice::Remote)?;
                let copy_id = (self.id_generator)();
                let copy = DifferenceCompensator::compensate::<A>(
                    &copy_id,
                    &DifferenceAnalyzer::compare(&A::empty(&copy_id), &data.local),
                    Side::Right,
                )?
                .left_events;
                solution.new_local_events.extend(copy.iter().cloned());
                solution.new_remote_events.extend(copy);
                Ok((solution, Some(copy_id)))
            }
        }
    }

    fn mark(&self, agg_id: &str) {
        self.conflicts.update(|ids| {
            let mut next = ids.clone();
            next.insert(agg_id.to_string());
            next
        });
    }

    fn unmark(&self, agg_id: &str) {
        self.conflicts.update(|ids| {
            let mut next = ids.clone();
            next.remove(agg_id);
            next
        });
    }
}

impl<A: Reconcilable> MergeStrategy<A> for ManualMergeStrategy<A> {
    fn merge(&self, base: &A, local: &A, remote: &A) -> SyncResult<MergeResult> {
        let agg_id = local.agg_id().to_string();
        let mut entries = self.entries.lock();

        if DifferenceAnalyzer::compare(local, remote).is_empty() {
            if entries.remove(&agg_id).is_some() {
                drop(entries);
                self.unmark(&agg_id);
            }
            return Ok(MergeResult::Solution(MergeSolution::default()));
        }

        let inputs = ConflictData {
            agg_id: agg_id.clone(),
            base: base.clone(),
            local: local.clone(),
            remote: remote.clone(),
        };

        match entries.remove(&agg_id) {
            Some(Entry::Resolved {
                inputs: stored,
                solution,
            }) if stored == inputs => {
                debug!(agg_id = %agg_id, "handing out resolution");
                entries.insert(
                    agg_id,
                    Entry::Consumed {
                        inputs,
                        solution: solution.clone(),
                    },
                );
                Ok(MergeResult::Solution(solution))
            }
            Some(Entry::Consumed {
                inputs: stored,
                solution,
            }) if stored == inputs => {
                entries.insert(agg_id, Entry::Consumed { inputs, solution });
                Ok(MergeResult::NoSolution)
            }
            Some(Entry::Conflicted(stored)) if stored == inputs => {
                entries.insert(agg_id, Entry::Conflicted(inputs));
                Ok(MergeResult::NoSolution)
            }
            _ => {
                debug!(agg_id = %agg_id, "conflict raised");
                entries.insert(agg_id.clone(), Entry::Conflicted(inputs));
                drop(entries);
                self.mark(&agg_id);
                Ok(MergeResult::NoSolution)
            }
        }
    }

    fn reopen(&self, agg_id: &str, partially_applied: bool) {
        let mut entries = self.entries.lock();
        match entries.remove(agg_id) {
            Some(Entry::Consumed { inputs, solution }) if !partially_applied => {
                debug!(agg_id, "resolution will be handed out again");
                entries.insert(agg_id.to_string(), Entry::Resolved { inputs, solution });
            }
            Some(Entry::Consumed { inputs, .. }) => {
                entries.insert(agg_id.to_string(), Entry::Conflicted(inputs));
                drop(entries);
                self.mark(agg_id);
                info!(agg_id, "resolution was only partly applied, conflict raised again");
            }
            Some(other) => {
                entries.insert(agg_id.to_string(), other);
            }
            None => {}
        }
    }

    fn settled(&self, agg_id: &str) {
        let mut entries = self.entries.lock();
        if matches!(entries.get(agg_id), Some(Entry::Consumed { .. })) {
            entries.remove(agg_id);
            debug!(agg_id, "resolution carried out, entry dropped");
        }
    }
}
