use super::{
    CompensatingAction, MergeResult, MergeStrategy, ResolutionResult, SynchronizationStrategy,
};
use crate::error::SyncResult;
use notesync_core::{replay, Aggregate, Event, Projector};
use std::sync::Arc;
use tracing::debug;

/// Merges diverging histories of one aggregate kind through projections.
///
/// The local log provides the common base, the state just before the first
/// pending local event, and the local version after the last one. The
/// remote version is the base with the pending remote events replayed on
/// top, renumbered to follow the base.
pub struct MergingSynchronizationStrategy<A: Aggregate> {
    projector: Projector<A>,
    merge: Arc<dyn MergeStrategy<A>>,
}

impl<A: Aggregate> MergingSynchronizationStrategy<A> {
    /// Creates a strategy projecting from the local log.
    pub fn new(projector: Projector<A>, merge: Arc<dyn MergeStrategy<A>>) -> Self {
        Self { projector, merge }
    }
}

impl<A: Aggregate> SynchronizationStrategy for MergingSynchronizationStrategy<A> {
    fn resolve(
        &self,
        agg_id: &str,
        local_events: &[Event],
        remote_events: &[Event],
    ) -> SyncResult<ResolutionResult> {
        let handles = |events: &[Event]| events.iter().all(|event| event.kind() == A::KIND);
        if !handles(local_events) || !handles(remote_events) {
            return Ok(ResolutionResult::NoSolution);
        }
        let (Some(first), Some(last)) = (
            local_events.iter().map(|event| event.revision).min(),
            local_events.iter().map(|event| event.revision).max(),
        ) else {
            return Ok(ResolutionResult::NoSolution);
        };
        if remote_events.is_empty() {
            return Ok(ResolutionResult::NoSolution);
        }

        let base = self.projector.project(agg_id, Some(first.saturating_sub(1)))?;
        let local = self.projector.project(agg_id, Some(last))?;

        let mut pending_remote = remote_events.to_vec();
        pending_remote.sort_by_key(|event| event.revision);
        let renumbered: Vec<Event> = pending_remote
            .into_iter()
            .zip(base.revision() + 1..)
            .map(|(event, revision)| event.with_revision(revision))
            .collect();
        let remote = replay(base.clone(), &renumbered)?;

        debug!(
            agg_id,
            base = base.revision(),
            local = local.revision(),
            remote_events = renumbered.len(),
            "merging diverged aggregate"
        );

        match self.merge.merge(&base, &local, &remote)? {
            MergeResult::NoSolution => Ok(ResolutionResult::NoSolution),
            MergeResult::Solution(solution) => {
                Ok(ResolutionResult::Solution(vec![CompensatingAction {
                    compensated_local_events: local_events.to_vec(),
                    compensated_remote_events: remote_events.to_vec(),
                    new_local_events: solution.new_local_events,
                    new_remote_events: solution.new_remote_events,
                }]))
            }
        }
    }

    fn reopen(&self, agg_id: &str, partially_applied: bool) {
        self.merge.reopen(agg_id, partially_applied);
    }

    fn settled(&self, agg_id: &str) {
        self.merge.settled(agg_id);
    }
}
