//! Strategies that decide what to do with diverging histories.
//!
//! A [`SynchronizationStrategy`] sees the pending events of one aggregate
//! on both sides and either proposes [`CompensatingAction`]s or gives up.
//! [`MergingSynchronizationStrategy`] turns the events into base, local
//! and remote projections and hands them to a [`MergeStrategy`].

mod composite;
mod manual;
mod merging;
mod no_conflict;

pub use composite::CompositeStrategy;
pub use manual::{ConflictData, IdGenerator, ManualMergeStrategy, ResolutionChoice};
pub use merging::MergingSynchronizationStrategy;
pub use no_conflict::NoConflictStrategy;

use crate::error::SyncResult;
use notesync_core::{Aggregate, Event};

/// One unit of work proposed by a strategy.
///
/// The compensated events are staging entries the action consumes. They
/// may only be removed once every new event has been confirmed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompensatingAction {
    /// Local staging entries consumed by the action.
    pub compensated_local_events: Vec<Event>,
    /// Remote staging entries consumed by the action.
    pub compensated_remote_events: Vec<Event>,
    /// Events to apply to the local side.
    pub new_local_events: Vec<Event>,
    /// Events to submit to the remote side.
    pub new_remote_events: Vec<Event>,
}

/// Outcome of [`SynchronizationStrategy::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionResult {
    /// The strategy cannot reconcile the histories.
    NoSolution,
    /// Actions that reconcile the histories, in execution order.
    Solution(Vec<CompensatingAction>),
}

/// Reconciles the pending events of one aggregate.
pub trait SynchronizationStrategy: Send + Sync {
    /// Proposes actions for `agg_id` given its pending local and remote
    /// events, each ordered by revision.
    ///
    /// # Errors
    ///
    /// Returns an error if the histories cannot be projected.
    fn resolve(
        &self,
        agg_id: &str,
        local_events: &[Event],
        remote_events: &[Event],
    ) -> SyncResult<ResolutionResult>;

    /// Called when a proposed solution for `agg_id` could not be carried
    /// out. `partially_applied` is true if some of its new events were
    /// already confirmed.
    fn reopen(&self, _agg_id: &str, _partially_applied: bool) {}

    /// Called once every action of a solution for `agg_id` was confirmed.
    fn settled(&self, _agg_id: &str) {}
}

/// Events that reconcile two versions of an aggregate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSolution {
    /// Events to apply to the local side.
    pub new_local_events: Vec<Event>,
    /// Events to submit to the remote side.
    pub new_remote_events: Vec<Event>,
}

/// Outcome of [`MergeStrategy::merge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeResult {
    /// No automatic merge is possible.
    NoSolution,
    /// Events that make both sides equal.
    Solution(MergeSolution),
}

/// Merges the local and remote versions of an aggregate.
pub trait MergeStrategy<A: Aggregate>: Send + Sync {
    /// Merges `local` and `remote`, which both descend from `base`.
    ///
    /// # Errors
    ///
    /// Returns an error if compensating events cannot be derived.
    fn merge(&self, base: &A, local: &A, remote: &A) -> SyncResult<MergeResult>;

    /// See [`SynchronizationStrategy::reopen`].
    fn reopen(&self, _agg_id: &str, _partially_applied: bool) {}

    /// See [`SynchronizationStrategy::settled`].
    fn settled(&self, _agg_id: &str) {}
}
