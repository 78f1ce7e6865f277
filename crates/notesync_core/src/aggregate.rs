//! The aggregate abstraction shared by notes and folders.

use crate::error::{CoreError, CoreResult};
use crate::event::{Event, EventPayload};
use crate::types::{AggregateKind, Existence, Revision};
use std::fmt;

/// An event-sourced entity with a linear revision history.
///
/// Aggregates are immutable values. [`apply`](Aggregate::apply) never
/// mutates `self`; it returns the snapshot that results from the event.
pub trait Aggregate: Clone + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Kind-specific event payload.
    type Event: Clone + fmt::Debug + PartialEq + Send + Sync + 'static;

    /// The kind tag of this aggregate.
    const KIND: AggregateKind;

    /// Returns the unborn aggregate (revision 0) with the given id.
    fn empty(agg_id: &str) -> Self;

    /// Returns the aggregate id.
    fn agg_id(&self) -> &str;

    /// Returns the current revision.
    fn revision(&self) -> Revision;

    /// Returns the existence state.
    fn existence(&self) -> Existence;

    /// Computes the state after `event` without touching the revision.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTransition`] if the event is not allowed
    /// in the current state.
    fn transition(&self, event: &Self::Event) -> CoreResult<Self>;

    /// Returns the same state stamped with `revision`.
    #[must_use]
    fn with_revision(self, revision: Revision) -> Self;

    /// Extracts this kind's payload from an event.
    fn payload(event: &Event) -> Option<&Self::Event>;

    /// Wraps a kind-specific payload.
    fn wrap(event: Self::Event) -> EventPayload;

    /// Applies a stored event.
    ///
    /// # Errors
    ///
    /// Fails if the event belongs to another aggregate, does not follow the
    /// current revision, is of another kind, or is not a valid transition.
    fn apply(&self, event: &Event) -> CoreResult<Self> {
        if event.agg_id != self.agg_id() {
            return Err(CoreError::AggregateMismatch {
                expected: self.agg_id().to_string(),
                actual: event.agg_id.clone(),
            });
        }
        if event.revision != self.revision() + 1 {
            return Err(CoreError::invalid_transition(
                self.agg_id(),
                format!(
                    "event revision {} does not follow revision {}",
                    event.revision,
                    self.revision()
                ),
            ));
        }
        let payload = Self::payload(event).ok_or_else(|| {
            CoreError::invalid_transition(
                self.agg_id(),
                format!("{} is not a {} event", event.payload.name(), Self::KIND),
            )
        })?;
        Ok(self.transition(payload)?.with_revision(event.revision))
    }
}

/// Folds `events` onto `base` in order.
///
/// # Errors
///
/// Returns the first error raised by [`Aggregate::apply`].
pub fn replay<'a, A, I>(base: A, events: I) -> CoreResult<A>
where
    A: Aggregate,
    I: IntoIterator<Item = &'a Event>,
{
    events
        .into_iter()
        .try_fold(base, |aggregate, event| aggregate.apply(event))
}
