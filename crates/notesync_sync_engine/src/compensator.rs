//! Derives the events that make one version of an aggregate equal another.

use crate::difference::{Difference, Reconcilable};
use crate::error::SyncResult;
use notesync_core::{Event, Revision};
use std::collections::BTreeSet;

/// The side of a comparison whose version should win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The left version wins; the right side is compensated.
    Left,
    /// The right version wins; the left side is compensated.
    Right,
}

/// Events to apply to each side of a comparison.
///
/// Events are unassigned (`event_id == 0`) and numbered from revision 1;
/// consumers turn them into commands against the real logs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompensatingEvents {
    /// Events for the left side.
    pub left_events: Vec<Event>,
    /// Events for the right side.
    pub right_events: Vec<Event>,
}

impl CompensatingEvents {
    /// Returns true if neither side receives events.
    pub fn is_empty(&self) -> bool {
        self.left_events.is_empty() && self.right_events.is_empty()
    }
}

/// Turns differences into compensating events.
#[derive(Debug, Clone, Copy, Default)]
pub struct DifferenceCompensator;

impl DifferenceCompensator {
    /// Returns events that bring the losing side to the `target` version.
    ///
    /// `differences` must come from comparing left with right.
    ///
    /// # Errors
    ///
    /// Returns an error if the differences cannot be expressed as events of
    /// kind `A`.
    pub fn compensate<A: Reconcilable>(
        agg_id: &str,
        differences: &BTreeSet<Difference>,
        target: Side,
    ) -> SyncResult<CompensatingEvents> {
        let mut result = CompensatingEvents::default();
        match target {
            Side::Left => {
                let toward_left: BTreeSet<_> =
                    differences.iter().map(Difference::reversed).collect();
                result.right_events = number::<A>(agg_id, A::compensating_payloads(agg_id, &toward_left)?);
            }
            Side::Right => {
                result.left_events = number::<A>(agg_id, A::compensating_payloads(agg_id, differences)?);
            }
        }
        Ok(result)
    }
}

fn number<A: Reconcilable>(agg_id: &str, payloads: Vec<A::Event>) -> Vec<Event> {
    payloads
        .into_iter()
        .zip(1..)
        .map(|(payload, revision): (_, Revision)| Event::new(agg_id, revision, A::wrap(payload)))
        .collect()
}
