use super::{ResolutionResult, SynchronizationStrategy};
use crate::error::SyncResult;
use notesync_core::Event;
use std::sync::Arc;

/// Tries strategies in order and returns the first solution.
#[derive(Default, Clone)]
pub struct CompositeStrategy {
    strategies: Vec<Arc<dyn SynchronizationStrategy>>,
}

impl CompositeStrategy {
    /// Creates an empty composite, which never finds a solution.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a strategy.
    #[must_use]
    pub fn with(mut self, strategy: Arc<dyn SynchronizationStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Returns the number of strategies.
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Returns true if no strategy was added.
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl SynchronizationStrategy for CompositeStrategy {
    fn resolve(
        &self,
        agg_id: &str,
        local_events: &[Event],
        remote_events: &[Event],
    ) -> SyncResult<ResolutionResult> {
        for strategy in &self.strategies {
            if let ResolutionResult::Solution(actions) =
                strategy.resolve(agg_id, local_events, remote_events)?
            {
                return Ok(ResolutionResult::Solution(actions));
            }
        }
        Ok(ResolutionResult::NoSolution)
    }

    fn reopen(&self, agg_id: &str, partially_applied: bool) {
        for strategy in &self.strategies {
            strategy.reopen(agg_id, partially_applied);
        }
    }

    fn settled(&self, agg_id: &str) {
        for strategy in &self.strategies {
            strategy.settled(agg_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{CompensatingAction, NoConflictStrategy};
    use notesync_core::NoteEvent;

    struct Fixed(ResolutionResult);

    impl SynchronizationStrategy for Fixed {
        fn resolve(&self, _: &str, _: &[Event], _: &[Event]) -> SyncResult<ResolutionResult> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn first_solution_wins() {
        let local = vec![Event::new("note-1", 2, NoteEvent::Deleted).with_event_id(1)];
        let remote = vec![Event::new("note-1", 2, NoteEvent::Undeleted).with_event_id(4)];
        let marker = ResolutionResult::Solution(vec![CompensatingAction {
            new_local_events: remote.clone(),
            ..CompensatingAction::default()
        }]);

        let composite = CompositeStrategy::new()
            .with(Arc::new(NoConflictStrategy))
            .with(Arc::new(Fixed(marker.clone())))
            .with(Arc::new(Fixed(ResolutionResult::Solution(vec![]))));
        assert_eq!(composite.len(), 3);

        assert_eq!(composite.resolve("note-1", &local, &remote).unwrap(), marker);
    }

    #[test]
    fn empty_composite_has_no_solution() {
        let composite = CompositeStrategy::new();
        assert!(composite.is_empty());
        assert_eq!(
            composite.resolve("note-1", &[], &[]).unwrap(),
            ResolutionResult::NoSolution
        );
    }
}
