use super::{CompensatingAction, ResolutionResult, SynchronizationStrategy};
use crate::error::SyncResult;
use notesync_core::Event;

/// Handles aggregates with pending events on one side only.
///
/// Those events are mirrored to the other side unchanged. Aggregates with
/// pending events on both sides get no solution.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoConflictStrategy;

impl SynchronizationStrategy for NoConflictStrategy {
    fn resolve(
        &self,
        _agg_id: &str,
        local_events: &[Event],
        remote_events: &[Event],
    ) -> SyncResult<ResolutionResult> {
        let action = match (local_events.is_empty(), remote_events.is_empty()) {
            (true, true) => CompensatingAction::default(),
            (false, true) => CompensatingAction {
                compensated_local_events: local_events.to_vec(),
                new_remote_events: local_events.to_vec(),
                ..CompensatingAction::default()
            },
            (true, false) => CompensatingAction {
                compensated_remote_events: remote_events.to_vec(),
                new_local_events: remote_events.to_vec(),
                ..CompensatingAction::default()
            },
            (false, false) => return Ok(ResolutionResult::NoSolution),
        };
        Ok(ResolutionResult::Solution(vec![action]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notesync_core::NoteEvent;

    fn event(event_id: u64, revision: u64) -> Event {
        Event::new("note-1", revision, NoteEvent::TitleChanged { title: "t".into() })
            .with_event_id(event_id)
    }

    #[test]
    fn local_only_is_mirrored_remotely() {
        let local = vec![event(1, 1), event(2, 2)];
        let result = NoConflictStrategy.resolve("note-1", &local, &[]).unwrap();
        assert_eq!(
            result,
            ResolutionResult::Solution(vec![CompensatingAction {
                compensated_local_events: local.clone(),
                compensated_remote_events: vec![],
                new_local_events: vec![],
                new_remote_events: local,
            }])
        );
    }

    #[test]
    fn remote_only_is_mirrored_locally() {
        let remote = vec![event(5, 1)];
        let result = NoConflictStrategy.resolve("note-1", &[], &remote).unwrap();
        assert_eq!(
            result,
            ResolutionResult::Solution(vec![CompensatingAction {
                compensated_local_events: vec![],
                compensated_remote_events: remote.clone(),
                new_local_events: remote,
                new_remote_events: vec![],
            }])
        );
    }

    #[test]
    fn nothing_pending_is_an_empty_action() {
        let result = NoConflictStrategy.resolve("note-1", &[], &[]).unwrap();
        assert_eq!(
            result,
            ResolutionResult::Solution(vec![CompensatingAction::default()])
        );
    }

    #[test]
    fn both_sides_pending_has_no_solution() {
        let result = NoConflictStrategy
            .resolve("note-1", &[event(1, 2)], &[event(9, 2)])
            .unwrap();
        assert_eq!(result, ResolutionResult::NoSolution);
    }
}
