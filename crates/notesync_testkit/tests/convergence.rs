//! Loopback convergence tests: replicas editing through one server.

use notesync_core::{Command, CommandPayload, Note, Path};
use notesync_sync_engine::{DifferenceAnalyzer, ResolutionChoice};
use notesync_testkit::prelude::*;
use proptest::prelude::*;

const NOTE: &str = "note-1";

fn same(left: &Note, right: &Note) -> bool {
    DifferenceAnalyzer::compare(left, right).is_empty()
}

fn shared_note(replicas: usize) -> LoopbackHarness {
    let harness = LoopbackHarness::new(replicas);
    harness
        .replica(0)
        .execute(&Command::create_note(NOTE, Path::root(), "T", "body"))
        .unwrap();
    harness.settle();
    harness
}

fn choice_strategy() -> impl Strategy<Value = ResolutionChoice> {
    prop_oneof![
        Just(ResolutionChoice::Local),
        Just(ResolutionChoice::Remote),
        Just(ResolutionChoice::Both),
    ]
}

#[test]
fn three_replicas_converge_on_independent_notes() {
    let harness = LoopbackHarness::new(3);
    for index in 0..3 {
        harness
            .replica(index)
            .execute(&create_note_command(&format!("note-{index}"), "T"))
            .unwrap();
    }
    harness.settle();
    harness.assert_converged();
    assert_eq!(harness.server.event_count(), 3);
}

#[test]
fn concurrent_deletion_and_edit() {
    let harness = shared_note(2);
    harness
        .replica(0)
        .execute(&Command::new(NOTE, None, CommandPayload::DeleteNote))
        .unwrap();
    harness
        .replica(1)
        .execute(&Command::new(
            NOTE,
            None,
            CommandPayload::ChangeContent {
                content: "kept".into(),
            },
        ))
        .unwrap();

    harness.sync(0);
    let report = harness.sync(1);
    assert!(report.conflicting.contains(NOTE));

    // a live and a deleted version: "both" keeps the live one only
    let copies = harness.resolve_all(1, ResolutionChoice::Both);
    assert!(copies.is_empty());
    harness.settle();
    harness.assert_converged();
    assert_eq!(harness.note(0, NOTE).content(), "kept");
}

#[test]
fn resolution_reaches_a_third_replica() {
    let harness = shared_note(3);
    harness
        .replica(0)
        .execute(&Command::new(
            NOTE,
            None,
            CommandPayload::ChangeTitle {
                title: "zero".into(),
            },
        ))
        .unwrap();
    harness
        .replica(1)
        .execute(&Command::new(
            NOTE,
            None,
            CommandPayload::ChangeTitle {
                title: "one".into(),
            },
        ))
        .unwrap();

    harness.sync(0);
    harness.sync(1);
    harness.resolve_all(1, ResolutionChoice::Local);
    harness.settle();

    harness.assert_converged();
    assert_eq!(harness.note(2, NOTE).title(), "one");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_replicas_converge_on_the_chosen_version(
        script_a in edit_script_strategy(NOTE, 4),
        script_b in edit_script_strategy(NOTE, 4),
        choice in choice_strategy(),
    ) {
        let harness = shared_note(2);
        for command in &script_a {
            harness.replica(0).execute(command).unwrap();
        }
        for command in &script_b {
            harness.replica(1).execute(command).unwrap();
        }
        let version_a = harness.note(0, NOTE);
        let version_b = harness.note(1, NOTE);

        harness.sync(0);
        let report = harness.sync(1);
        let copies = harness.resolve_all(1, choice);
        harness.settle();
        harness.assert_converged();

        let result = harness.note(0, NOTE);
        if report.conflicting.is_empty() {
            // at most one side had effective edits
            prop_assert!(same(&result, &version_a) || same(&result, &version_b));
            prop_assert!(copies.is_empty());
        } else {
            match choice {
                ResolutionChoice::Local => prop_assert!(same(&result, &version_b)),
                ResolutionChoice::Remote => prop_assert!(same(&result, &version_a)),
                ResolutionChoice::Both => {
                    prop_assert!(same(&result, &version_a));
                    prop_assert_eq!(copies.len(), 1);
                    let copy = harness.note(1, &copies[0]);
                    prop_assert_eq!(copy.title(), version_b.title());
                    prop_assert_eq!(copy.content(), version_b.content());
                    prop_assert_eq!(copy.attachments(), version_b.attachments());
                    prop_assert_eq!(copy.path(), version_b.path());
                }
            }
        }
        prop_assert_eq!(harness.note_ids(0).len(), 1 + copies.len());
    }
}
