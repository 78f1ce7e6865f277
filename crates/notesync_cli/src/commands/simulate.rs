//! Simulate command implementation.
//!
//! Two replicas share an in-process server. Both edit the same note while
//! apart, the second one hits the conflict and resolves it with the chosen
//! option, then both synchronize until nothing is pending.

use crate::Choice;
use notesync_core::{AggregateKind, Command, CommandPayload, Path};
use notesync_sync_engine::{ClientStores, ResolutionChoice, RpcTransport, SyncClient};
use notesync_sync_server::{CommandServer, ServerConfig};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

const NOTE_ID: &str = "note-groceries";
const ROUNDS: usize = 3;

/// Projection of one note for output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteInfo {
    /// Aggregate id.
    pub agg_id: String,
    /// Title.
    pub title: String,
    /// Content.
    pub content: String,
}

/// The notes of one replica.
#[derive(Debug, Serialize)]
pub struct ReplicaInfo {
    /// Replica name.
    pub name: &'static str,
    /// Notes, ordered by id.
    pub notes: Vec<NoteInfo>,
}

/// Outcome of a simulation.
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    /// Applied resolution.
    pub choice: &'static str,
    /// Aggregates that were reported as conflicting.
    pub conflicts: BTreeSet<String>,
    /// Copy kept by the `both` resolution.
    pub copy: Option<String>,
    /// Events in the server log.
    pub server_events: usize,
    /// Final state of each replica.
    pub replicas: Vec<ReplicaInfo>,
    /// Whether both replicas ended with the same notes.
    pub converged: bool,
}

/// Runs the simulate command.
pub fn run(choice: Choice, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let report = simulate(choice)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_text_output(&report),
    }
    Ok(())
}

fn resolution(choice: Choice) -> (ResolutionChoice, &'static str) {
    match choice {
        Choice::Local => (ResolutionChoice::Local, "local"),
        Choice::Remote => (ResolutionChoice::Remote, "remote"),
        Choice::Both => (ResolutionChoice::Both, "both"),
    }
}

/// Runs the scenario and reports the final state.
pub fn simulate(choice: Choice) -> Result<SimulationReport, Box<dyn std::error::Error>> {
    let (choice, name) = resolution(choice);
    let server = Arc::new(CommandServer::new(ServerConfig::default()));
    let alice = replica(&server)?;
    let bob = replica(&server)?;

    alice.execute(&Command::create_note(NOTE_ID, Path::root(), "Groceries", "milk"))?;
    settle(&[&alice, &bob])?;

    alice.execute(&retitle("Groceries for the weekend"))?;
    bob.execute(&Command::new(
        NOTE_ID,
        None,
        CommandPayload::ChangeContent {
            content: "milk, eggs".into(),
        },
    ))?;
    alice.sync_once()?;
    let report = bob.sync_once()?;
    info!(conflicting = report.conflicting.len(), "edits met");

    let mut copy = None;
    for agg_id in &report.conflicting {
        let created = bob.resolve(agg_id, choice)?;
        copy = copy.or(created);
    }
    settle(&[&alice, &bob])?;

    let replicas = vec![
        ReplicaInfo {
            name: "alice",
            notes: notes(&alice)?,
        },
        ReplicaInfo {
            name: "bob",
            notes: notes(&bob)?,
        },
    ];
    let converged = replicas[0].notes == replicas[1].notes;

    Ok(SimulationReport {
        choice: name,
        conflicts: report.conflicting,
        copy,
        server_events: server.event_count(),
        replicas,
        converged,
    })
}

fn replica(server: &Arc<CommandServer>) -> Result<SyncClient, Box<dyn std::error::Error>> {
    let transport = Arc::new(RpcTransport::new(Arc::clone(server)));
    Ok(SyncClient::builder(ClientStores::in_memory(), transport.clone(), transport).assemble()?)
}

fn retitle(title: &str) -> Command {
    Command::new(
        NOTE_ID,
        None,
        CommandPayload::ChangeTitle {
            title: title.into(),
        },
    )
}

fn settle(replicas: &[&SyncClient]) -> Result<(), Box<dyn std::error::Error>> {
    for _ in 0..ROUNDS {
        for replica in replicas {
            replica.sync_once()?;
        }
    }
    Ok(())
}

fn notes(replica: &SyncClient) -> Result<Vec<NoteInfo>, Box<dyn std::error::Error>> {
    let ids: BTreeSet<String> = replica
        .processor()
        .store()
        .all_events(None)?
        .into_iter()
        .filter(|event| event.kind() == AggregateKind::Note)
        .map(|event| event.agg_id)
        .collect();

    let mut notes = Vec::with_capacity(ids.len());
    for agg_id in ids {
        let note = replica.note(&agg_id)?;
        notes.push(NoteInfo {
            agg_id,
            title: note.title().to_string(),
            content: note.content().to_string(),
        });
    }
    Ok(notes)
}

fn print_text_output(report: &SimulationReport) {
    println!("Simulation ({} resolution)", report.choice);
    println!("=========================");
    println!("Conflicts:     {:?}", report.conflicts);
    if let Some(copy) = &report.copy {
        println!("Copy:          {copy}");
    }
    println!("Server events: {}", report.server_events);
    println!("Converged:     {}", report.converged);

    for replica in &report.replicas {
        println!();
        println!("{}:", replica.name);
        for note in &replica.notes {
            println!("  {:<44} {:?} / {:?}", note.agg_id, note.title, note.content);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_resolution_converges() {
        let report = simulate(Choice::Local).unwrap();
        assert!(report.converged);
        assert_eq!(report.conflicts, BTreeSet::from([NOTE_ID.to_string()]));

        let notes = &report.replicas[0].notes;
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "Groceries");
        assert_eq!(notes[0].content, "milk, eggs");
    }

    #[test]
    fn remote_resolution_converges() {
        let report = simulate(Choice::Remote).unwrap();
        assert!(report.converged);

        let notes = &report.replicas[1].notes;
        assert_eq!(notes[0].title, "Groceries for the weekend");
        assert_eq!(notes[0].content, "milk");
    }

    #[test]
    fn both_resolution_keeps_a_copy() {
        let report = simulate(Choice::Both).unwrap();
        assert!(report.converged);

        let copy = report.copy.unwrap();
        let notes = &report.replicas[0].notes;
        assert_eq!(notes.len(), 2);
        let kept = notes.iter().find(|note| note.agg_id == copy).unwrap();
        assert_eq!(kept.content, "milk, eggs");
        assert_eq!(kept.title, "Groceries");
    }
}
