//! Loopback harness: several replicas against one in-process server.

use notesync_core::{AggregateKind, Event, Note};
use notesync_sync_engine::{
    ClientStores, DifferenceAnalyzer, ResolutionChoice, RpcTransport, SyncClient, SyncConfig,
    SyncPassReport,
};
use notesync_sync_server::{CommandServer, ServerConfig};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Transport connecting a replica to the harness server.
pub type LoopbackTransport = RpcTransport<Arc<CommandServer>>;

/// Passes per replica in [`LoopbackHarness::settle`]. An edit needs one
/// pass out and one pass in; the third drops the echoes.
pub const SETTLE_ROUNDS: usize = 3;

/// Replicas sharing one server.
pub struct LoopbackHarness {
    /// The shared server.
    pub server: Arc<CommandServer>,
    replicas: Vec<SyncClient>,
    transports: Vec<Arc<LoopbackTransport>>,
}

impl LoopbackHarness {
    /// Creates `count` in-memory replicas.
    ///
    /// Copies made by [`ResolutionChoice::Both`] are named `copy-<replica>-<n>`.
    pub fn new(count: usize) -> Self {
        let server = Arc::new(CommandServer::new(ServerConfig::default()));
        let mut replicas = Vec::with_capacity(count);
        let mut transports = Vec::with_capacity(count);

        for index in 0..count {
            let transport = Arc::new(RpcTransport::new(Arc::clone(&server)));
            let counter = Arc::new(AtomicUsize::new(0));
            let client = SyncClient::builder(
                ClientStores::in_memory(),
                transport.clone(),
                transport.clone(),
            )
            .with_config(SyncConfig::default().with_import_batch_size(4))
            .with_id_generator(Arc::new(move || {
                format!("copy-{index}-{}", counter.fetch_add(1, Ordering::SeqCst))
            }))
            .assemble()
            .expect("Failed to assemble replica");

            replicas.push(client);
            transports.push(transport);
        }

        Self {
            server,
            replicas,
            transports,
        }
    }

    /// Returns a replica.
    pub fn replica(&self, index: usize) -> &SyncClient {
        &self.replicas[index]
    }

    /// Returns the transport of a replica.
    pub fn transport(&self, index: usize) -> &LoopbackTransport {
        &self.transports[index]
    }

    /// Runs one pass on a replica.
    pub fn sync(&self, index: usize) -> SyncPassReport {
        self.replicas[index]
            .sync_once()
            .expect("Synchronization pass failed")
    }

    /// Resolves every pending conflict of a replica with `choice`.
    /// Returns the ids of copies made.
    pub fn resolve_all(&self, index: usize, choice: ResolutionChoice) -> Vec<String> {
        let replica = &self.replicas[index];
        let mut copies = Vec::new();
        for agg_id in replica.conflicts() {
            if let Some(copy) = replica
                .resolve(&agg_id, choice)
                .expect("Failed to resolve conflict")
            {
                copies.push(copy);
            }
        }
        copies
    }

    /// Runs passes on every replica, in order, until nothing is in flight.
    ///
    /// # Panics
    ///
    /// Panics if a staging log is not empty afterwards.
    pub fn settle(&self) {
        for _ in 0..SETTLE_ROUNDS {
            for index in 0..self.replicas.len() {
                self.sync(index);
            }
        }
        for (index, replica) in self.replicas.iter().enumerate() {
            let outbound = replica.outbound().events().expect("Failed to read outbound");
            let inbound = replica.inbound().events().expect("Failed to read inbound");
            assert!(
                outbound.is_empty() && inbound.is_empty(),
                "replica {index} still has staged events: {outbound:?} {inbound:?}"
            );
        }
    }

    /// Returns the note ids known to a replica.
    pub fn note_ids(&self, index: usize) -> BTreeSet<String> {
        let events: Vec<Event> = self.replicas[index]
            .processor()
            .store()
            .all_events(None)
            .expect("Failed to read events");
        events
            .into_iter()
            .filter(|event| event.kind() == AggregateKind::Note)
            .map(|event| event.agg_id)
            .collect()
    }

    /// Projects a note on a replica.
    pub fn note(&self, index: usize, agg_id: &str) -> Note {
        self.replicas[index]
            .note(agg_id)
            .expect("Failed to project note")
    }

    /// Asserts that every replica holds the same notes as the server.
    ///
    /// Notes are compared by content, not by revision: the sides number
    /// their revisions independently.
    ///
    /// # Panics
    ///
    /// Panics on the first difference.
    pub fn assert_converged(&self) {
        let server = self.server.processor();
        let expected: BTreeSet<String> = self
            .server
            .store()
            .all_events(None)
            .expect("Failed to read server events")
            .into_iter()
            .filter(|event| event.kind() == AggregateKind::Note)
            .map(|event| event.agg_id)
            .collect();

        for index in 0..self.replicas.len() {
            assert_eq!(self.note_ids(index), expected, "replica {index} note ids");
            for agg_id in &expected {
                let remote = server.note(agg_id).expect("Failed to project server note");
                let local = self.note(index, agg_id);
                let differences = DifferenceAnalyzer::compare(&local, &remote);
                assert!(
                    differences.is_empty(),
                    "replica {index} differs on {agg_id}: {differences:?}"
                );
            }
            assert!(
                self.replicas[index].conflicts().is_empty(),
                "replica {index} has open conflicts"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::create_note_command;

    #[test]
    fn single_edit_converges() {
        let harness = LoopbackHarness::new(3);
        harness
            .replica(1)
            .execute(&create_note_command("note-1", "T"))
            .unwrap();
        harness.settle();
        harness.assert_converged();
        assert_eq!(harness.note(2, "note-1").title(), "T");
    }

    #[test]
    fn note_ids_ignore_folders() {
        let harness = LoopbackHarness::new(1);
        harness
            .replica(0)
            .execute(&notesync_core::Command::create_folder(
                notesync_core::Path::new(["work"]).unwrap(),
            ))
            .unwrap();
        assert!(harness.note_ids(0).is_empty());
    }
}
