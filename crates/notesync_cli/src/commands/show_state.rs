//! Show state command implementation.

use super::open_replica;
use notesync_sync_engine::{ImportCursor, SynchronizerState};
use serde::Serialize;
use std::path::Path;

/// Everything the replica persisted about synchronization.
#[derive(Debug, Default, Serialize)]
pub struct StateInfo {
    /// Synchronizer state.
    pub state: SynchronizerState,
    /// Last local event copied into the outbound log.
    pub local_cursor: u64,
    /// Last remote event copied into the inbound log.
    pub remote_cursor: u64,
}

/// Runs the show-state command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let stores = open_replica(path)?;
    let info = StateInfo {
        state: stores.state.load()?.unwrap_or_default(),
        local_cursor: cursor(stores.local_cursor.load()?),
        remote_cursor: cursor(stores.remote_cursor.load()?),
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&info)?),
        _ => print_text_output(&info),
    }
    Ok(())
}

fn cursor(stored: Option<ImportCursor>) -> u64 {
    stored.map_or(0, |cursor| cursor.last_event_id)
}

fn print_text_output(info: &StateInfo) {
    println!("Synchronizer State");
    println!("==================");
    println!("Local import cursor:  {}", info.local_cursor);
    println!("Remote import cursor: {}", info.remote_cursor);
    println!();

    let state = &info.state;
    let ids = state
        .last_known_local_revisions
        .keys()
        .chain(state.last_known_remote_revisions.keys())
        .collect::<std::collections::BTreeSet<_>>();

    if ids.is_empty() {
        println!("No aggregates synchronized yet");
    } else {
        println!("{:<40} {:>6} {:>6} {:>6}", "AGGREGATE", "LOCAL", "REMOTE", "SYNCED");
        for agg_id in ids {
            println!(
                "{:<40} {:>6} {:>6} {:>6}",
                agg_id,
                state.last_known_local(agg_id),
                state.last_known_remote(agg_id),
                state.last_synchronized_local(agg_id)
            );
        }
    }

    println!();
    println!("Ignored local events:  {:?}", state.local_event_ids_to_ignore);
    println!("Ignored remote events: {:?}", state.remote_event_ids_to_ignore);
}

#[cfg(test)]
mod tests {
    use super::*;
    use notesync_sync_engine::ClientStores;
    use tempfile::tempdir;

    #[test]
    fn reads_persisted_state() {
        let dir = tempdir().unwrap();
        {
            let stores = ClientStores::open(dir.path()).unwrap();
            let mut state = SynchronizerState::default();
            state.observe_local("note-1", 2);
            stores.state.save(&state).unwrap();
            stores
                .remote_cursor
                .save(&ImportCursor { last_event_id: 9 })
                .unwrap();
        }

        run(dir.path(), "json").unwrap();

        let stores = open_replica(dir.path()).unwrap();
        assert_eq!(stores.state.load().unwrap().unwrap().last_known_local("note-1"), 2);
        assert_eq!(cursor(stores.remote_cursor.load().unwrap()), 9);
        assert_eq!(cursor(stores.local_cursor.load().unwrap()), 0);
    }
}
