//! Dump staging command implementation.

use super::open_replica;
use crate::StagingSide;
use notesync_core::{Event, ModifiableEventStore};
use serde::Serialize;
use std::path::Path;

/// Staged event representation for output.
#[derive(Debug, Serialize)]
pub struct StagedEventInfo {
    /// Staging log holding the event.
    pub log: &'static str,
    /// Event id in the log it was copied from.
    pub event_id: u64,
    /// Aggregate id.
    pub agg_id: String,
    /// Resulting revision.
    pub revision: u64,
    /// Event name.
    pub event: &'static str,
}

impl StagedEventInfo {
    fn new(log: &'static str, event: &Event) -> Self {
        Self {
            log,
            event_id: event.event_id,
            agg_id: event.agg_id.clone(),
            revision: event.revision,
            event: event.payload.name(),
        }
    }
}

/// Runs the dump-staging command.
pub fn run(path: &Path, side: StagingSide, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let stores = open_replica(path)?;
    let records = collect(
        stores.outbound.as_ref(),
        stores.inbound.as_ref(),
        side,
    )?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        _ => {
            print_text_output(&records);
        }
    }

    Ok(())
}

fn collect(
    outbound: &dyn ModifiableEventStore,
    inbound: &dyn ModifiableEventStore,
    side: StagingSide,
) -> Result<Vec<StagedEventInfo>, Box<dyn std::error::Error>> {
    let mut records = Vec::new();
    if side != StagingSide::Inbound {
        for event in outbound.events()? {
            records.push(StagedEventInfo::new("outbound", &event));
        }
    }
    if side != StagingSide::Outbound {
        for event in inbound.events()? {
            records.push(StagedEventInfo::new("inbound", &event));
        }
    }
    Ok(records)
}

fn print_text_output(records: &[StagedEventInfo]) {
    if records.is_empty() {
        println!("No staged events");
        return;
    }

    println!(
        "{:<9} {:>10} {:>8}  {:<18} AGGREGATE",
        "LOG", "EVENT", "REVISION", "KIND"
    );
    for record in records {
        println!(
            "{:<9} {:>10} {:>8}  {:<18} {}",
            record.log, record.event_id, record.revision, record.event, record.agg_id
        );
    }
    println!();
    println!("{} staged event(s)", records.len());
}
