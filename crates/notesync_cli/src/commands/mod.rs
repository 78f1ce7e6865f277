//! CLI command implementations.

pub mod dump_staging;
pub mod show_state;
pub mod simulate;

use crate::CliError;
use notesync_sync_engine::ClientStores;
use std::path::Path;

/// Opens the stores of an existing replica directory.
pub fn open_replica(path: &Path) -> Result<ClientStores, Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(CliError::MissingReplica(path.to_path_buf()).into());
    }
    Ok(ClientStores::open(path)?)
}
