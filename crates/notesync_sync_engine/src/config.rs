//! Configuration for the synchronizer.

use std::time::Duration;

/// Configuration for synchronization passes and importers.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Deadline for every remote call. `None` waits indefinitely.
    pub rpc_deadline: Option<Duration>,
    /// Maximum number of events fetched or copied per importer batch.
    pub import_batch_size: u32,
    /// Whether state changes are written to the state store.
    pub persist_state: bool,
}

impl SyncConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            rpc_deadline: Some(Duration::from_secs(10)),
            import_batch_size: 100,
            persist_state: true,
        }
    }

    /// Sets the remote call deadline.
    pub fn with_rpc_deadline(mut self, deadline: Duration) -> Self {
        self.rpc_deadline = Some(deadline);
        self
    }

    /// Removes the remote call deadline.
    pub fn without_rpc_deadline(mut self) -> Self {
        self.rpc_deadline = None;
        self
    }

    /// Sets the importer batch size. Zero is treated as one.
    pub fn with_import_batch_size(mut self, size: u32) -> Self {
        self.import_batch_size = size.max(1);
        self
    }

    /// Enables or disables state persistence.
    pub fn with_persist_state(mut self, persist: bool) -> Self {
        self.persist_state = persist;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}
