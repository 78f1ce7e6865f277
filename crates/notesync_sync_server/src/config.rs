//! Server configuration.

/// Configuration for the command server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Maximum number of events in one event stream page.
    pub max_events_per_response: u32,
}

impl ServerConfig {
    /// Creates a configuration with default limits.
    pub fn new() -> Self {
        Self {
            max_events_per_response: 100,
        }
    }

    /// Sets the maximum page size. Values below 1 are raised to 1.
    pub fn with_max_events_per_response(mut self, max: u32) -> Self {
        self.max_events_per_response = max.max(1);
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}
