//! Configuration for the core model.

/// Configuration for the snapshot cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum snapshots kept per aggregate. `0` disables caching.
    pub max_snapshots_per_aggregate: usize,
}

impl CacheConfig {
    /// Creates a cache configuration.
    pub fn new(max_snapshots_per_aggregate: usize) -> Self {
        Self {
            max_snapshots_per_aggregate,
        }
    }

    /// Sets the per-aggregate snapshot limit.
    pub fn with_max_snapshots_per_aggregate(mut self, max: usize) -> Self {
        self.max_snapshots_per_aggregate = max;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        assert_eq!(CacheConfig::default().max_snapshots_per_aggregate, 16);
        assert_eq!(
            CacheConfig::default()
                .with_max_snapshots_per_aggregate(2)
                .max_snapshots_per_aggregate,
            2
        );
    }
}
