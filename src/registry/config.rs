//! Registry configuration

/// Default capacity of a viewer's inbound frame slot
pub const DEFAULT_VIEWER_SLOT_CAPACITY: usize = 1;

/// Default number of skipped frames between backpressure warnings
pub const DEFAULT_DROP_LOG_INTERVAL: u64 = 100;

/// Configuration for the stream pool and its live streams
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Capacity of each viewer's inbound frame channel
    ///
    /// Fan-out never waits on a viewer: a frame that does not fit is skipped
    /// for that viewer.
    pub viewer_slot_capacity: usize,

    /// Emit a warning every this many frames skipped for one viewer
    pub drop_log_interval: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            viewer_slot_capacity: DEFAULT_VIEWER_SLOT_CAPACITY,
            drop_log_interval: DEFAULT_DROP_LOG_INTERVAL,
        }
    }
}

impl RegistryConfig {
    /// Set the viewer slot capacity (at least 1)
    pub fn viewer_slot_capacity(mut self, capacity: usize) -> Self {
        self.viewer_slot_capacity = capacity.max(1);
        self
    }

    /// Set the backpressure warning interval (at least 1)
    pub fn drop_log_interval(mut self, interval: u64) -> Self {
        self.drop_log_interval = interval.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RegistryConfig::default();
        assert_eq!(config.viewer_slot_capacity, 1);
        assert_eq!(config.drop_log_interval, 100);
    }

    #[test]
    fn test_builder_clamps_to_one() {
        let config = RegistryConfig::default()
            .viewer_slot_capacity(0)
            .drop_log_interval(0);
        assert_eq!(config.viewer_slot_capacity, 1);
        assert_eq!(config.drop_log_interval, 1);
    }
}
