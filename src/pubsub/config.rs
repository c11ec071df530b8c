//! Queue configuration

use crate::buffer::DEFAULT_CAPACITY;

/// Default number of complete GOPs retained for late joiners
pub const DEFAULT_MAX_GOP_COUNT: usize = 2;

/// Pub/sub queue configuration options
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Number of complete GOPs to retain
    pub max_gop_count: usize,

    /// Initial ring capacity (rounded up to a power of two)
    pub initial_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_gop_count: DEFAULT_MAX_GOP_COUNT,
            initial_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl QueueConfig {
    /// Set the GOP retention limit
    pub fn max_gop_count(mut self, n: usize) -> Self {
        self.max_gop_count = n;
        self
    }

    /// Set the initial ring capacity
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }
}
