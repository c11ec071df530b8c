//! Live input configuration

use std::time::Duration;

/// Default pause between connection attempts
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(1000);

/// Default receiver read timeout
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(20);

/// Configuration for a [`LiveInput`](super::LiveInput)
#[derive(Debug, Clone)]
pub struct LiveInputConfig {
    /// Fixed backoff before reconnecting after a failure or end of stream
    pub retry_interval: Duration,

    /// Read timeout handed to each receiver
    ///
    /// Also bounds the wait for the receiver's readiness signal.
    pub read_timeout: Duration,
}

impl Default for LiveInputConfig {
    fn default() -> Self {
        Self {
            retry_interval: DEFAULT_RETRY_INTERVAL,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl LiveInputConfig {
    /// Set the retry backoff
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Set the receiver read timeout
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}
