//! Statistics for queues, inputs and viewers

use std::time::Duration;

/// Pub/sub queue occupancy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Packets currently buffered
    pub packet_count: usize,
    /// Payload bytes currently buffered
    pub size_bytes: usize,
    /// Video key frames currently buffered
    pub gop_count: usize,
    /// Retention limit
    pub max_gop_count: usize,
    /// Time of the oldest buffered packet
    pub head_time: Option<Duration>,
    /// Time of the newest buffered packet
    pub tail_time: Option<Duration>,
    /// Media time covered by the buffered packets
    pub buffered: Duration,
    /// Media time evicted since the queue was created
    pub evicted: Duration,
    /// Whether the stream header has been written
    pub has_header: bool,
    /// Whether the queue is closed
    pub closed: bool,
}

/// Live input session counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputStats {
    /// Connection attempts made
    pub connect_attempts: u64,
    /// Attempts that did not reach streaming
    pub connect_failures: u64,
    /// Frames received from the source
    pub frames_received: u64,
    /// Key frames received from the source
    pub keyframes: u64,
    /// Payload bytes received from the source
    pub bytes_received: u64,
}

/// Per-viewer delivery counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewerStats {
    /// Viewer session ID
    pub session_id: String,
    /// Output protocol of the viewer
    pub protocol: String,
    /// Frames handed to the viewer's slot
    pub frames_delivered: u64,
    /// Frames skipped because the slot was full
    pub frames_skipped: u64,
}

impl ViewerStats {
    /// Fraction of offered frames that were skipped
    pub fn skip_ratio(&self) -> f64 {
        let offered = self.frames_delivered + self.frames_skipped;
        if offered > 0 {
            self.frames_skipped as f64 / offered as f64
        } else {
            0.0
        }
    }
}
