//! Audio/video sync enforcement
//!
//! Keeps the last accepted time of every stream. A packet is accepted when
//! its time lies in `[min, min + max_skew)`, where `min` is the earliest of
//! those times. Out-of-window packets are either re-timed to `min + 40ms`
//! (resetting every stream to that time) or dropped:
//!
//! - a packet on a stream that is not the current leader is always re-timed;
//! - a packet on the leading stream is re-timed only while all streams are
//!   level, otherwise it is dropped.
//!
//! The first rule re-times a lagging stream no matter how far it has drifted,
//! so only the leading stream is held to `max_skew`.

use std::time::Duration;

use crate::av::{Packet, StreamDescriptor};

use super::{FilterAction, FilterError};

/// Default maximum skew between streams
pub const DEFAULT_MAX_SKEW: Duration = Duration::from_millis(500);

/// Offset applied to re-timed packets
pub const CORRECTION_STEP: Duration = Duration::from_millis(40);

/// Bounds cross-stream skew by re-timing or dropping packets
#[derive(Debug, Clone)]
pub struct AvSync {
    max_skew: Duration,
    times: Vec<Duration>,
}

struct Window {
    start: Duration,
    end: Duration,
    correctable: bool,
}

impl AvSync {
    pub fn new(max_skew: Duration) -> Self {
        Self {
            max_skew,
            times: Vec::new(),
        }
    }

    /// Maximum skew tolerated before correcting
    pub fn max_skew(&self) -> Duration {
        self.max_skew
    }

    /// Last accepted time of every stream
    pub fn times(&self) -> &[Duration] {
        &self.times
    }

    pub fn modify(
        &mut self,
        pkt: &mut Packet,
        streams: &[StreamDescriptor],
    ) -> Result<FilterAction, FilterError> {
        if self.times.is_empty() {
            if streams.is_empty() {
                return Err(FilterError::NoStreams);
            }
            self.times = vec![Duration::ZERO; streams.len()];
        }
        if pkt.idx >= self.times.len() {
            return Err(FilterError::StreamIndexOutOfRange {
                index: pkt.idx,
                streams: self.times.len(),
            });
        }

        let window = self.window(pkt.idx);
        if pkt.time >= window.start && pkt.time < window.end {
            self.times[pkt.idx] = pkt.time;
            return Ok(FilterAction::Pass);
        }

        if window.correctable {
            let corrected = window.start + CORRECTION_STEP;
            tracing::trace!(
                idx = pkt.idx,
                time_ms = pkt.time.as_millis() as u64,
                corrected_ms = corrected.as_millis() as u64,
                "A/V sync re-timed packet"
            );
            pkt.time = corrected;
            self.times.iter_mut().for_each(|t| *t = corrected);
            Ok(FilterAction::Pass)
        } else {
            tracing::trace!(
                idx = pkt.idx,
                time_ms = pkt.time.as_millis() as u64,
                "A/V sync dropped leading packet"
            );
            Ok(FilterAction::Drop)
        }
    }

    fn window(&self, idx: usize) -> Window {
        let mut min_idx = 0;
        let mut max_idx = 0;
        for (i, t) in self.times.iter().enumerate() {
            if *t < self.times[min_idx] {
                min_idx = i;
            }
            if *t > self.times[max_idx] {
                max_idx = i;
            }
        }

        let all_level = self.times[min_idx] == self.times[max_idx];
        let start = self.times[min_idx];

        Window {
            start,
            end: start + self.max_skew,
            correctable: idx != max_idx || all_level,
        }
    }
}

impl Default for AvSync {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SKEW)
    }
}
