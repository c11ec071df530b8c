//! Timestamp repair
//!
//! Upstream sources reset their clocks on reconnect and jitter under load.
//! `FixTime` can rebase the stream to start at zero and can force a
//! monotonic timeline: a step backwards, or a jump forward of more than
//! [`MAX_FORWARD_JUMP`], is folded into a running correction so the output
//! continues from the last emitted time.

use std::time::Duration;

use crate::av::Packet;

/// Largest forward step accepted without treating it as a discontinuity
pub const MAX_FORWARD_JUMP: Duration = Duration::from_millis(500);

/// Rewrites packet times; never drops
#[derive(Debug, Clone, Default)]
pub struct FixTime {
    /// Subtract the first packet's time from every packet
    pub start_from_zero: bool,
    /// Force non-decreasing times with bounded forward steps
    pub make_increment: bool,
    zero_base: Option<Duration>,
    // Signed nanoseconds: a backwards step makes the correction negative
    incr_base: i128,
    last_time: Option<i128>,
}

impl FixTime {
    pub fn new(start_from_zero: bool, make_increment: bool) -> Self {
        Self {
            start_from_zero,
            make_increment,
            ..Default::default()
        }
    }

    pub fn modify(&mut self, pkt: &mut Packet) {
        if self.start_from_zero {
            let base = *self.zero_base.get_or_insert(pkt.time);
            pkt.time = pkt.time.saturating_sub(base);
        }

        if self.make_increment {
            let mut time = pkt.time.as_nanos() as i128 - self.incr_base;
            let last = *self.last_time.get_or_insert(time);

            if time < last || time > last + MAX_FORWARD_JUMP.as_nanos() as i128 {
                tracing::debug!(
                    idx = pkt.idx,
                    time_ms = pkt.time.as_millis() as u64,
                    jump_ms = ((time - last) / 1_000_000) as i64,
                    "Timestamp discontinuity corrected"
                );
                self.incr_base += time - last;
                time = last;
            }

            self.last_time = Some(time);
            pkt.time = Duration::from_nanos(u64::try_from(time.max(0)).unwrap_or(u64::MAX));
        }
    }
}
