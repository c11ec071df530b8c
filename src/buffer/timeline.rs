//! Buffered-duration accounting
//!
//! ```text
//! pop                                   push
//!
//!      seg                 seg        seg
//!   |--------|         |---------|   |---|
//!      20ms                40ms       5ms
//! ----------------- time -------------------->
//! head                                  tail
//! ```
//!
//! Segments never overlap: a segment pushed before the previous one ends is
//! moved forward to start at that end.

use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    time: Duration,
    dur: Duration,
}

/// Ordered list of non-overlapping `(start, duration)` segments
#[derive(Debug, Default)]
pub struct Timeline {
    segs: VecDeque<Segment>,
    consumed: Duration,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a segment starting at `time`, shifted past the previous segment's end
    pub fn push(&mut self, time: Duration, dur: Duration) {
        let time = match self.segs.back() {
            Some(tail) => time.max(tail.time + tail.dur),
            None => time,
        };
        self.segs.push_back(Segment { time, dur });
    }

    /// Consume `dur` from the head
    ///
    /// Returns the start time of the head segment before consuming, or the
    /// total consumed duration when the timeline is empty.
    pub fn pop(&mut self, mut dur: Duration) -> Duration {
        let Some(front) = self.segs.front() else {
            return self.consumed;
        };
        let time = front.time;

        while !dur.is_zero() {
            let Some(seg) = self.segs.front_mut() else {
                break;
            };
            let sub = seg.dur.min(dur);
            seg.dur -= sub;
            seg.time += sub;
            dur -= sub;
            self.consumed += sub;
            if seg.dur.is_zero() {
                self.segs.pop_front();
            }
        }

        time
    }

    /// Total duration still buffered
    pub fn buffered(&self) -> Duration {
        self.segs.iter().map(|s| s.dur).sum()
    }

    /// Total duration consumed so far
    pub fn consumed(&self) -> Duration {
        self.consumed
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.segs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_push_shifts_overlap_forward() {
        let mut tl = Timeline::new();
        tl.push(ms(0), ms(20));
        // Starts inside the previous segment; moved to 20ms
        tl.push(ms(10), ms(40));

        assert_eq!(tl.len(), 2);
        assert_eq!(tl.buffered(), ms(60));
        assert_eq!(tl.pop(ms(20)), ms(0));
        assert_eq!(tl.pop(ms(0)), ms(20));
    }

    #[test]
    fn test_push_keeps_gaps() {
        let mut tl = Timeline::new();
        tl.push(ms(0), ms(20));
        tl.push(ms(100), ms(5));

        tl.pop(ms(20));
        assert_eq!(tl.pop(ms(5)), ms(100));
        assert!(tl.is_empty());
    }

    #[test]
    fn test_pop_spans_segments() {
        let mut tl = Timeline::new();
        tl.push(ms(0), ms(20));
        tl.push(ms(20), ms(40));
        tl.push(ms(60), ms(5));

        assert_eq!(tl.pop(ms(30)), ms(0));
        assert_eq!(tl.len(), 2);
        assert_eq!(tl.buffered(), ms(35));
        // Head segment was trimmed by 10ms
        assert_eq!(tl.pop(ms(0)), ms(30));
        assert_eq!(tl.consumed(), ms(30));
    }

    #[test]
    fn test_pop_empty_returns_consumed() {
        let mut tl = Timeline::new();
        assert_eq!(tl.pop(ms(10)), Duration::ZERO);

        tl.push(ms(0), ms(15));
        tl.pop(ms(100));
        assert!(tl.is_empty());
        assert_eq!(tl.pop(ms(10)), ms(15));
    }
}
