//! Growable packet ring addressed by wrapping positions
//!
//! ```text
//!         time
//! ----------------->
//!
//! V-A-V-V-A-V-V-A-V-V
//! |                 |
//! head             tail
//! oldest           next write
//! ```
//!
//! Positions are 32-bit counters that only ever move forward and are allowed
//! to wrap. Two positions are compared by the sign of their wrapping
//! difference, so ordering stays correct across the overflow as long as the
//! live range is shorter than 2^31 packets. Capacity is always a power of two,
//! which makes `pos & (capacity - 1)` a valid slot index on both sides of the
//! wrap.

use crate::av::Packet;

/// Default number of slots before the first grow
pub const DEFAULT_CAPACITY: usize = 64;

/// Position of a packet in a [`RingBuffer`]
///
/// Not `Ord`: wrapping positions have no total order, only a
/// relative one between positions less than 2^31 apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BufPos(pub u32);

impl BufPos {
    /// Signed distance `self - other`
    #[inline]
    pub fn diff(self, other: BufPos) -> i32 {
        self.0.wrapping_sub(other.0) as i32
    }

    #[inline]
    pub fn lt(self, other: BufPos) -> bool {
        self.diff(other) < 0
    }

    #[inline]
    pub fn le(self, other: BufPos) -> bool {
        self.diff(other) <= 0
    }

    #[inline]
    pub fn gt(self, other: BufPos) -> bool {
        self.diff(other) > 0
    }

    #[inline]
    pub fn ge(self, other: BufPos) -> bool {
        self.diff(other) >= 0
    }

    /// Position one step forward
    #[inline]
    pub fn next(self) -> BufPos {
        BufPos(self.0.wrapping_add(1))
    }

    /// Position one step back
    #[inline]
    pub fn prev(self) -> BufPos {
        BufPos(self.0.wrapping_sub(1))
    }

    #[inline]
    fn slot(self, capacity: usize) -> usize {
        self.0 as usize & (capacity - 1)
    }
}

impl std::fmt::Display for BufPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Circular packet store without internal locking
///
/// Owned and mutated by [`Queue`](crate::pubsub::Queue) under its lock.
#[derive(Debug)]
pub struct RingBuffer {
    slots: Vec<Option<Packet>>,
    head: BufPos,
    tail: BufPos,
    size: usize,
}

impl RingBuffer {
    /// Create an empty ring with [`DEFAULT_CAPACITY`] slots
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create an empty ring; `capacity` is rounded up to a power of two
    pub fn with_capacity(capacity: usize) -> Self {
        Self::starting_at(capacity, BufPos::default())
    }

    /// Create an empty ring whose first write lands at `start`
    pub fn starting_at(capacity: usize, start: BufPos) -> Self {
        let capacity = capacity.max(1).next_power_of_two();
        Self {
            slots: std::iter::repeat_with(|| None).take(capacity).collect(),
            head: start,
            tail: start,
            size: 0,
        }
    }

    /// Oldest retained position
    pub fn head(&self) -> BufPos {
        self.head
    }

    /// Next write position
    pub fn tail(&self) -> BufPos {
        self.tail
    }

    /// Number of retained packets
    pub fn count(&self) -> usize {
        self.tail.diff(self.head) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// Total payload bytes retained
    pub fn size(&self) -> usize {
        self.size
    }

    /// Current slot count
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Append a packet at the tail, doubling capacity when full
    pub fn push(&mut self, pkt: Packet) {
        if self.count() == self.slots.len() {
            self.grow();
        }
        self.size += pkt.size();
        let slot = self.tail.slot(self.slots.len());
        self.slots[slot] = Some(pkt);
        self.tail = self.tail.next();
    }

    /// Remove and return the packet at the head
    ///
    /// # Panics
    ///
    /// Panics if the ring is empty. Callers check [`count`](Self::count) first.
    pub fn pop(&mut self) -> Packet {
        assert!(!self.is_empty(), "RingBuffer::pop called on an empty buffer");

        let slot = self.head.slot(self.slots.len());
        let pkt = self.slots[slot].take().unwrap_or_default();
        self.size -= pkt.size();
        self.head = self.head.next();
        pkt
    }

    /// Packet at `pos`, or `None` if `pos` is outside `[head, tail)`
    pub fn get(&self, pos: BufPos) -> Option<&Packet> {
        if !self.is_valid_pos(pos) {
            return None;
        }
        self.slots[pos.slot(self.slots.len())].as_ref()
    }

    /// True if `pos` lies in `[head, tail)`
    pub fn is_valid_pos(&self, pos: BufPos) -> bool {
        pos.ge(self.head) && pos.lt(self.tail)
    }

    fn grow(&mut self) {
        let old_capacity = self.slots.len();
        let new_capacity = old_capacity * 2;
        let mut slots: Vec<Option<Packet>> =
            std::iter::repeat_with(|| None).take(new_capacity).collect();

        let mut pos = self.head;
        while pos.lt(self.tail) {
            slots[pos.slot(new_capacity)] = self.slots[pos.slot(old_capacity)].take();
            pos = pos.next();
        }

        tracing::trace!(
            from = old_capacity,
            to = new_capacity,
            count = self.count(),
            "Ring buffer grown"
        );
        self.slots = slots;
    }
}

impl Default for RingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;

    fn make_packet(n: u64, size: usize) -> Packet {
        Packet::new(0, Duration::from_millis(n), false, Bytes::from(vec![0u8; size]))
    }

    #[test]
    fn test_push_pop_fifo() {
        let mut buf = RingBuffer::with_capacity(4);

        for i in 0..3 {
            buf.push(make_packet(i, 10));
        }
        assert_eq!(buf.count(), 3);
        assert_eq!(buf.size(), 30);

        assert_eq!(buf.pop().time, Duration::from_millis(0));
        assert_eq!(buf.pop().time, Duration::from_millis(1));
        assert_eq!(buf.count(), 1);
        assert_eq!(buf.size(), 10);
        assert_eq!(buf.head(), BufPos(2));
        assert_eq!(buf.tail(), BufPos(3));
    }

    #[test]
    #[should_panic(expected = "empty buffer")]
    fn test_pop_empty_panics() {
        let mut buf = RingBuffer::new();
        buf.pop();
    }

    #[test]
    fn test_capacity_rounds_to_power_of_two() {
        assert_eq!(RingBuffer::with_capacity(5).capacity(), 8);
        assert_eq!(RingBuffer::with_capacity(0).capacity(), 1);
        assert_eq!(RingBuffer::new().capacity(), DEFAULT_CAPACITY);
    }

    #[test]
    fn test_grow_preserves_live_range() {
        let mut buf = RingBuffer::with_capacity(4);

        // Rotate head away from slot zero before growing
        for i in 0..3 {
            buf.push(make_packet(i, 1));
        }
        buf.pop();
        buf.pop();
        for i in 3..10 {
            buf.push(make_packet(i, 1));
        }

        assert_eq!(buf.capacity(), 8);
        assert_eq!(buf.count(), 8);

        let mut pos = buf.head();
        for i in 2..10 {
            assert_eq!(buf.get(pos).unwrap().time, Duration::from_millis(i));
            pos = pos.next();
        }
    }

    #[test]
    fn test_get_outside_range() {
        let mut buf = RingBuffer::with_capacity(4);
        buf.push(make_packet(0, 1));
        buf.push(make_packet(1, 1));
        buf.pop();

        assert!(buf.get(BufPos(0)).is_none());
        assert!(buf.get(BufPos(1)).is_some());
        assert!(buf.get(BufPos(2)).is_none());
        assert!(!buf.is_valid_pos(buf.tail()));
    }

    #[test]
    fn test_position_compare_across_wrap() {
        let before = BufPos(u32::MAX - 1);
        let after = BufPos(1);

        assert!(before.lt(after));
        assert!(after.gt(before));
        assert!(after.ge(after));
        assert!(before.le(before));
        assert_eq!(after.diff(before), 3);
        assert_eq!(BufPos(u32::MAX).next(), BufPos(0));
        assert_eq!(BufPos(0).prev(), BufPos(u32::MAX));
    }

    #[test]
    fn test_counters_wrap_without_losing_order() {
        let mut buf = RingBuffer::starting_at(4, BufPos(u32::MAX - 2));

        for i in 0..10 {
            buf.push(make_packet(i, 1));
        }
        // Tail has wrapped past zero, head has not
        assert_eq!(buf.tail(), BufPos(7));
        assert_eq!(buf.count(), 10);
        assert!(buf.is_valid_pos(BufPos(u32::MAX)));
        assert!(buf.is_valid_pos(BufPos(3)));

        for i in 0..10 {
            assert_eq!(buf.pop().time, Duration::from_millis(i));
        }
        assert!(buf.is_empty());
        assert_eq!(buf.size(), 0);
    }
}
