//! Single-writer, multi-reader packet queue
//!
//! The queue owns a [`RingBuffer`] and trims it so that at most
//! `max_gop_count` complete GOPs stay buffered. Readers never consume from
//! the queue: each [`QueueCursor`] keeps its own position and many cursors
//! share the same packets.
//!
//! A [`Timeline`] follows the buffered span: every forward step in packet
//! time is pushed as a segment, and evicting a GOP pops the time it covered.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, RwLock};

use crate::av::{video_index, Packet, StreamDescriptor};
use crate::buffer::{RingBuffer, Timeline};
use crate::error::{Error, Result};
use crate::stats::QueueStats;

use super::config::QueueConfig;
use super::cursor::{CursorStart, QueueCursor};

/// State guarded by the queue lock
#[derive(Debug)]
pub(super) struct QueueState {
    pub(super) buf: RingBuffer,
    pub(super) cur_gop_count: usize,
    pub(super) max_gop_count: usize,
    pub(super) streams: Option<Vec<StreamDescriptor>>,
    pub(super) video_idx: Option<usize>,
    pub(super) closed: bool,
    timeline: Timeline,
    last_time: Option<Duration>,
}

impl QueueState {
    /// Drop whole GOPs from the head until at most `max_gop_count` key frames remain
    ///
    /// The last remaining packet is never removed. Packets in front of the
    /// first retained key frame (the tail of an evicted GOP, or a prefix that
    /// arrived before any key frame) go with the GOP they belong to.
    fn evict(&mut self) -> usize {
        let mut evicted = 0;
        let head_time = self.buf.get(self.buf.head()).map(|p| p.time);

        while self.cur_gop_count > self.max_gop_count && self.buf.count() > 1 {
            loop {
                let pkt = self.buf.pop();
                evicted += 1;
                if pkt.is_video_keyframe(self.video_idx) {
                    self.cur_gop_count -= 1;
                }

                if self.buf.count() <= 1 {
                    break;
                }
                let head = self.buf.get(self.buf.head());
                if head.is_some_and(|p| p.is_video_keyframe(self.video_idx)) {
                    break;
                }
            }
        }

        if evicted > 0 {
            let new_head = self.buf.get(self.buf.head()).map(|p| p.time);
            if let (Some(old), Some(new)) = (head_time, new_head) {
                self.timeline.pop(new.saturating_sub(old));
            }
        }

        evicted
    }

    /// Extend the timeline up to `time`
    fn track_time(&mut self, time: Duration) {
        match self.last_time {
            Some(last) if time > last => {
                self.timeline.push(last, time - last);
                self.last_time = Some(time);
            }
            Some(_) => {}
            None => self.last_time = Some(time),
        }
    }
}

/// Shared between the queue handle and its cursors
#[derive(Debug)]
pub(super) struct Shared {
    pub(super) state: RwLock<QueueState>,
    /// Woken on every write, header and close
    pub(super) notify: Notify,
}

/// One publisher, many subscribers packet queue
///
/// Cloning a `Queue` yields another handle to the same buffer.
///
/// ```text
///   writer ──► write_packet() ──► [ GOP n-1 | GOP n ] ──► cursor A (oldest)
///                                         │          └──► cursor B (latest)
///                                         └─────────────► cursor C (delayed)
/// ```
#[derive(Debug, Clone)]
pub struct Queue {
    shared: Arc<Shared>,
}

impl Queue {
    /// Create an empty queue retaining two GOPs
    pub fn new() -> Self {
        Self::with_config(QueueConfig::default())
    }

    /// Create an empty queue with custom configuration
    pub fn with_config(config: QueueConfig) -> Self {
        let state = QueueState {
            buf: RingBuffer::with_capacity(config.initial_capacity),
            cur_gop_count: 0,
            max_gop_count: config.max_gop_count,
            streams: None,
            video_idx: None,
            closed: false,
            timeline: Timeline::new(),
            last_time: None,
        };

        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(state),
                notify: Notify::new(),
            }),
        }
    }

    /// Change the number of retained GOPs
    ///
    /// Lowering the limit trims the buffer right away.
    pub async fn set_retention_limit(&self, n: usize) {
        let mut state = self.shared.state.write().await;
        state.max_gop_count = n;
        let evicted = state.evict();

        tracing::debug!(max_gop_count = n, evicted = evicted, "Retention limit changed");
    }

    /// Declare the stream layout
    ///
    /// Only the first header is recorded; later calls are ignored. Wakes
    /// every cursor waiting in [`QueueCursor::streams`].
    pub async fn write_header(&self, streams: Vec<StreamDescriptor>) -> Result<()> {
        {
            let mut state = self.shared.state.write().await;
            if state.closed {
                return Err(Error::Eof);
            }
            if state.streams.is_some() {
                tracing::warn!(streams = streams.len(), "Queue header already written, ignoring");
                return Ok(());
            }

            state.video_idx = video_index(&streams);
            tracing::debug!(
                streams = streams.len(),
                video_idx = ?state.video_idx,
                "Queue header written"
            );
            state.streams = Some(streams);
        }

        self.shared.notify.notify_waiters();
        Ok(())
    }

    /// Accepted for muxer symmetry; the queue has nothing to flush
    pub async fn write_trailer(&self) -> Result<()> {
        Ok(())
    }

    /// Append a packet and evict GOPs beyond the retention limit
    pub async fn write_packet(&self, pkt: Packet) -> Result<()> {
        {
            let mut state = self.shared.state.write().await;
            if state.closed {
                return Err(Error::Eof);
            }

            if pkt.is_video_keyframe(state.video_idx) {
                state.cur_gop_count += 1;
            }
            state.track_time(pkt.time);
            state.buf.push(pkt);

            let evicted = state.evict();
            if evicted > 0 {
                tracing::trace!(
                    evicted = evicted,
                    gops = state.cur_gop_count,
                    count = state.buf.count(),
                    "Evicted oldest GOP"
                );
            }
        }

        self.shared.notify.notify_waiters();
        Ok(())
    }

    /// Close the queue
    ///
    /// All waiting and future cursor reads return [`Error::Eof`] once they
    /// have drained what is buffered.
    pub async fn close(&self) {
        {
            let mut state = self.shared.state.write().await;
            if state.closed {
                return;
            }
            state.closed = true;
            tracing::debug!(buffered = state.buf.count(), "Queue closed");
        }

        self.shared.notify.notify_waiters();
    }

    /// Create a cursor positioned by `start` on its first read
    pub fn cursor(&self, start: CursorStart) -> QueueCursor {
        QueueCursor::new(Arc::clone(&self.shared), start)
    }

    /// Cursor that only sees packets written after its first read
    pub fn latest(&self) -> QueueCursor {
        self.cursor(CursorStart::Latest)
    }

    /// Cursor that replays everything currently buffered
    pub fn oldest(&self) -> QueueCursor {
        self.cursor(CursorStart::Oldest)
    }

    /// Cursor starting `dur` behind the newest packet
    pub fn delayed_time(&self, dur: std::time::Duration) -> QueueCursor {
        self.cursor(CursorStart::DelayedTime(dur))
    }

    /// Cursor starting `n` GOPs behind the newest packet
    pub fn delayed_gop_count(&self, n: usize) -> QueueCursor {
        self.cursor(CursorStart::DelayedGopCount(n))
    }

    /// Index of the video stream, once the header is written
    pub async fn video_index(&self) -> Option<usize> {
        self.shared.state.read().await.video_idx
    }

    pub async fn is_closed(&self) -> bool {
        self.shared.state.read().await.closed
    }

    /// Snapshot of buffer occupancy
    pub async fn stats(&self) -> QueueStats {
        let state = self.shared.state.read().await;
        let buf = &state.buf;

        QueueStats {
            packet_count: buf.count(),
            size_bytes: buf.size(),
            gop_count: state.cur_gop_count,
            max_gop_count: state.max_gop_count,
            head_time: buf.get(buf.head()).map(|p| p.time),
            tail_time: buf.get(buf.tail().prev()).map(|p| p.time),
            buffered: state.timeline.buffered(),
            evicted: state.timeline.consumed(),
            has_header: state.streams.is_some(),
            closed: state.closed,
        }
    }
}

impl Default for Queue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use crate::av::CodecType;

    use super::*;

    fn streams() -> Vec<StreamDescriptor> {
        vec![
            StreamDescriptor::new(CodecType::H264),
            StreamDescriptor::new(CodecType::Aac),
        ]
    }

    fn video(ms: u64, key: bool) -> Packet {
        Packet::new(0, Duration::from_millis(ms), key, Bytes::from_static(&[0u8; 8]))
    }

    fn audio(ms: u64) -> Packet {
        Packet::new(1, Duration::from_millis(ms), false, Bytes::from_static(&[0u8; 4]))
    }

    async fn keyframes_retained(queue: &Queue) -> usize {
        let state = queue.shared.state.read().await;
        let mut n = 0;
        let mut pos = state.buf.head();
        while let Some(pkt) = state.buf.get(pos) {
            if pkt.is_video_keyframe(state.video_idx) {
                n += 1;
            }
            pos = pos.next();
        }
        n
    }

    #[tokio::test]
    async fn test_header_locates_video_stream() {
        let queue = Queue::new();
        queue
            .write_header(vec![
                StreamDescriptor::new(CodecType::Aac),
                StreamDescriptor::new(CodecType::H264),
            ])
            .await
            .unwrap();

        assert_eq!(queue.video_index().await, Some(1));
    }

    #[tokio::test]
    async fn test_second_header_ignored() {
        let queue = Queue::new();
        queue.write_header(streams()).await.unwrap();
        queue
            .write_header(vec![StreamDescriptor::new(CodecType::Aac)])
            .await
            .unwrap();

        assert_eq!(queue.video_index().await, Some(0));
    }

    #[tokio::test]
    async fn test_retention_matches_keyframes_seen() {
        let queue = Queue::new();
        queue.write_header(streams()).await.unwrap();

        let mut seen = 0;
        for gop in 0..6u64 {
            for i in 0..5u64 {
                let key = i == 0;
                if key {
                    seen += 1;
                }
                queue.write_packet(video(gop * 200 + i * 40, key)).await.unwrap();
                queue.write_packet(audio(gop * 200 + i * 40 + 5)).await.unwrap();

                assert_eq!(keyframes_retained(&queue).await, seen.min(2));
            }
        }
    }

    #[tokio::test]
    async fn test_eviction_drops_whole_gop() {
        let queue = Queue::new();
        queue.write_header(streams()).await.unwrap();

        for gop in 0..3u64 {
            queue.write_packet(video(gop * 100, true)).await.unwrap();
            queue.write_packet(audio(gop * 100 + 10)).await.unwrap();
            queue.write_packet(video(gop * 100 + 40, false)).await.unwrap();
        }

        let stats = queue.stats().await;
        assert_eq!(stats.packet_count, 6);
        assert_eq!(stats.gop_count, 2);
        // Head is the second GOP's key frame, not an orphaned delta
        assert_eq!(stats.head_time, Some(Duration::from_millis(100)));
        assert_eq!(stats.tail_time, Some(Duration::from_millis(240)));
    }

    #[tokio::test]
    async fn test_never_evicts_last_packet() {
        let queue = Queue::with_config(QueueConfig::default().max_gop_count(0));
        queue.write_header(streams()).await.unwrap();

        queue.write_packet(video(0, true)).await.unwrap();
        assert_eq!(queue.stats().await.packet_count, 1);

        queue.write_packet(video(40, true)).await.unwrap();
        let stats = queue.stats().await;
        assert_eq!(stats.packet_count, 1);
        assert_eq!(stats.head_time, Some(Duration::from_millis(40)));
    }

    #[tokio::test]
    async fn test_lowering_retention_trims_immediately() {
        let queue = Queue::with_config(QueueConfig::default().max_gop_count(4));
        queue.write_header(streams()).await.unwrap();

        for gop in 0..4u64 {
            queue.write_packet(video(gop * 100, true)).await.unwrap();
            queue.write_packet(video(gop * 100 + 40, false)).await.unwrap();
        }
        assert_eq!(queue.stats().await.gop_count, 4);

        queue.set_retention_limit(1).await;
        let stats = queue.stats().await;
        assert_eq!(stats.gop_count, 1);
        assert_eq!(stats.packet_count, 2);
        assert_eq!(stats.max_gop_count, 1);
    }

    #[tokio::test]
    async fn test_prefix_before_first_keyframe_is_evicted_with_first_gop() {
        let queue = Queue::with_config(QueueConfig::default().max_gop_count(1));
        queue.write_header(streams()).await.unwrap();

        queue.write_packet(video(0, false)).await.unwrap();
        queue.write_packet(audio(10)).await.unwrap();
        queue.write_packet(video(40, true)).await.unwrap();
        queue.write_packet(video(80, false)).await.unwrap();
        assert_eq!(queue.stats().await.packet_count, 4);

        queue.write_packet(video(120, true)).await.unwrap();
        let stats = queue.stats().await;
        assert_eq!(stats.packet_count, 1);
        assert_eq!(stats.head_time, Some(Duration::from_millis(120)));
    }

    #[tokio::test]
    async fn test_write_after_close_fails() {
        let queue = Queue::new();
        queue.close().await;
        queue.close().await;

        assert!(queue.is_closed().await);
        assert_eq!(queue.write_packet(video(0, true)).await, Err(Error::Eof));
        assert_eq!(queue.write_header(streams()).await, Err(Error::Eof));
    }

    #[tokio::test]
    async fn test_stats_track_bytes() {
        let queue = Queue::new();
        queue.write_header(streams()).await.unwrap();
        queue.write_packet(video(0, true)).await.unwrap();
        queue.write_packet(audio(5)).await.unwrap();

        let stats = queue.stats().await;
        assert_eq!(stats.size_bytes, 12);
        assert!(stats.has_header);
        assert!(!stats.closed);
        assert_eq!(stats.buffered, Duration::from_millis(5));
    }

    #[tokio::test]
    async fn test_buffered_duration_follows_eviction() {
        let queue = Queue::new();
        queue.write_header(streams()).await.unwrap();

        for gop in 0..3u64 {
            queue.write_packet(video(gop * 200, true)).await.unwrap();
            queue.write_packet(audio(gop * 200 + 10)).await.unwrap();
            queue.write_packet(video(gop * 200 + 40, false)).await.unwrap();
        }

        // First GOP (0..200ms) evicted, 200..440ms still buffered
        let stats = queue.stats().await;
        assert_eq!(stats.head_time, Some(Duration::from_millis(200)));
        assert_eq!(stats.buffered, Duration::from_millis(240));
        assert_eq!(stats.evicted, Duration::from_millis(200));

        // A packet that steps back in time adds nothing
        queue.write_packet(audio(430)).await.unwrap();
        assert_eq!(queue.stats().await.buffered, Duration::from_millis(240));

        queue.set_retention_limit(1).await;
        let stats = queue.stats().await;
        assert_eq!(stats.buffered, Duration::from_millis(40));
        assert_eq!(stats.evicted, Duration::from_millis(400));
    }
}
