//! Independent read positions into a [`Queue`](super::Queue)

use std::sync::Arc;
use std::time::Duration;

use crate::av::{Packet, PacketReader, StreamDescriptor};
use crate::buffer::BufPos;
use crate::error::{Error, Result};

use super::queue::{QueueState, Shared};

/// Where a cursor lands on its first read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorStart {
    /// Only packets written after the first read
    Latest,
    /// Everything currently buffered
    Oldest,
    /// Oldest packet no more than this far behind the newest one
    DelayedTime(Duration),
    /// The n-th video key frame counted back from the newest packet
    DelayedGopCount(usize),
}

impl CursorStart {
    fn position(self, state: &QueueState) -> BufPos {
        let buf = &state.buf;
        let newest = buf.tail().prev();

        match self {
            CursorStart::Latest => buf.tail(),
            CursorStart::Oldest => buf.head(),
            CursorStart::DelayedTime(dur) => {
                let Some(end) = buf.get(newest).map(|p| p.time) else {
                    return buf.tail();
                };

                let mut pos = newest;
                while let Some(pkt) = buf.get(pos.prev()) {
                    if end.saturating_sub(pkt.time) > dur {
                        break;
                    }
                    pos = pos.prev();
                }
                pos
            }
            CursorStart::DelayedGopCount(n) => {
                if n == 0 || state.video_idx.is_none() || buf.is_empty() {
                    return buf.tail();
                }

                let mut gops = 0;
                let mut pos = newest;
                loop {
                    let is_key = buf
                        .get(pos)
                        .is_some_and(|p| p.is_video_keyframe(state.video_idx));
                    if is_key {
                        gops += 1;
                        if gops == n {
                            return pos;
                        }
                    }
                    if pos == buf.head() {
                        return pos;
                    }
                    pos = pos.prev();
                }
            }
        }
    }
}

/// A consumer's position in a queue
///
/// Reading never removes packets. A cursor that falls behind the retained
/// window jumps forward to the oldest buffered packet instead of waiting for
/// data that is gone.
#[derive(Debug)]
pub struct QueueCursor {
    shared: Arc<Shared>,
    start: CursorStart,
    pos: Option<BufPos>,
}

impl QueueCursor {
    pub(super) fn new(shared: Arc<Shared>, start: CursorStart) -> Self {
        Self {
            shared,
            start,
            pos: None,
        }
    }

    /// Start strategy of this cursor
    pub fn start(&self) -> CursorStart {
        self.start
    }

    /// Position of the next packet to read; `None` before the first read
    pub fn position(&self) -> Option<BufPos> {
        self.pos
    }

    /// Wait for the stream descriptors
    ///
    /// Returns [`Error::Eof`] if the queue closes before a header arrives.
    pub async fn streams(&mut self) -> Result<Vec<StreamDescriptor>> {
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let state = self.shared.state.read().await;
                if let Some(streams) = &state.streams {
                    return Ok(streams.clone());
                }
                if state.closed {
                    return Err(Error::Eof);
                }
            }

            notified.await;
        }
    }

    /// Wait for the next packet at or after this cursor's position
    ///
    /// Returns [`Error::Eof`] once the queue is closed and nothing is left to
    /// read from this position.
    pub async fn read_packet(&mut self) -> Result<Packet> {
        loop {
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let state = self.shared.state.read().await;
                let buf = &state.buf;

                let mut pos = match self.pos {
                    Some(pos) => pos,
                    None => {
                        let pos = self.start.position(&state);
                        tracing::trace!(start = ?self.start, pos = %pos, "Cursor positioned");
                        pos
                    }
                };

                if pos.lt(buf.head()) {
                    tracing::debug!(
                        from = %pos,
                        to = %buf.head(),
                        skipped = buf.head().diff(pos),
                        "Cursor fell behind, snapping to head"
                    );
                    pos = buf.head();
                } else if pos.gt(buf.tail()) {
                    pos = buf.tail();
                }

                if let Some(pkt) = buf.get(pos) {
                    self.pos = Some(pos.next());
                    return Ok(pkt.clone());
                }
                self.pos = Some(pos);

                if state.closed {
                    return Err(Error::Eof);
                }
            }

            notified.await;
        }
    }
}

impl PacketReader for QueueCursor {
    async fn streams(&mut self) -> Result<Vec<StreamDescriptor>> {
        QueueCursor::streams(self).await
    }

    async fn read_packet(&mut self) -> Result<Packet> {
        QueueCursor::read_packet(self).await
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use crate::av::CodecType;
    use crate::pubsub::{Queue, QueueConfig};

    use super::*;

    fn video(ms: u64, key: bool) -> Packet {
        Packet::new(0, Duration::from_millis(ms), key, Bytes::from_static(b"v"))
    }

    fn audio(ms: u64) -> Packet {
        Packet::new(1, Duration::from_millis(ms), false, Bytes::from_static(b"a"))
    }

    async fn av_queue(config: QueueConfig) -> Queue {
        let queue = Queue::with_config(config);
        queue
            .write_header(vec![
                StreamDescriptor::new(CodecType::H264),
                StreamDescriptor::new(CodecType::Aac),
            ])
            .await
            .unwrap();
        queue
    }

    /// 20 video packets at 100ms spacing, key frame every 5
    async fn fill(queue: &Queue) {
        for i in 0..20u64 {
            queue.write_packet(video(i * 100, i % 5 == 0)).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_oldest_replays_buffer() {
        let queue = av_queue(QueueConfig::default().max_gop_count(10)).await;
        fill(&queue).await;
        queue.close().await;

        let mut cursor = queue.oldest();
        let mut times = Vec::new();
        while let Ok(pkt) = cursor.read_packet().await {
            times.push(pkt.time.as_millis() as u64);
        }

        let expected: Vec<u64> = (0..20).map(|i| i * 100).collect();
        assert_eq!(times, expected);
    }

    #[tokio::test]
    async fn test_latest_skips_buffer() {
        let queue = av_queue(QueueConfig::default()).await;
        fill(&queue).await;

        let mut cursor = queue.latest();
        // First read positions the cursor at the tail and blocks
        let pending = tokio::time::timeout(Duration::from_millis(20), cursor.read_packet()).await;
        assert!(pending.is_err());

        queue.write_packet(video(5000, false)).await.unwrap();
        let pkt = cursor.read_packet().await.unwrap();
        assert_eq!(pkt.time, Duration::from_millis(5000));
    }

    #[test]
    fn test_blocked_read_is_woken_by_write() {
        use tokio_test::{assert_pending, assert_ready, block_on, task};

        let queue = block_on(av_queue(QueueConfig::default()));
        let mut cursor = queue.oldest();
        let mut read = task::spawn(cursor.read_packet());
        assert_pending!(read.poll());

        block_on(queue.write_packet(video(0, true))).unwrap();
        assert!(read.is_woken());
        let pkt = assert_ready!(read.poll()).unwrap();
        assert!(pkt.is_keyframe);
    }

    #[tokio::test]
    async fn test_delayed_time_lands_within_bound() {
        let queue = av_queue(QueueConfig::default().max_gop_count(10)).await;
        fill(&queue).await;

        let mut cursor = queue.delayed_time(Duration::from_millis(500));
        let pkt = cursor.read_packet().await.unwrap();

        // Newest is 1900ms; oldest within 500ms of it is 1400ms
        assert_eq!(pkt.time, Duration::from_millis(1400));
    }

    #[tokio::test]
    async fn test_delayed_time_on_empty_queue_waits_for_data() {
        let queue = av_queue(QueueConfig::default()).await;
        let mut cursor = queue.delayed_time(Duration::from_secs(1));

        let reader = tokio::spawn(async move { cursor.read_packet().await });
        tokio::task::yield_now().await;
        queue.write_packet(video(0, true)).await.unwrap();

        assert_eq!(reader.await.unwrap().unwrap().time, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_delayed_gop_count() {
        let queue = av_queue(QueueConfig::default().max_gop_count(10)).await;
        fill(&queue).await;

        let mut one = queue.delayed_gop_count(1);
        assert_eq!(one.read_packet().await.unwrap().time, Duration::from_millis(1500));

        let mut two = queue.delayed_gop_count(2);
        assert_eq!(two.read_packet().await.unwrap().time, Duration::from_millis(1000));

        // More GOPs than buffered: start at head
        let mut many = queue.delayed_gop_count(50);
        assert_eq!(many.read_packet().await.unwrap().time, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_delayed_gop_count_ignores_audio_and_zero() {
        let queue = av_queue(QueueConfig::default()).await;
        queue.write_packet(video(0, true)).await.unwrap();
        queue.write_packet(audio(10)).await.unwrap();
        queue.write_packet(video(40, false)).await.unwrap();
        queue.write_packet(audio(50)).await.unwrap();

        let mut one = queue.delayed_gop_count(1);
        assert_eq!(one.read_packet().await.unwrap().time, Duration::ZERO);

        let mut zero = queue.delayed_gop_count(0);
        queue.close().await;
        assert_eq!(zero.read_packet().await, Err(Error::Eof));
    }

    #[tokio::test]
    async fn test_stale_cursor_snaps_forward() {
        let queue = av_queue(QueueConfig::default()).await;
        queue.write_packet(video(0, true)).await.unwrap();

        let mut cursor = queue.oldest();
        assert_eq!(cursor.read_packet().await.unwrap().time, Duration::ZERO);
        let before = cursor.position().unwrap();

        // Push far past the retention window
        for i in 1..20u64 {
            queue.write_packet(video(i * 100, i % 5 == 0)).await.unwrap();
        }

        let pkt = cursor.read_packet().await.unwrap();
        assert!(pkt.is_keyframe);
        assert_eq!(pkt.time, Duration::from_millis(1000));
        assert!(cursor.position().unwrap().gt(before));
    }

    #[tokio::test]
    async fn test_positions_never_decrease() {
        let queue = av_queue(QueueConfig::default().max_gop_count(1)).await;
        let mut cursor = queue.oldest();

        let mut last: Option<BufPos> = None;
        for i in 0..50u64 {
            queue.write_packet(video(i * 10, i % 3 == 0)).await.unwrap();
            if i % 4 == 0 {
                cursor.read_packet().await.unwrap();
                let pos = cursor.position().unwrap();
                if let Some(prev) = last {
                    assert!(pos.ge(prev));
                }
                last = Some(pos);
            }
        }
    }

    #[tokio::test]
    async fn test_streams_waits_for_header() {
        let queue = Queue::new();
        let mut cursor = queue.oldest();

        let reader = tokio::spawn(async move { cursor.streams().await });
        tokio::task::yield_now().await;
        assert!(!reader.is_finished());

        queue
            .write_header(vec![StreamDescriptor::new(CodecType::H264)])
            .await
            .unwrap();
        let streams = reader.await.unwrap().unwrap();
        assert_eq!(streams.len(), 1);
    }

    #[tokio::test]
    async fn test_streams_eof_when_closed_without_header() {
        let queue = Queue::new();
        let mut cursor = queue.oldest();

        let reader = tokio::spawn(async move { cursor.streams().await });
        tokio::task::yield_now().await;
        queue.close().await;

        assert_eq!(reader.await.unwrap(), Err(Error::Eof));
    }

    #[tokio::test]
    async fn test_close_wakes_blocked_readers() {
        let queue = av_queue(QueueConfig::default()).await;

        let mut readers = Vec::new();
        for _ in 0..4 {
            let mut cursor = queue.latest();
            readers.push(tokio::spawn(async move { cursor.read_packet().await }));
        }
        tokio::task::yield_now().await;
        queue.close().await;

        for reader in readers {
            let result = tokio::time::timeout(Duration::from_secs(1), reader)
                .await
                .expect("reader stayed blocked after close")
                .unwrap();
            assert_eq!(result, Err(Error::Eof));
        }
    }

    #[tokio::test]
    async fn test_closed_queue_drains_before_eof() {
        let queue = av_queue(QueueConfig::default()).await;
        queue.write_packet(video(0, true)).await.unwrap();
        queue.write_packet(video(40, false)).await.unwrap();
        queue.close().await;

        let mut cursor = queue.oldest();
        assert!(cursor.read_packet().await.is_ok());
        assert!(cursor.read_packet().await.is_ok());
        assert_eq!(cursor.read_packet().await, Err(Error::Eof));
        assert_eq!(cursor.read_packet().await, Err(Error::Eof));
    }

    #[tokio::test]
    async fn test_cursors_are_independent() {
        let queue = av_queue(QueueConfig::default().max_gop_count(10)).await;
        fill(&queue).await;

        let mut a = queue.oldest();
        let mut b = queue.oldest();
        for _ in 0..5 {
            a.read_packet().await.unwrap();
        }
        assert_eq!(b.read_packet().await.unwrap().time, Duration::ZERO);
        assert_eq!(a.read_packet().await.unwrap().time, Duration::from_millis(500));
    }
}
