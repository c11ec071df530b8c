//! Filtered packet source

use crate::av::{audio_index, video_index, Packet, PacketReader, StreamDescriptor};
use crate::error::Result;

use super::{FilterAction, Filters, StreamLayout};

/// Wraps a [`PacketReader`] and runs a filter pipeline on every packet
///
/// The stream layout is fetched from the inner reader once, on the first
/// call to either method. Dropped packets are skipped transparently.
#[derive(Debug)]
pub struct FilterReader<R> {
    inner: R,
    filters: Filters,
    streams: Option<Vec<StreamDescriptor>>,
    video_idx: Option<usize>,
    audio_idx: Option<usize>,
}

impl<R: PacketReader> FilterReader<R> {
    pub fn new(inner: R, filters: Filters) -> Self {
        Self {
            inner,
            filters,
            streams: None,
            video_idx: None,
            audio_idx: None,
        }
    }

    /// Unwrap the inner reader
    pub fn into_inner(self) -> R {
        self.inner
    }

    async fn load_streams(&mut self) -> Result<()> {
        if self.streams.is_none() {
            let streams = self.inner.streams().await?;
            self.video_idx = video_index(&streams);
            self.audio_idx = audio_index(&streams);
            self.streams = Some(streams);
        }
        Ok(())
    }
}

impl<R: PacketReader> PacketReader for FilterReader<R> {
    async fn streams(&mut self) -> Result<Vec<StreamDescriptor>> {
        self.load_streams().await?;
        Ok(self.streams.clone().unwrap_or_default())
    }

    async fn read_packet(&mut self) -> Result<Packet> {
        self.load_streams().await?;
        let streams = self.streams.as_deref().unwrap_or_default();
        let layout = StreamLayout {
            streams,
            video_idx: self.video_idx,
            audio_idx: self.audio_idx,
        };

        loop {
            let mut pkt = self.inner.read_packet().await?;
            if self.filters.modify(&mut pkt, layout).await? == FilterAction::Pass {
                return Ok(pkt);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use crate::av::CodecType;
    use crate::error::Error;
    use crate::filter::{FilterError, FixTime, WaitKeyFrame};
    use crate::pubsub::Queue;

    use super::*;

    fn video(ms: u64, key: bool) -> Packet {
        Packet::new(0, Duration::from_millis(ms), key, Bytes::from_static(b"v"))
    }

    #[tokio::test]
    async fn test_reads_through_filters() {
        let queue = Queue::new();
        queue
            .write_header(vec![StreamDescriptor::new(CodecType::H264)])
            .await
            .unwrap();
        for (ms, key) in [(1000, false), (1040, false), (1080, true), (1120, false)] {
            queue.write_packet(video(ms, key)).await.unwrap();
        }
        queue.close().await;

        let filters = Filters::new()
            .with(WaitKeyFrame::new())
            .with(FixTime::new(true, true));
        let mut reader = FilterReader::new(queue.oldest(), filters);

        assert_eq!(reader.streams().await.unwrap().len(), 1);
        let first = reader.read_packet().await.unwrap();
        assert!(first.is_keyframe);
        assert_eq!(first.time, Duration::ZERO);
        assert_eq!(reader.read_packet().await.unwrap().time, Duration::from_millis(40));
        assert_eq!(reader.read_packet().await, Err(Error::Eof));
    }

    #[tokio::test]
    async fn test_header_eof_propagates() {
        let queue = Queue::new();
        queue.close().await;

        let mut reader = FilterReader::new(queue.oldest(), Filters::new());
        assert_eq!(reader.read_packet().await, Err(Error::Eof));
    }

    #[tokio::test]
    async fn test_filter_error_propagates() {
        let queue = Queue::new();
        queue
            .write_header(vec![StreamDescriptor::new(CodecType::H264)])
            .await
            .unwrap();
        // Stream index 3 was never declared
        queue
            .write_packet(Packet::new(3, Duration::ZERO, false, Bytes::new()))
            .await
            .unwrap();

        let mut reader =
            FilterReader::new(queue.oldest(), Filters::new().with(crate::filter::AvSync::default()));
        assert_eq!(
            reader.read_packet().await,
            Err(Error::Filter(FilterError::StreamIndexOutOfRange { index: 3, streams: 1 }))
        );
    }
}
