//! Media data model
//!
//! This module provides:
//! - [`Packet`]: timed, opaque media packet stored by the pub/sub queue
//! - [`StreamDescriptor`]: per-stream codec metadata declared once per queue
//! - [`EsFrame`]: elementary-stream frame emitted by receivers
//! - [`SourceParams`]: resolution, parameter sets and frame rate seen by a receiver
//! - [`PacketReader`]: the read side shared by queue cursors and filter readers

pub mod frame;
pub mod packet;

use std::future::Future;

pub use frame::{EsFrame, SourceParams};
pub use packet::{audio_index, video_index, CodecType, MediaType, Packet, StreamDescriptor};

use crate::error::Result;

/// Source of packets for a muxer
///
/// Implemented by [`QueueCursor`](crate::pubsub::QueueCursor) and by
/// [`FilterReader`](crate::filter::FilterReader), so filters can be stacked in
/// front of any cursor. Both methods return [`Error::Eof`](crate::Error::Eof)
/// once the source is closed and drained.
pub trait PacketReader: Send {
    /// Wait for the stream descriptors
    fn streams(&mut self) -> impl Future<Output = Result<Vec<StreamDescriptor>>> + Send;

    /// Wait for the next packet
    fn read_packet(&mut self) -> impl Future<Output = Result<Packet>> + Send;
}
