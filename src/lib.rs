//! mserver-rs: live elementary-stream ingest and fan-out
//!
//! This crate is the distribution core of a live media server. A camera or
//! upstream source is pulled by a [`LiveInput`](input::LiveInput) session,
//! which survives source disconnects with a fixed-backoff retry loop. Frames
//! reach consumers along two paths:
//!
//! - **Direct viewers** registered in the [`StreamPool`](registry::StreamPool)
//!   receive every frame through a one-slot channel. A slow viewer loses frames
//!   instead of stalling the producer.
//! - **Muxers** read packets from a GOP-retaining [`Queue`](pubsub::Queue)
//!   through independent [`QueueCursor`](pubsub::QueueCursor)s, optionally via a
//!   [`FilterReader`](filter::FilterReader) that repairs timestamps, keeps A/V
//!   in sync and paces output to wall-clock time.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use bytes::Bytes;
//! use mserver::av::{CodecType, Packet, PacketReader, StreamDescriptor};
//! use mserver::pubsub::{CursorStart, Queue};
//!
//! # async fn example() -> mserver::Result<()> {
//! let queue = Queue::new();
//! queue
//!     .write_header(vec![StreamDescriptor::new(CodecType::H264)])
//!     .await?;
//!
//! let mut cursor = queue.cursor(CursorStart::Oldest);
//! queue
//!     .write_packet(Packet::new(0, Duration::ZERO, true, Bytes::from_static(b"idr")))
//!     .await?;
//!
//! let pkt = cursor.read_packet().await?;
//! assert!(pkt.is_keyframe);
//! # Ok(())
//! # }
//! ```

pub mod av;
pub mod buffer;
pub mod error;
pub mod filter;
pub mod input;
pub mod pubsub;
pub mod registry;
pub mod stats;

pub use error::{Error, Result};
pub use input::{LiveInput, LiveInputConfig};
pub use pubsub::{CursorStart, Queue, QueueConfig, QueueCursor};
pub use registry::StreamPool;
