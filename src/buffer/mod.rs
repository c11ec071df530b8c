//! Unsynchronized building blocks owned by the pub/sub queue
//!
//! - [`RingBuffer`]: growable circular packet store with wrapping positions
//! - [`Timeline`]: buffered-duration accounting over non-overlapping segments

pub mod ring;
pub mod timeline;

pub use ring::{BufPos, RingBuffer, DEFAULT_CAPACITY};
pub use timeline::Timeline;
