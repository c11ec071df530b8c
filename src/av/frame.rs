//! Elementary-stream frames
//!
//! Frames are what receivers emit and what direct viewers consume. Unlike a
//! [`Packet`](super::Packet) a frame carries the receiver's running frame
//! index and a 90kHz-style integer timestamp straight from the source.

use bytes::Bytes;

/// A single H.264 access unit as produced by a receiver
///
/// This is designed to be cheap to clone due to `Bytes` reference counting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EsFrame {
    /// Annex-B payload (zero-copy via reference counting)
    pub data: Bytes,
    /// Source timestamp
    pub timestamp: u32,
    /// Whether this is an IDR frame
    pub is_keyframe: bool,
    /// Monotonic frame index assigned by the receiver
    pub index: u64,
}

impl EsFrame {
    /// Create a key frame
    pub fn keyframe(index: u64, timestamp: u32, data: Bytes) -> Self {
        Self {
            data,
            timestamp,
            is_keyframe: true,
            index,
        }
    }

    /// Create a non-key frame
    pub fn delta(index: u64, timestamp: u32, data: Bytes) -> Self {
        Self {
            data,
            timestamp,
            is_keyframe: false,
            index,
        }
    }

    /// Payload size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Stream parameters a receiver has extracted from the bitstream so far
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceParams {
    pub width: u32,
    pub height: u32,
    /// H.264 sequence parameter set
    pub sps: Bytes,
    /// H.264 picture parameter set
    pub pps: Bytes,
    /// SDP `a=fmtp` value, empty when the source announced none
    pub fmtp: String,
    /// Estimated frame rate
    pub fps: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let key = EsFrame::keyframe(7, 9000, Bytes::from_static(&[0, 0, 0, 1, 0x65]));
        assert!(key.is_keyframe);
        assert_eq!(key.index, 7);
        assert_eq!(key.size(), 5);

        let delta = EsFrame::delta(8, 12000, Bytes::new());
        assert!(!delta.is_keyframe);
        assert_eq!(delta.timestamp, 12000);
    }
}
