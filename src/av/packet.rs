//! Packets and stream descriptors
//!
//! A [`Packet`] is the unit the pub/sub queue stores and the filters rewrite.
//! The payload is opaque: nothing in this crate parses it. The only codec
//! fact the core inspects is whether a stream carries video or audio.

use std::time::Duration;

use bytes::Bytes;

/// Media kind of an elementary stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Video,
    Audio,
}

/// Codec carried by an elementary stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecType {
    /// H.264 / AVC
    H264,
    /// H.265 / HEVC
    H265,
    /// AAC (any profile)
    Aac,
    /// G.711 mu-law
    PcmMulaw,
    /// G.711 A-law
    PcmAlaw,
    Speex,
    Nellymoser,
}

impl CodecType {
    /// Media kind of this codec
    pub fn media_type(&self) -> MediaType {
        match self {
            CodecType::H264 | CodecType::H265 => MediaType::Video,
            CodecType::Aac
            | CodecType::PcmMulaw
            | CodecType::PcmAlaw
            | CodecType::Speex
            | CodecType::Nellymoser => MediaType::Audio,
        }
    }

    pub fn is_video(&self) -> bool {
        self.media_type() == MediaType::Video
    }

    pub fn is_audio(&self) -> bool {
        self.media_type() == MediaType::Audio
    }
}

impl std::fmt::Display for CodecType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CodecType::H264 => "H.264",
            CodecType::H265 => "H.265",
            CodecType::Aac => "AAC",
            CodecType::PcmMulaw => "PCM mu-law",
            CodecType::PcmAlaw => "PCM A-law",
            CodecType::Speex => "Speex",
            CodecType::Nellymoser => "Nellymoser",
        };
        f.write_str(name)
    }
}

/// Per-stream codec metadata declared by a writer
///
/// `config` holds the codec's out-of-band configuration record (for example
/// an AVCDecoderConfigurationRecord). It is carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    /// Codec of the stream
    pub codec: CodecType,
    /// Opaque codec configuration
    pub config: Bytes,
}

impl StreamDescriptor {
    /// Create a descriptor with no configuration record
    pub fn new(codec: CodecType) -> Self {
        Self {
            codec,
            config: Bytes::new(),
        }
    }

    /// Create a descriptor with a configuration record
    pub fn with_config(codec: CodecType, config: Bytes) -> Self {
        Self { codec, config }
    }

    pub fn media_type(&self) -> MediaType {
        self.codec.media_type()
    }
}

/// Index of the first video stream, if any
pub fn video_index(streams: &[StreamDescriptor]) -> Option<usize> {
    streams.iter().position(|s| s.codec.is_video())
}

/// Index of the first audio stream, if any
pub fn audio_index(streams: &[StreamDescriptor]) -> Option<usize> {
    streams.iter().position(|s| s.codec.is_audio())
}

/// A timed media packet
///
/// Cheap to clone: the payload is reference counted, so every reader gets
/// its own `Packet` value sharing one allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Index into the stream descriptor list
    pub idx: usize,
    /// Presentation time since stream start
    pub time: Duration,
    /// Composition offset (PTS - DTS) for streams with B-frames
    pub composition_time: Duration,
    /// Video key frame (IDR) flag
    pub is_keyframe: bool,
    /// Encoded payload
    pub data: Bytes,
}

impl Packet {
    /// Create a packet with zero composition offset
    pub fn new(idx: usize, time: Duration, is_keyframe: bool, data: Bytes) -> Self {
        Self {
            idx,
            time,
            composition_time: Duration::ZERO,
            is_keyframe,
            data,
        }
    }

    /// Payload size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// True if this packet is a key frame on the given video stream
    pub fn is_video_keyframe(&self, video_idx: Option<usize>) -> bool {
        self.is_keyframe && Some(self.idx) == video_idx
    }
}

impl Default for Packet {
    fn default() -> Self {
        Self::new(0, Duration::ZERO, false, Bytes::new())
    }
}
