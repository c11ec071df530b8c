//! Per-packet filter pipeline
//!
//! Filters sit between a queue cursor and a muxer. Each one may rewrite a
//! packet's time or ask for it to be dropped; none reorders packets.
//!
//! | Filter | Effect |
//! |---|---|
//! | [`WaitKeyFrame`] | drop everything before the first video key frame |
//! | [`FixTime`] | rebase to zero, force a monotonic timeline |
//! | [`AvSync`] | bound skew between streams |
//! | [`Walltime`] | deliver at playback speed |
//!
//! [`Filters`] runs an ordered list and stops at the first drop or error.
//! [`FilterReader`] applies a pipeline to any [`PacketReader`](crate::av::PacketReader).

pub mod avsync;
pub mod error;
pub mod fix_time;
pub mod keyframe;
pub mod reader;
pub mod walltime;

pub use avsync::{AvSync, DEFAULT_MAX_SKEW};
pub use error::FilterError;
pub use fix_time::FixTime;
pub use keyframe::WaitKeyFrame;
pub use reader::FilterReader;
pub use walltime::Walltime;

use crate::av::{Packet, StreamDescriptor};

/// Outcome of running a packet through a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterAction {
    /// Forward the (possibly modified) packet
    Pass,
    /// Do not forward this packet
    Drop,
}

/// Stream layout a filter sees alongside each packet
#[derive(Debug, Clone, Copy)]
pub struct StreamLayout<'a> {
    pub streams: &'a [StreamDescriptor],
    pub video_idx: Option<usize>,
    pub audio_idx: Option<usize>,
}

/// One stage of the pipeline
#[derive(Debug, Clone)]
pub enum Filter {
    WaitKeyFrame(WaitKeyFrame),
    FixTime(FixTime),
    AvSync(AvSync),
    Walltime(Walltime),
}

impl Filter {
    /// Run this stage on `pkt`
    pub async fn modify(
        &mut self,
        pkt: &mut Packet,
        layout: StreamLayout<'_>,
    ) -> Result<FilterAction, FilterError> {
        match self {
            Filter::WaitKeyFrame(f) => Ok(f.modify(pkt, layout.video_idx)),
            Filter::FixTime(f) => {
                f.modify(pkt);
                Ok(FilterAction::Pass)
            }
            Filter::AvSync(f) => f.modify(pkt, layout.streams),
            Filter::Walltime(f) => {
                f.modify(pkt).await;
                Ok(FilterAction::Pass)
            }
        }
    }
}

impl From<WaitKeyFrame> for Filter {
    fn from(f: WaitKeyFrame) -> Self {
        Filter::WaitKeyFrame(f)
    }
}

impl From<FixTime> for Filter {
    fn from(f: FixTime) -> Self {
        Filter::FixTime(f)
    }
}

impl From<AvSync> for Filter {
    fn from(f: AvSync) -> Self {
        Filter::AvSync(f)
    }
}

impl From<Walltime> for Filter {
    fn from(f: Walltime) -> Self {
        Filter::Walltime(f)
    }
}

/// Ordered filter pipeline
#[derive(Debug, Clone, Default)]
pub struct Filters {
    stages: Vec<Filter>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage
    pub fn with(mut self, filter: impl Into<Filter>) -> Self {
        self.stages.push(filter.into());
        self
    }

    /// Append a stage in place
    pub fn push(&mut self, filter: impl Into<Filter>) {
        self.stages.push(filter.into());
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage in order, stopping at the first drop or error
    pub async fn modify(
        &mut self,
        pkt: &mut Packet,
        layout: StreamLayout<'_>,
    ) -> Result<FilterAction, FilterError> {
        for stage in &mut self.stages {
            if stage.modify(pkt, layout).await? == FilterAction::Drop {
                return Ok(FilterAction::Drop);
            }
        }
        Ok(FilterAction::Pass)
    }
}

impl FromIterator<Filter> for Filters {
    fn from_iter<I: IntoIterator<Item = Filter>>(iter: I) -> Self {
        Self {
            stages: iter.into_iter().collect(),
        }
    }
}
