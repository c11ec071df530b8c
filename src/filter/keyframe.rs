//! Key frame gate

use crate::av::Packet;

use super::FilterAction;

/// Drops packets until the first video key frame arrives
///
/// One-shot: once the gate opens every later packet passes, key frame or not.
#[derive(Debug, Clone, Default)]
pub struct WaitKeyFrame {
    open: bool,
}

impl WaitKeyFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a key frame has been seen
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn modify(&mut self, pkt: &Packet, video_idx: Option<usize>) -> FilterAction {
        if !self.open && pkt.is_video_keyframe(video_idx) {
            self.open = true;
        }

        if self.open {
            FilterAction::Pass
        } else {
            FilterAction::Drop
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;

    fn packet(idx: usize, key: bool) -> Packet {
        Packet::new(idx, Duration::ZERO, key, Bytes::new())
    }

    #[test]
    fn test_drops_leading_packets_only() {
        let mut gate = WaitKeyFrame::new();
        let input = [
            packet(0, false),
            packet(1, false),
            packet(0, false),
            packet(0, true),
            packet(1, false),
            packet(0, false),
        ];

        let actions: Vec<FilterAction> = input.iter().map(|p| gate.modify(p, Some(0))).collect();
        assert_eq!(
            actions,
            vec![
                FilterAction::Drop,
                FilterAction::Drop,
                FilterAction::Drop,
                FilterAction::Pass,
                FilterAction::Pass,
                FilterAction::Pass,
            ]
        );
        assert!(gate.is_open());
    }

    #[test]
    fn test_keyframe_on_audio_stream_does_not_open() {
        let mut gate = WaitKeyFrame::new();

        assert_eq!(gate.modify(&packet(1, true), Some(0)), FilterAction::Drop);
        assert_eq!(gate.modify(&packet(0, true), None), FilterAction::Drop);
        assert!(!gate.is_open());
    }
}
