//! Real-time pacing, the equivalent of `ffmpeg -re`

use tokio::time::Instant;

use crate::av::Packet;

/// Delays packets so that stream 0 is delivered at playback speed
///
/// The wall-clock reference is latched on the first packet of stream 0.
/// Packets of other streams are never delayed.
#[derive(Debug, Clone, Default)]
pub struct Walltime {
    first: Option<Instant>,
}

impl Walltime {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn modify(&mut self, pkt: &Packet) {
        if pkt.idx != 0 {
            return;
        }

        let first = *self.first.get_or_insert_with(Instant::now);
        let deadline = first + pkt.time;
        if deadline > Instant::now() {
            tokio::time::sleep_until(deadline).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;

    fn packet(idx: usize, ms: u64) -> Packet {
        Packet::new(idx, Duration::from_millis(ms), false, Bytes::new())
    }

    #[tokio::test(start_paused = true)]
    async fn test_paces_to_packet_time() {
        let mut pacer = Walltime::new();
        let start = Instant::now();

        pacer.modify(&packet(0, 0)).await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        pacer.modify(&packet(0, 400)).await;
        assert_eq!(start.elapsed(), Duration::from_millis(400));

        pacer.modify(&packet(0, 1000)).await;
        assert_eq!(start.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_packets_not_delayed() {
        let mut pacer = Walltime::new();
        let start = Instant::now();

        pacer.modify(&packet(0, 0)).await;
        tokio::time::advance(Duration::from_millis(500)).await;

        pacer.modify(&packet(0, 200)).await;
        assert_eq!(start.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_streams_pass_through() {
        let mut pacer = Walltime::new();
        let start = Instant::now();

        pacer.modify(&packet(1, 5000)).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
