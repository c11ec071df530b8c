//! Ingest-and-relay demo with a synthetic camera
//!
//! Run with: cargo run --example relay_demo [SECONDS]
//!
//! A fake receiver produces 25fps H.264-shaped frames with a key frame every
//! second, and fails once after five seconds to exercise the reconnect loop.
//! Two consumers run side by side:
//!
//! - a direct viewer that is deliberately slow, so some frames are skipped;
//! - a muxer reading the GOP queue through a keyframe gate, timestamp repair
//!   and wall-clock pacing.
//!
//! Set `RUST_LOG=mserver=trace` to see every frame.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;

use mserver::av::{EsFrame, PacketReader, SourceParams};
use mserver::filter::{FilterReader, Filters, FixTime, WaitKeyFrame, Walltime};
use mserver::input::{Connector, LiveInput, Receiver, Signal};
use mserver::pubsub::Queue;
use mserver::registry::ES_CLOCK_RATE;
use mserver::{Error, StreamPool};

const FPS: u32 = 25;
const FAIL_AFTER_FRAMES: u64 = 5 * FPS as u64;

/// Synthetic source standing in for an RTSP pull
struct FakeCamera {
    task: Option<tokio::task::JoinHandle<()>>,
    fail: bool,
}

impl Receiver for FakeCamera {
    fn open(
        &mut self,
        uri: &str,
        stream_id: &str,
        signals: mpsc::UnboundedSender<Signal>,
    ) -> mpsc::Receiver<EsFrame> {
        println!("[{}] fake camera connecting to {}", stream_id, uri);
        let (tx, rx) = mpsc::channel(4);
        let fail = self.fail;

        self.task = Some(tokio::spawn(async move {
            let _ = signals.send(Signal::Ready);
            let mut ticker = tokio::time::interval(Duration::from_secs(1) / FPS);
            let ticks_per_frame = (ES_CLOCK_RATE / FPS as u64) as u32;

            for index in 0u64.. {
                ticker.tick().await;
                if fail && index == FAIL_AFTER_FRAMES {
                    let _ = signals.send(Signal::Failed("simulated network drop".into()));
                    return;
                }

                let key = index % FPS as u64 == 0;
                let nal_type = if key { 0x65 } else { 0x41 };
                let frame = EsFrame {
                    data: Bytes::from(vec![0, 0, 0, 1, nal_type, index as u8]),
                    timestamp: (index as u32).wrapping_mul(ticks_per_frame),
                    is_keyframe: key,
                    index,
                };
                if tx.send(frame).await.is_err() {
                    return;
                }
            }
        }));
        rx
    }

    fn params(&self) -> SourceParams {
        SourceParams {
            width: 1280,
            height: 720,
            sps: Bytes::from_static(&[0x67, 0x42, 0xc0, 0x1f]),
            pps: Bytes::from_static(&[0x68, 0xce, 0x3c, 0x80]),
            fmtp: "96 packetization-mode=1;profile-level-id=42c01f".into(),
            fps: FPS,
        }
    }

    fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// First connection fails after a while, later ones run forever
struct FakeConnector {
    attempts: std::sync::atomic::AtomicU64,
}

impl Connector for FakeConnector {
    fn connect(&self, _read_timeout: Duration) -> Box<dyn Receiver> {
        let attempt = self
            .attempts
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Box::new(FakeCamera {
            task: None,
            fail: attempt == 0,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let seconds: u64 = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 10,
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mserver=info".parse()?)
                .add_directive("relay_demo=debug".parse()?),
        )
        .init();

    let pool = Arc::new(StreamPool::new());
    let stream = pool.add_stream("cam1", "rtsp://127.0.0.1:8554/cam1").await?;

    pool.add_output("cam1", "rtsp", true).await?;

    let queue = Queue::new();
    stream.attach_queue(queue.clone()).await;

    // Direct viewer that only keeps up with every other frame
    let mut viewer = pool.add_session("cam1", "viewer-1", "rtsp").await?;
    let viewer_task = tokio::spawn(async move {
        let mut received = 0u64;
        while let Some(frame) = viewer.recv().await {
            received += 1;
            tracing::debug!(index = frame.index, keyframe = frame.is_keyframe, "Viewer got frame");
            tokio::time::sleep(Duration::from_millis(70)).await;
        }
        received
    });

    // Muxer: latest two GOPs, paced to real time
    let filters = Filters::new()
        .with(WaitKeyFrame::new())
        .with(FixTime::new(true, true))
        .with(Walltime::new());
    let mut muxer = FilterReader::new(queue.delayed_gop_count(1), filters);
    let muxer_task = tokio::spawn(async move {
        let mut packets = 0u64;
        loop {
            match muxer.read_packet().await {
                Ok(pkt) => {
                    packets += 1;
                    tracing::trace!(time_ms = pkt.time.as_millis() as u64, "Muxer packet");
                }
                Err(Error::Eof) => break,
                Err(e) => {
                    tracing::error!(error = %e, "Muxer stopped");
                    break;
                }
            }
        }
        packets
    });

    let connector = Arc::new(FakeConnector {
        attempts: std::sync::atomic::AtomicU64::new(0),
    });
    pool.attach_input("cam1", LiveInput::new(connector)).await?;

    println!("Relaying for {}s (Ctrl+C to stop early)", seconds);
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(seconds)) => {}
        _ = tokio::signal::ctrl_c() => println!("\nShutting down..."),
    }

    let input_stats = pool.input_stats("cam1").await?;
    let viewer_stats = stream.viewer_stats().await;
    let queue_stats = queue.stats().await;
    pool.close_all().await;

    let viewed = viewer_task.await?;
    let muxed = muxer_task.await?;

    println!();
    if let Some(stats) = input_stats {
        println!(
            "Input:  attempts={} frames={} keyframes={} bytes={}",
            stats.connect_attempts, stats.frames_received, stats.keyframes, stats.bytes_received
        );
    }
    for stats in viewer_stats {
        println!(
            "Viewer: {} delivered={} skipped={} ({:.0}% skipped), drained={}",
            stats.session_id,
            stats.frames_delivered,
            stats.frames_skipped,
            stats.skip_ratio() * 100.0,
            viewed
        );
    }
    println!(
        "Queue:  buffered={} packets, {} GOPs, span={:?}",
        queue_stats.packet_count,
        queue_stats.gop_count,
        queue_stats.buffered
    );
    println!("Muxer:  {} packets", muxed);

    Ok(())
}
