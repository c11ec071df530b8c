//! Live stream record
//!
//! One [`LiveStream`] exists per ingested source. The stream's live input is
//! its only writer: every frame updates the published snapshot, is offered to
//! each direct viewer and, if a queue is attached, is appended to it.
//!
//! ```text
//!   LiveInput ──publish(frame)──► LiveStream
//!                                   ├─ watch<StreamSnapshot> ──► status readers
//!                                   ├─ viewers (try_send)    ──► viewer tasks
//!                                   └─ queue sink            ──► Queue ──► cursors
//! ```
//!
//! Fan-out never waits: a viewer whose slot is still full misses the frame.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, Mutex, RwLock};

use crate::av::{CodecType, EsFrame, Packet, SourceParams, StreamDescriptor};
use crate::pubsub::Queue;
use crate::stats::ViewerStats;

use super::config::RegistryConfig;
use super::error::RegistryError;
use super::output::{normalize_protocol, Output};

/// Clock rate of [`EsFrame::timestamp`]
pub const ES_CLOCK_RATE: u64 = 90_000;

const START_CODE: [u8; 4] = [0, 0, 0, 1];

/// Immutable view of a live stream, replaced on every frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSnapshot {
    pub width: u32,
    pub height: u32,
    pub sps: Bytes,
    pub pps: Bytes,
    /// SDP `a=fmtp` value announced by the source, empty if none
    pub fmtp: String,
    pub fps: u32,
    /// Index of the last frame received
    pub index: u64,
    /// Most recent key frame, for viewers that join mid-GOP
    pub key_frame: Option<EsFrame>,
}

/// A direct viewer registered on a live stream
#[derive(Debug)]
pub struct ViewerSession {
    session_id: String,
    protocol: String,
    tx: mpsc::Sender<EsFrame>,
    delivered: AtomicU64,
    skipped: AtomicU64,
}

enum Delivery {
    Sent,
    /// Slot full; carries the viewer's running skip count
    Skipped(u64),
    Closed,
}

impl ViewerSession {
    fn new(session_id: &str, protocol: &str, tx: mpsc::Sender<EsFrame>) -> Self {
        Self {
            session_id: session_id.to_string(),
            protocol: protocol.to_string(),
            tx,
            delivered: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Whether the viewer has dropped its receiver
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn stats(&self) -> ViewerStats {
        ViewerStats {
            session_id: self.session_id.clone(),
            protocol: self.protocol.clone(),
            frames_delivered: self.delivered.load(Ordering::Relaxed),
            frames_skipped: self.skipped.load(Ordering::Relaxed),
        }
    }

    fn offer(&self, frame: &EsFrame) -> Delivery {
        match self.tx.try_send(frame.clone()) {
            Ok(()) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                Delivery::Sent
            }
            Err(TrySendError::Full(_)) => {
                Delivery::Skipped(self.skipped.fetch_add(1, Ordering::Relaxed) + 1)
            }
            Err(TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}

/// Converts frames to packets for an attached queue
struct QueueSink {
    queue: Queue,
    header_written: bool,
    last_ts: Option<u32>,
    ticks: u64,
    /// Set when the source reconnected; its timestamp base is unrelated
    resync: bool,
}

impl QueueSink {
    fn new(queue: Queue) -> Self {
        Self {
            queue,
            header_written: false,
            last_ts: None,
            ticks: 0,
            resync: false,
        }
    }

    fn resync(&mut self) {
        self.last_ts = None;
        self.resync = self.header_written;
    }

    async fn write(&mut self, frame: &EsFrame, params: &SourceParams) -> crate::Result<()> {
        if !self.header_written {
            let config = annexb_config(params);
            self.queue
                .write_header(vec![StreamDescriptor::with_config(CodecType::H264, config)])
                .await?;
            self.header_written = true;
        }

        // Source timestamps wrap at 32 bits; backward steps add nothing
        if let Some(last) = self.last_ts {
            let step = frame.timestamp.wrapping_sub(last) as i32;
            self.ticks += step.max(0) as u64;
        } else if self.resync {
            self.ticks += frame_ticks(params.fps);
            self.resync = false;
        }
        self.last_ts = Some(frame.timestamp);

        let time = Duration::from_micros(self.ticks * 1_000_000 / ES_CLOCK_RATE);
        self.queue
            .write_packet(Packet::new(0, time, frame.is_keyframe, frame.data.clone()))
            .await
    }
}

/// One nominal frame interval in [`ES_CLOCK_RATE`] ticks
fn frame_ticks(fps: u32) -> u64 {
    if fps == 0 {
        0
    } else {
        ES_CLOCK_RATE / fps as u64
    }
}

fn annexb_config(params: &SourceParams) -> Bytes {
    let mut buf = BytesMut::with_capacity(2 * START_CODE.len() + params.sps.len() + params.pps.len());
    for nal in [&params.sps, &params.pps] {
        if !nal.is_empty() {
            buf.put_slice(&START_CODE);
            buf.put_slice(nal);
        }
    }
    buf.freeze()
}

/// Shared record of one live source
pub struct LiveStream {
    id: String,
    uri: String,
    config: RegistryConfig,
    snapshot: watch::Sender<StreamSnapshot>,
    viewers: RwLock<HashMap<String, ViewerSession>>,
    outputs: RwLock<HashMap<String, Output>>,
    sink: Mutex<Option<QueueSink>>,
}

impl LiveStream {
    pub fn new(id: impl Into<String>, uri: impl Into<String>, config: RegistryConfig) -> Self {
        let (snapshot, _) = watch::channel(StreamSnapshot::default());
        Self {
            id: id.into(),
            uri: uri.into(),
            config,
            snapshot,
            viewers: RwLock::new(HashMap::new()),
            outputs: RwLock::new(HashMap::new()),
            sink: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Source URI the live input pulls from
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Current snapshot
    pub fn snapshot(&self) -> StreamSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Watch for snapshot changes
    pub fn subscribe(&self) -> watch::Receiver<StreamSnapshot> {
        self.snapshot.subscribe()
    }

    /// Record a frame from the live input and distribute it
    ///
    /// Returns the number of viewers the frame was handed to.
    pub async fn publish(&self, frame: EsFrame, params: &SourceParams) -> usize {
        self.snapshot.send_modify(|snap| {
            snap.width = params.width;
            snap.height = params.height;
            snap.sps = params.sps.clone();
            snap.pps = params.pps.clone();
            if snap.fmtp != params.fmtp {
                snap.fmtp = params.fmtp.clone();
            }
            snap.fps = params.fps;
            snap.index = frame.index;
            if frame.is_keyframe {
                snap.key_frame = Some(frame.clone());
            }
        });

        {
            let mut sink = self.sink.lock().await;
            if let Some(s) = sink.as_mut() {
                if s.write(&frame, params).await.is_err() {
                    tracing::debug!(stream_id = %self.id, "Attached queue closed, detaching");
                    *sink = None;
                }
            }
        }

        self.fan_out(&frame).await
    }

    async fn fan_out(&self, frame: &EsFrame) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        {
            let viewers = self.viewers.read().await;
            for (id, viewer) in viewers.iter() {
                match viewer.offer(frame) {
                    Delivery::Sent => delivered += 1,
                    Delivery::Skipped(total) => {
                        if total % self.config.drop_log_interval == 0 {
                            tracing::warn!(
                                stream_id = %self.id,
                                session_id = %id,
                                protocol = %viewer.protocol,
                                skipped = total,
                                "Viewer not keeping up, frames skipped"
                            );
                        }
                    }
                    Delivery::Closed => closed.push(id.clone()),
                }
            }
        }

        if !closed.is_empty() {
            let mut viewers = self.viewers.write().await;
            for id in closed {
                // The id may have been re-registered since the read pass
                if viewers.get(&id).is_some_and(ViewerSession::is_closed) {
                    viewers.remove(&id);
                    tracing::debug!(stream_id = %self.id, session_id = %id, "Viewer gone, removed");
                }
            }
        }

        delivered
    }

    /// Register a direct viewer and return its inbound frame channel
    pub async fn add_viewer(
        &self,
        session_id: &str,
        protocol: &str,
    ) -> Result<mpsc::Receiver<EsFrame>, RegistryError> {
        let mut viewers = self.viewers.write().await;
        if viewers.contains_key(session_id) {
            return Err(RegistryError::SessionAlreadyExists {
                stream_id: self.id.clone(),
                session_id: session_id.to_string(),
            });
        }

        let (tx, rx) = mpsc::channel(self.config.viewer_slot_capacity);
        viewers.insert(
            session_id.to_string(),
            ViewerSession::new(session_id, protocol, tx),
        );

        tracing::info!(
            stream_id = %self.id,
            session_id = session_id,
            protocol = protocol,
            viewers = viewers.len(),
            "Viewer added"
        );

        Ok(rx)
    }

    /// Remove a viewer; its receiver observes the channel closing
    pub async fn remove_viewer(&self, session_id: &str) -> Result<(), RegistryError> {
        let mut viewers = self.viewers.write().await;
        if viewers.remove(session_id).is_none() {
            return Err(RegistryError::SessionNotFound {
                stream_id: self.id.clone(),
                session_id: session_id.to_string(),
            });
        }

        tracing::info!(
            stream_id = %self.id,
            session_id = session_id,
            viewers = viewers.len(),
            "Viewer removed"
        );
        Ok(())
    }

    /// Remove every viewer using `protocol` (case-insensitive)
    pub async fn remove_viewers_by_protocol(&self, protocol: &str) -> usize {
        let mut viewers = self.viewers.write().await;
        let before = viewers.len();
        viewers.retain(|_, v| !v.protocol.eq_ignore_ascii_case(protocol));
        let removed = before - viewers.len();

        if removed > 0 {
            tracing::info!(
                stream_id = %self.id,
                protocol = protocol,
                removed = removed,
                "Viewers removed by protocol"
            );
        }
        removed
    }

    pub async fn viewer_count(&self) -> usize {
        self.viewers.read().await.len()
    }

    pub async fn viewer_stats(&self) -> Vec<ViewerStats> {
        self.viewers
            .read()
            .await
            .values()
            .map(ViewerSession::stats)
            .collect()
    }

    /// Declare an output for `protocol`
    ///
    /// The protocol must be one of [`OUTPUT_PROTOCOLS`](super::OUTPUT_PROTOCOLS)
    /// and may be declared once.
    pub async fn add_output(&self, protocol: &str, enabled: bool) -> Result<(), RegistryError> {
        let output = Output::new(protocol, enabled)?;
        let mut outputs = self.outputs.write().await;
        if outputs.contains_key(&output.protocol) {
            return Err(RegistryError::OutputAlreadyExists {
                stream_id: self.id.clone(),
                protocol: output.protocol,
            });
        }

        tracing::info!(
            stream_id = %self.id,
            protocol = %output.protocol,
            enabled = enabled,
            "Output added"
        );
        outputs.insert(output.protocol.clone(), output);
        Ok(())
    }

    pub async fn remove_output(&self, protocol: &str) -> Result<(), RegistryError> {
        let key = protocol.to_ascii_lowercase();
        if self.outputs.write().await.remove(&key).is_none() {
            return Err(RegistryError::OutputNotFound {
                stream_id: self.id.clone(),
                protocol: key,
            });
        }

        tracing::info!(stream_id = %self.id, protocol = %key, "Output removed");
        Ok(())
    }

    /// Whether an enabled output is declared for `protocol`
    pub async fn has_output(&self, protocol: &str) -> bool {
        let Ok(key) = normalize_protocol(protocol) else {
            return false;
        };
        self.outputs
            .read()
            .await
            .get(&key)
            .is_some_and(|o| o.enabled)
    }

    /// Declared outputs, sorted by protocol
    pub async fn outputs(&self) -> Vec<Output> {
        let mut outputs: Vec<Output> = self.outputs.read().await.values().cloned().collect();
        outputs.sort_by(|a, b| a.protocol.cmp(&b.protocol));
        outputs
    }

    /// Mirror every published frame into `queue`
    ///
    /// Frames become packets on stream 0 with times derived from the
    /// [`ES_CLOCK_RATE`] timestamps. The header is written on the first frame.
    pub async fn attach_queue(&self, queue: Queue) {
        *self.sink.lock().await = Some(QueueSink::new(queue));
        tracing::debug!(stream_id = %self.id, "Queue attached");
    }

    /// Start a new timestamp base for the attached queue
    ///
    /// Called when the source reconnects. The next frame is placed one
    /// nominal frame interval after the last packet, whatever its raw
    /// timestamp.
    pub async fn source_restarted(&self) {
        if let Some(sink) = self.sink.lock().await.as_mut() {
            sink.resync();
        }
    }

    /// The attached queue, if any
    pub async fn queue(&self) -> Option<Queue> {
        self.sink.lock().await.as_ref().map(|s| s.queue.clone())
    }

    /// Close the attached queue and drop every viewer
    pub async fn close(&self) {
        if let Some(sink) = self.sink.lock().await.take() {
            sink.queue.close().await;
        }
        let dropped = {
            let mut viewers = self.viewers.write().await;
            let n = viewers.len();
            viewers.clear();
            n
        };
        tracing::info!(stream_id = %self.id, viewers = dropped, "Live stream closed");
    }
}

impl std::fmt::Debug for LiveStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveStream")
            .field("id", &self.id)
            .field("uri", &self.uri)
            .finish_non_exhaustive()
    }
}
