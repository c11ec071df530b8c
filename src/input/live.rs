//! Live input session
//!
//! A [`LiveInput`] owns the connection to one upstream source and keeps it
//! alive until closed. Each attempt gets a fresh receiver from the
//! [`Connector`]; any failure, graceful stop or end of the frame stream leads
//! to a fixed backoff and another attempt. Every frame received while
//! streaming is published to the input's [`LiveStream`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::av::{EsFrame, SourceParams};
use crate::registry::LiveStream;
use crate::stats::InputStats;

use super::config::LiveInputConfig;
use super::receiver::{Connector, Receiver, Signal};
use super::state::InputPhase;

#[derive(Debug, Default)]
struct Counters {
    connect_attempts: AtomicU64,
    connect_failures: AtomicU64,
    frames_received: AtomicU64,
    keyframes: AtomicU64,
    bytes_received: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> InputStats {
        InputStats {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            keyframes: self.keyframes.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
        }
    }
}

/// Producer session for one upstream source
pub struct LiveInput {
    connector: Arc<dyn Connector>,
    config: LiveInputConfig,
    phase: Arc<watch::Sender<InputPhase>>,
    counters: Arc<Counters>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl LiveInput {
    /// Create a session with default configuration
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self::with_config(connector, LiveInputConfig::default())
    }

    /// Create a session with custom configuration
    pub fn with_config(connector: Arc<dyn Connector>, config: LiveInputConfig) -> Self {
        let (phase, _) = watch::channel(InputPhase::Idle);
        Self {
            connector,
            config,
            phase: Arc::new(phase),
            counters: Arc::new(Counters::default()),
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    pub fn config(&self) -> &LiveInputConfig {
        &self.config
    }

    /// Start pulling `stream`'s source URI in a background task
    ///
    /// Only an idle session can be opened; later calls are ignored.
    pub fn open(&mut self, stream: Arc<LiveStream>) {
        let phase = *self.phase.borrow();
        if phase != InputPhase::Idle {
            tracing::warn!(stream_id = %stream.id(), phase = %phase, "Live input already opened");
            return;
        }

        let worker = Worker {
            uri: stream.uri().to_string(),
            stream,
            connector: Arc::clone(&self.connector),
            config: self.config.clone(),
            phase: Arc::clone(&self.phase),
            counters: Arc::clone(&self.counters),
            cancel: self.cancel.clone(),
        };
        worker.set_phase(InputPhase::Connecting);
        self.task = Some(tokio::spawn(worker.run()));
    }

    /// Stop retrying and streaming
    ///
    /// The current receiver is closed by the background task as soon as it
    /// observes the cancellation. Calling this again has no effect.
    pub fn close(&mut self) {
        let previous = self.phase.send_replace(InputPhase::Closed);
        if previous == InputPhase::Closed {
            return;
        }
        self.cancel.cancel();
        tracing::info!(phase = %previous, "Live input closed");
    }

    /// Wait for the background task to finish
    pub async fn join(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Live input task failed");
            }
        }
    }

    pub fn phase(&self) -> InputPhase {
        *self.phase.borrow()
    }

    /// Watch phase transitions
    pub fn watch_phase(&self) -> watch::Receiver<InputPhase> {
        self.phase.subscribe()
    }

    /// Opened and not yet closed
    pub fn is_opened(&self) -> bool {
        self.phase().is_active()
    }

    /// Currently receiving frames from the source
    pub fn is_receiving(&self) -> bool {
        self.phase() == InputPhase::Streaming
    }

    /// Waiting out the backoff before reconnecting
    pub fn is_retrying(&self) -> bool {
        self.phase() == InputPhase::Retrying
    }

    pub fn stats(&self) -> InputStats {
        self.counters.snapshot()
    }
}

impl Drop for LiveInput {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for LiveInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveInput")
            .field("config", &self.config)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

enum StreamEnd {
    Cancelled,
    Stopped,
    Failed(String),
    EndOfStream,
}

struct Worker {
    uri: String,
    stream: Arc<LiveStream>,
    connector: Arc<dyn Connector>,
    config: LiveInputConfig,
    phase: Arc<watch::Sender<InputPhase>>,
    counters: Arc<Counters>,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self) {
        while !self.cancel.is_cancelled() {
            self.set_phase(InputPhase::Connecting);
            self.counters.connect_attempts.fetch_add(1, Ordering::Relaxed);
            tracing::info!(stream_id = %self.stream.id(), uri = %self.uri, "Opening live input");

            let mut receiver = self.connector.connect(self.config.read_timeout);
            let (signal_tx, mut signals) = mpsc::unbounded_channel();
            let mut frames = receiver.open(&self.uri, self.stream.id(), signal_tx);

            let ready = tokio::select! {
                _ = self.cancel.cancelled() => {
                    receiver.close();
                    break;
                }
                ready = tokio::time::timeout(self.config.read_timeout, signals.recv()) => ready,
            };

            let failure = match ready {
                Ok(Some(Signal::Ready)) => None,
                Ok(Some(signal)) => Some(signal.to_string()),
                Ok(None) => Some("receiver dropped its signal channel".to_string()),
                Err(_) => Some("timed out waiting for readiness".to_string()),
            };
            if let Some(reason) = failure {
                self.counters.connect_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    stream_id = %self.stream.id(),
                    retry_ms = self.config.retry_interval.as_millis() as u64,
                    error = %reason,
                    "Source connect failed, will retry"
                );
                receiver.close();
                if !self.backoff().await {
                    break;
                }
                continue;
            }

            tracing::info!(stream_id = %self.stream.id(), "Source connected, receiving media");
            self.set_phase(InputPhase::Streaming);
            self.stream.source_restarted().await;

            let end = self
                .receive(receiver.as_mut(), &mut frames, &mut signals)
                .await;
            receiver.close();

            match end {
                StreamEnd::Cancelled => break,
                StreamEnd::Stopped => {
                    tracing::info!(stream_id = %self.stream.id(), "Source stopped (201)");
                }
                StreamEnd::Failed(error) => {
                    tracing::warn!(
                        stream_id = %self.stream.id(),
                        retry_ms = self.config.retry_interval.as_millis() as u64,
                        error = %error,
                        "Source failed (400), will retry"
                    );
                }
                StreamEnd::EndOfStream => {
                    tracing::info!(stream_id = %self.stream.id(), "Source frame stream ended");
                }
            }

            if !self.backoff().await {
                break;
            }
        }

        self.set_phase(InputPhase::Closed);
        tracing::debug!(stream_id = %self.stream.id(), "Live input task finished");
    }

    async fn receive(
        &self,
        receiver: &mut dyn Receiver,
        frames: &mut mpsc::Receiver<EsFrame>,
        signals: &mut mpsc::UnboundedReceiver<Signal>,
    ) -> StreamEnd {
        let mut signals_open = true;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return StreamEnd::Cancelled,
                frame = frames.recv() => match frame {
                    Some(frame) => {
                        let params = receiver.params();
                        self.handle_frame(frame, params).await;
                    }
                    None => return StreamEnd::EndOfStream,
                },
                signal = signals.recv(), if signals_open => match signal {
                    Some(Signal::Stopped) => return StreamEnd::Stopped,
                    Some(Signal::Failed(error)) => return StreamEnd::Failed(error),
                    Some(other) => {
                        tracing::debug!(
                            stream_id = %self.stream.id(),
                            status = other.status(),
                            "Ignoring receiver signal"
                        );
                    }
                    None => signals_open = false,
                },
            }
        }
    }

    async fn handle_frame(&self, frame: EsFrame, params: SourceParams) {
        self.counters.frames_received.fetch_add(1, Ordering::Relaxed);
        self.counters
            .bytes_received
            .fetch_add(frame.size() as u64, Ordering::Relaxed);
        if frame.is_keyframe {
            self.counters.keyframes.fetch_add(1, Ordering::Relaxed);
        }

        tracing::trace!(
            stream_id = %self.stream.id(),
            index = frame.index,
            keyframe = frame.is_keyframe,
            size = frame.size(),
            "Frame received"
        );

        self.stream.publish(frame, &params).await;
    }

    /// Sleep out the retry interval; false if cancelled meanwhile
    async fn backoff(&self) -> bool {
        self.set_phase(InputPhase::Retrying);
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.config.retry_interval) => true,
        }
    }

    /// Closed is terminal and never overwritten
    fn set_phase(&self, next: InputPhase) {
        self.phase.send_if_modified(|phase| {
            if *phase == InputPhase::Closed || *phase == next {
                return false;
            }
            *phase = next;
            true
        });
    }
}
