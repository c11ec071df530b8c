//! Upstream receiver contract
//!
//! Protocol receivers (RTSP pull, GB28181, raw RTP) live outside this crate.
//! A [`LiveInput`](super::LiveInput) drives them through [`Receiver`] and
//! creates a fresh one for every connection attempt via a [`Connector`].

use std::time::Duration;

use tokio::sync::mpsc;

use crate::av::{EsFrame, SourceParams};

/// Status code of [`Signal::Ready`]
pub const STATUS_READY: u16 = 200;
/// Status code of [`Signal::Stopped`]
pub const STATUS_STOPPED: u16 = 201;
/// Status code of [`Signal::Failed`]
pub const STATUS_FAILED: u16 = 400;

/// Protocol signal from a receiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// Connected, frames will follow (200)
    Ready,
    /// Source stopped gracefully (201)
    Stopped,
    /// Fatal error; the input reconnects after its backoff (400)
    Failed(String),
    /// Any other status, ignored while streaming
    Other(u16),
}

impl Signal {
    /// Build a signal from a numeric status and optional error text
    pub fn from_status(status: u16, error: Option<String>) -> Self {
        match status {
            STATUS_READY => Signal::Ready,
            STATUS_STOPPED => Signal::Stopped,
            STATUS_FAILED => Signal::Failed(error.unwrap_or_default()),
            other => Signal::Other(other),
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            Signal::Ready => STATUS_READY,
            Signal::Stopped => STATUS_STOPPED,
            Signal::Failed(_) => STATUS_FAILED,
            Signal::Other(status) => *status,
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::Failed(msg) if !msg.is_empty() => write!(f, "{} ({})", self.status(), msg),
            _ => write!(f, "{}", self.status()),
        }
    }
}

/// One upstream connection
pub trait Receiver: Send {
    /// Start connecting to `uri`
    ///
    /// The receiver reports readiness and later protocol events on
    /// `signals`. Frames arrive on the returned channel; the channel closing
    /// marks the end of the stream.
    fn open(
        &mut self,
        uri: &str,
        stream_id: &str,
        signals: mpsc::UnboundedSender<Signal>,
    ) -> mpsc::Receiver<EsFrame>;

    /// Parameters extracted from the bitstream so far
    fn params(&self) -> SourceParams;

    /// Stop receiving and release the connection
    fn close(&mut self);
}

/// Creates a receiver for each connection attempt
pub trait Connector: Send + Sync {
    /// `read_timeout` bounds how long the receiver may wait on the network
    fn connect(&self, read_timeout: Duration) -> Box<dyn Receiver>;
}

impl<F> Connector for F
where
    F: Fn(Duration) -> Box<dyn Receiver> + Send + Sync,
{
    fn connect(&self, read_timeout: Duration) -> Box<dyn Receiver> {
        self(read_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_status_codes() {
        assert_eq!(Signal::from_status(200, None), Signal::Ready);
        assert_eq!(Signal::from_status(201, None), Signal::Stopped);
        assert_eq!(
            Signal::from_status(400, Some("timeout".into())),
            Signal::Failed("timeout".into())
        );
        assert_eq!(Signal::from_status(302, None), Signal::Other(302));

        assert_eq!(Signal::Failed(String::new()).status(), 400);
        assert_eq!(Signal::Other(503).status(), 503);
    }

    #[test]
    fn test_signal_display() {
        assert_eq!(Signal::Ready.to_string(), "200");
        assert_eq!(Signal::Failed("no route".into()).to_string(), "400 (no route)");
        assert_eq!(Signal::Failed(String::new()).to_string(), "400");
    }
}
