//! Upstream ingest
//!
//! A [`LiveInput`] pulls one source through an external [`Receiver`] and
//! publishes what it gets to a [`LiveStream`](crate::registry::LiveStream).
//!
//! ```text
//!              Connector::connect()
//!                      │
//!                      ▼
//!   ┌──────────────── Receiver ────────────────┐
//!   │ signals: 200 ready / 201 stop / 400 fail │
//!   │ frames:  EsFrame ... (closed = EOS)      │
//!   └───────┬───────────────────────┬──────────┘
//!           │                       │
//!           ▼                       ▼
//!      LiveInput task ──publish──► LiveStream ──► viewers / queue
//!           │
//!           └─ on failure: close receiver, sleep retry_interval, reconnect
//! ```
//!
//! The loop only ends when the session is closed.

pub mod config;
pub mod live;
pub mod receiver;
pub mod state;

pub use config::{LiveInputConfig, DEFAULT_READ_TIMEOUT, DEFAULT_RETRY_INTERVAL};
pub use live::LiveInput;
pub use receiver::{Connector, Receiver, Signal, STATUS_FAILED, STATUS_READY, STATUS_STOPPED};
pub use state::InputPhase;
