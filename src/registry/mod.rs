//! Live stream registry and direct viewer fan-out
//!
//! The pool maps stream ids to [`LiveStream`] records. Each record is written
//! by exactly one live input and read by any number of viewers.
//!
//! # Architecture
//!
//! ```text
//!                           StreamPool
//!                  ┌───────────────────────────┐
//!                  │ streams: HashMap<id, {    │
//!                  │   stream: Arc<LiveStream>,│
//!                  │   input:  LiveInput,      │
//!                  │ }>                        │
//!                  └─────────────┬─────────────┘
//!                                │
//!          LiveInput ──publish──►│ LiveStream
//!                                ├─ watch<StreamSnapshot>
//!                                ├─ outputs: HashMap<protocol, Output>
//!                                └─ viewers ──try_send──► mpsc(1) ──► viewer task
//! ```
//!
//! # Backpressure
//!
//! A viewer's slot holds one frame. If the viewer has not drained it when
//! the next frame arrives, that frame is skipped for that viewer only; the
//! producer and every other viewer carry on. Frame payloads are `Bytes`, so
//! every viewer shares one allocation.

pub mod config;
pub mod error;
pub mod output;
pub mod store;
pub mod stream;

pub use config::RegistryConfig;
pub use error::RegistryError;
pub use output::{Output, OUTPUT_PROTOCOLS};
pub use store::StreamPool;
pub use stream::{LiveStream, StreamSnapshot, ViewerSession, ES_CLOCK_RATE};
