//! Publisher/subscriber packet queue
//!
//! The queue is the fan-out broker between one writer (the ingest side) and
//! any number of muxers. Each muxer reads through its own cursor and can join
//! at a different point of the buffered history.
//!
//! # Architecture
//!
//! ```text
//!                         Queue (Arc<Shared>)
//!                   ┌──────────────────────────────┐
//!                   │ RwLock<QueueState> {         │
//!                   │   buf: RingBuffer,           │
//!                   │   cur_gop_count / max,       │
//!                   │   streams, video_idx, closed │
//!                   │ }                            │
//!                   │ notify: Notify               │
//!                   └──────────────┬───────────────┘
//!                                  │
//!        ┌─────────────────────────┼─────────────────────────┐
//!        ▼                         ▼                         ▼
//!   [Writer]                  [Cursor]                  [Cursor]
//!   write_packet()            read_packet()             read_packet()
//!        │                         │                         │
//!        └── notify_waiters() ─────┴── wake, re-check ───────┘
//! ```
//!
//! # Retention
//!
//! A GOP starts at a video key frame. After every write the queue drops whole
//! GOPs from the head until no more than `max_gop_count` key frames remain,
//! but never its last packet. Cursors that fall behind snap forward to the
//! head rather than blocking on evicted data.

pub mod config;
pub mod cursor;
pub mod queue;

pub use config::{QueueConfig, DEFAULT_MAX_GOP_COUNT};
pub use cursor::{CursorStart, QueueCursor};
pub use queue::Queue;
