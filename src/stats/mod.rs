//! Statistics and metrics

pub mod metrics;

pub use metrics::{InputStats, QueueStats, ViewerStats};
