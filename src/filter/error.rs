//! Filter error types

/// Error type for filter operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// The stream descriptor list is empty
    NoStreams,
    /// A packet refers to a stream that was never declared
    StreamIndexOutOfRange {
        /// Index carried by the packet
        index: usize,
        /// Number of declared streams
        streams: usize,
    },
}

impl std::fmt::Display for FilterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterError::NoStreams => write!(f, "No streams declared"),
            FilterError::StreamIndexOutOfRange { index, streams } => {
                write!(f, "Packet stream index {} out of range ({} streams)", index, streams)
            }
        }
    }
}

impl std::error::Error for FilterError {}
