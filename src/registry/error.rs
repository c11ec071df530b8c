//! Registry error types
//!
//! Error types for stream pool operations.

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Stream not found
    StreamNotFound(String),
    /// A stream with this id is already registered
    StreamAlreadyExists(String),
    /// Stream has no viewer session with this id
    SessionNotFound { stream_id: String, session_id: String },
    /// Stream already has a viewer session with this id
    SessionAlreadyExists { stream_id: String, session_id: String },
    /// Stream id was empty
    EmptyStreamId,
    /// Source URI is missing a scheme or cannot be parsed
    InvalidUri(String),
    /// Stream already has a live input attached
    InputAlreadyAttached(String),
    /// Output protocol is not one the server can serve
    UnsupportedProtocol(String),
    /// Stream already declares an output for this protocol
    OutputAlreadyExists { stream_id: String, protocol: String },
    /// Stream declares no output for this protocol
    OutputNotFound { stream_id: String, protocol: String },
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::StreamNotFound(id) => write!(f, "Stream not found: {}", id),
            RegistryError::StreamAlreadyExists(id) => write!(f, "Stream already exists: {}", id),
            RegistryError::SessionNotFound {
                stream_id,
                session_id,
            } => write!(f, "Session {} not found on stream {}", session_id, stream_id),
            RegistryError::SessionAlreadyExists {
                stream_id,
                session_id,
            } => write!(
                f,
                "Session {} already exists on stream {}",
                session_id, stream_id
            ),
            RegistryError::EmptyStreamId => write!(f, "Stream id is empty"),
            RegistryError::InvalidUri(uri) => write!(f, "Invalid source URI: {}", uri),
            RegistryError::InputAlreadyAttached(id) => {
                write!(f, "Stream already has an input: {}", id)
            }
            RegistryError::UnsupportedProtocol(protocol) => write!(
                f,
                "Unsupported output protocol: {} (expected rtsp, rtmp, gb28181 or dmi)",
                protocol
            ),
            RegistryError::OutputAlreadyExists {
                stream_id,
                protocol,
            } => write!(f, "Output {} already in use on stream {}", protocol, stream_id),
            RegistryError::OutputNotFound {
                stream_id,
                protocol,
            } => write!(f, "Output {} not found on stream {}", protocol, stream_id),
        }
    }
}

impl std::error::Error for RegistryError {}
