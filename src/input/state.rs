//! Live input lifecycle

/// Phase of a live input session
///
/// ```text
/// Idle ──open──► Connecting ──200──► Streaming
///                  ▲    │               │ 201 / 400 / end of stream
///                  │    ▼ not ready     ▼
///                  └── Retrying ◄───────┘
///
/// any phase ──close──► Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputPhase {
    /// Created, not opened yet
    Idle,
    /// Waiting for the receiver's readiness signal
    Connecting,
    /// Receiving frames
    Streaming,
    /// Sleeping out the backoff before the next attempt
    Retrying,
    /// Closed; terminal
    Closed,
}

impl InputPhase {
    /// Whether the session has been opened and not yet closed
    pub fn is_active(&self) -> bool {
        !matches!(self, InputPhase::Idle | InputPhase::Closed)
    }
}

impl std::fmt::Display for InputPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            InputPhase::Idle => "idle",
            InputPhase::Connecting => "connecting",
            InputPhase::Streaming => "streaming",
            InputPhase::Retrying => "retrying",
            InputPhase::Closed => "closed",
        };
        f.write_str(name)
    }
}
