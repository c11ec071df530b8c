//! Output declarations
//!
//! A stream declares which outputs it serves, one per protocol. Protocol
//! names are matched case-insensitively and stored lowercase.

use super::error::RegistryError;

/// Protocols a stream can be served over
pub const OUTPUT_PROTOCOLS: [&str; 4] = ["rtsp", "rtmp", "gb28181", "dmi"];

/// An output declared on a live stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    /// Lowercase protocol name
    pub protocol: String,
    /// Disabled outputs stay declared but are not served
    pub enabled: bool,
}

impl Output {
    pub fn new(protocol: &str, enabled: bool) -> Result<Self, RegistryError> {
        Ok(Self {
            protocol: normalize_protocol(protocol)?,
            enabled,
        })
    }
}

/// Lowercase `protocol`, rejecting anything outside [`OUTPUT_PROTOCOLS`]
pub fn normalize_protocol(protocol: &str) -> Result<String, RegistryError> {
    let lower = protocol.to_ascii_lowercase();
    if OUTPUT_PROTOCOLS.contains(&lower.as_str()) {
        Ok(lower)
    } else {
        Err(RegistryError::UnsupportedProtocol(protocol.to_string()))
    }
}
