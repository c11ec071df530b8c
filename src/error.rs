//! Crate-level error types

use crate::filter::FilterError;

/// Error type for queue, cursor and filter operations
///
/// Stream pool operations return
/// [`RegistryError`](crate::registry::RegistryError) directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The source was closed and no further packets exist
    Eof,
    /// A filter rejected the packet stream
    Filter(FilterError),
}

impl Error {
    /// True when this is a clean end of stream rather than a failure
    pub fn is_eof(&self) -> bool {
        matches!(self, Error::Eof)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Eof => write!(f, "End of stream"),
            Error::Filter(e) => write!(f, "Filter error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Eof => None,
            Error::Filter(e) => Some(e),
        }
    }
}

impl From<FilterError> for Error {
    fn from(e: FilterError) -> Self {
        Error::Filter(e)
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
