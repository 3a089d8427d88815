//! Failure causes carried through the response pipeline.

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Result type alias for response pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Cause of a failed response.
///
/// Cheap to clone: once a filter chain fails, every event queued behind it
/// observes the same cause, so the value is handed out more than once.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(Arc<io::Error>),

    #[error("filter `{filter}` failed: {message}")]
    Filter { filter: String, message: String },

    #[error("response body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("panicked while delivering response event: {0}")]
    Panicked(String),

    #[error("response dropped before completion")]
    Dropped,

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn filter(filter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Filter {
            filter: filter.into(),
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// The underlying I/O error, if this cause came from the transport.
    pub fn as_io(&self) -> Option<&io::Error> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}
