//! Error types for progress and results fetching
//!
//! None of these are fatal to a polling session. The synchronizer logs them,
//! publishes a `TickFailed` event and tries again on the next tick.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Network unreachable, connection reset, timeout
    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    /// Server answered with a non-success status
    #[error("HTTP request failed with status {status}: {url}")]
    Status { url: String, status: u16 },

    /// Body could not be read or decoded
    #[error("Malformed response body from {url}: {message}")]
    Malformed { url: String, message: String },

    /// The fetch was abandoned because polling stopped
    #[error("Request cancelled: {url}")]
    Cancelled { url: String },
}

/// A session key that cannot address a training run
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session {field} must not be empty")]
    EmptyField { field: &'static str },
}

impl FetchError {
    /// Stable label for logs and events
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Status { .. } => "protocol",
            Self::Malformed { .. } => "data",
            Self::Cancelled { .. } => "cancelled",
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Transport { url, .. }
            | Self::Status { url, .. }
            | Self::Malformed { url, .. }
            | Self::Cancelled { url } => url,
        }
    }

    /// Transport, protocol and data errors are all retried on the next tick
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_and_messages() {
        let err = FetchError::Status {
            url: "http://localhost/api/training-progress/a/b".into(),
            status: 503,
        };
        assert_eq!(err.kind(), "protocol");
        assert!(err.is_retryable());
        assert_eq!(
            err.to_string(),
            "HTTP request failed with status 503: http://localhost/api/training-progress/a/b"
        );

        let cancelled = FetchError::Cancelled { url: "x".into() };
        assert!(!cancelled.is_retryable());
        assert_eq!(cancelled.url(), "x");
    }
}
