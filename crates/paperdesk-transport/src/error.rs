//! Error types for transport operations.

use thiserror::Error;

/// Failure of a single API call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection failure, timeout or I/O error before a status was received.
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a status outside [200, 300).
    #[error("Server error: {status} - {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Server-provided error text, or a digest of the body.
        message: String,
    },

    /// A success response whose body isn't the expected JSON.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A success response with no body where one was required.
    #[error("Empty response body")]
    EmptyBody,

    /// The request could not be built (bad path or body).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// Returns true if the same call could succeed later without any change.
    ///
    /// Nothing retries automatically; callers use this to decide what to
    /// tell the user.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Network(_) => true,
            TransportError::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TransportError::Network(format!("request timed out: {error}"))
        } else if error.is_connect() {
            TransportError::Network(format!("connection failed: {error}"))
        } else if error.is_builder() {
            TransportError::InvalidRequest(error.to_string())
        } else {
            TransportError::Network(error.to_string())
        }
    }
}

/// Convenience Result type alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
