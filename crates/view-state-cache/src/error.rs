//! Cache error types.

use thiserror::Error;

/// Errors raised by cache transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// A write for this key is already in flight.
    #[error("write already pending for {0}")]
    Conflict(String),

    /// No confirmed entry exists for this key.
    #[error("no entry for {0}")]
    NotFound(String),
}

/// Result type alias using CacheError.
pub type CacheResult<T> = Result<T, CacheError>;
