//! Store error types.
//!
//! Every failure a store can produce is recovered at the store boundary and
//! returned as a [`StoreError`]; none of them are fatal to the process.

use paperdesk_transport::TransportError;
use thiserror::Error;
use view_state_cache::CacheError;

/// Error returned by store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The HTTP exchange itself failed (network, status, body).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server processed the request and reported a business error.
    #[error("Server reported an error: {message}")]
    Semantic {
        /// Message supplied by the server.
        message: String,
    },

    /// Another write for the same entity is still in flight.
    #[error("Write already pending for {0}")]
    Conflict(String),

    /// Login was rejected.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The operation needs a logged-in user.
    #[error("Not logged in")]
    NotAuthenticated,

    /// The session already belongs to a different user.
    #[error("Already logged in as user {0}")]
    AlreadyAuthenticated(i64),

    /// The user may not perform this operation on the entity.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Input rejected before anything was sent.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The entity isn't in the local collection.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A newer load for the same resource was issued; this result was dropped.
    #[error("Superseded by a newer request")]
    Superseded,
}

impl From<CacheError> for StoreError {
    fn from(error: CacheError) -> Self {
        match error {
            CacheError::Conflict(key) => StoreError::Conflict(key),
            CacheError::NotFound(key) => StoreError::NotFound(key),
        }
    }
}

impl StoreError {
    /// Short message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            StoreError::Transport(TransportError::Network(_)) => {
                "Could not reach the server".to_string()
            }
            StoreError::Transport(TransportError::Server { status, .. }) => {
                format!("Server error ({status})")
            }
            StoreError::Transport(TransportError::Parse(_)) => {
                "Unexpected server response".to_string()
            }
            StoreError::Transport(TransportError::EmptyBody) => {
                "Empty server response".to_string()
            }
            StoreError::Transport(TransportError::InvalidRequest(_)) => {
                "Request could not be sent".to_string()
            }
            StoreError::Semantic { message } => format!("Error: {message}"),
            StoreError::Conflict(_) => "Still saving the previous change".to_string(),
            StoreError::InvalidCredentials => "Invalid credentials".to_string(),
            StoreError::NotAuthenticated => "Please log in first".to_string(),
            StoreError::AlreadyAuthenticated(_) => "Already logged in".to_string(),
            StoreError::Forbidden(reason) => reason.clone(),
            StoreError::Validation(reason) => reason.clone(),
            StoreError::NotFound(_) => "Item no longer exists".to_string(),
            StoreError::Superseded => "Refreshing".to_string(),
        }
    }
}

/// Result type alias using StoreError.
pub type StoreResult<T> = Result<T, StoreError>;
