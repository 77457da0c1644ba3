//! Authenticated session context.

use crate::error::{StoreError, StoreResult};
use tokio::sync::{OnceCell, RwLock};
use tracing::info;

/// Who is logged in and which paper is open.
///
/// The user id is written once by a successful login and never changes for
/// the life of the session. Logging in again as the same user is accepted;
/// a different user needs a new session.
#[derive(Debug, Default)]
pub struct Session {
    user_id: OnceCell<i64>,
    active_paper: RwLock<Option<i64>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the session to `user_id`.
    pub fn establish(&self, user_id: i64) -> StoreResult<()> {
        match self.user_id.set(user_id) {
            Ok(()) => {
                info!(user_id, "Session established");
                Ok(())
            }
            Err(_) => match self.user_id.get() {
                Some(&existing) if existing == user_id => Ok(()),
                Some(&existing) => Err(StoreError::AlreadyAuthenticated(existing)),
                None => Err(StoreError::NotAuthenticated),
            },
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user_id.get().copied()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.initialized()
    }

    /// The logged-in user, or `NotAuthenticated`.
    pub fn require_user(&self) -> StoreResult<i64> {
        self.user_id().ok_or(StoreError::NotAuthenticated)
    }

    pub async fn set_active_paper(&self, paper_id: Option<i64>) {
        *self.active_paper.write().await = paper_id;
    }

    pub async fn active_paper(&self) -> Option<i64> {
        *self.active_paper.read().await
    }
}
