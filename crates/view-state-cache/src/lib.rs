//! Ordered view-state cache with optimistic mutation and rollback.
//!
//! A [`ViewStateCache`] mirrors the last known server state of one resource
//! list. Each entry carries an [`EntryState`]:
//!
//! ```text
//! (new) ─insert_pending─▶ PendingInsert ─confirm_insert─▶ Confirmed
//!                              └──────rollback_insert────▶ (gone)
//! Confirmed ─begin_write─▶ PendingWrite ─commit_*/revert_write─▶ Confirmed
//! ```
//!
//! At most one write per key may be in flight; a second `begin_write` fails
//! with [`CacheError::Conflict`].

mod cache;
mod error;

pub use cache::{Entry, EntryState, Keyed, LocalId, RemovedEntry, ViewStateCache};
pub use error::{CacheError, CacheResult};
