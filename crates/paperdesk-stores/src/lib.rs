//! Resource stores for the paper service.
//!
//! # Architecture
//!
//! ```text
//! caller → store method → ApiClient → Transport → backend
//!              │
//!              ├─ ViewStateCache (last known server state, pending markers)
//!              └─ EventBus (serial stream of StoreEvent for the presentation layer)
//! ```
//!
//! # Write policies
//!
//! - Papers: `add` is optimistic (pending entry, rolled back on failure);
//!   `update` and `remove` apply only after the server confirms.
//! - References: `add` confirms then reloads; `remove` is optimistic and
//!   restores the entry on failure.
//! - Citations: `generate` appends only after the server returns a citation.
//!
//! Any entity has at most one write in flight; a second one fails with
//! [`StoreError::Conflict`]. A load that completes after a newer load for the
//! same resource was issued is dropped with [`StoreError::Superseded`].

mod auth;
mod citations;
mod client;
mod error;
mod events;
mod models;
mod papers;
mod references;
mod sequence;
mod session;

pub use auth::AuthClient;
pub use citations::CitationsStore;
pub use client::ResearchClient;
pub use error::{StoreError, StoreResult};
pub use events::{EventBus, Resource, StoreEvent};
pub use models::{CitationList, NewReference, Paper, PdfDocument, Reference};
pub use papers::PapersStore;
pub use references::ReferencesStore;
pub use session::Session;
pub use view_state_cache::{Entry, EntryState};
