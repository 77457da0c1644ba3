//! Transport layer for the paper service REST API.
//!
//! # Architecture
//!
//! ```text
//! store → ApiClient (status/body classification) → dyn Transport → backend
//! ```
//!
//! [`Transport`] only moves bytes and reports connection-level failures.
//! [`ApiClient`] turns raw responses into parsed JSON or a [`TransportError`].
//! Every call is a single attempt; nothing here retries.

mod api;
mod error;
mod http;
mod request;
mod scripted;

pub use api::ApiClient;
pub use error::{TransportError, TransportResult};
pub use http::HttpTransport;
pub use request::{ApiRequest, Method, RawResponse, Transport};
pub use scripted::{ScriptedResponse, ScriptedTransport};
