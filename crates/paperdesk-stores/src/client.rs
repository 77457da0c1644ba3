//! One handle wiring the session, event bus and stores to a transport.

use crate::auth::AuthClient;
use crate::citations::CitationsStore;
use crate::error::StoreResult;
use crate::events::{EventBus, StoreEvent};
use crate::papers::PapersStore;
use crate::references::ReferencesStore;
use crate::session::Session;
use paperdesk_config_and_utils::Config;
use paperdesk_transport::{ApiClient, HttpTransport, Transport};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

/// Client for the paper service.
///
/// All stores share one [`Session`] and one [`EventBus`].
#[derive(Debug)]
pub struct ResearchClient {
    session: Arc<Session>,
    events: EventBus,
    auth: AuthClient,
    papers: PapersStore,
    references: ReferencesStore,
    citations: CitationsStore,
}

impl ResearchClient {
    /// Build a client over any transport.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        let api = ApiClient::new(transport);
        let session = Arc::new(Session::new());
        let events = EventBus::default();

        Self {
            auth: AuthClient::new(api.clone(), session.clone(), events.clone()),
            papers: PapersStore::new(api.clone(), session.clone(), events.clone()),
            references: ReferencesStore::new(api.clone(), session.clone(), events.clone()),
            citations: CitationsStore::new(api, session.clone(), events.clone()),
            session,
            events,
        }
    }

    /// Build a client talking HTTP to the configured base URL.
    pub fn from_config(config: &Config) -> StoreResult<Self> {
        let transport = HttpTransport::new(&config.api_base_url, config.request_timeout())?;
        info!(base_url = %config.api_base_url, "Research client created");
        Ok(Self::with_transport(Arc::new(transport)))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn auth(&self) -> &AuthClient {
        &self.auth
    }

    pub fn papers(&self) -> &PapersStore {
        &self.papers
    }

    pub fn references(&self) -> &ReferencesStore {
        &self.references
    }

    pub fn citations(&self) -> &CitationsStore {
        &self.citations
    }

    /// Make `paper_id` the active paper and load its citations.
    pub async fn open_paper(&self, paper_id: i64) -> StoreResult<Vec<String>> {
        self.session.set_active_paper(Some(paper_id)).await;
        self.citations.load(paper_id).await
    }

    pub async fn close_paper(&self) {
        self.session.set_active_paper(None).await;
    }
}
