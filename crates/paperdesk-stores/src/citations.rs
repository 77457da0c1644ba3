//! Citations generated per paper.

use crate::error::{StoreError, StoreResult};
use crate::events::{EventBus, Resource, StoreEvent};
use crate::models::CitationList;
use crate::sequence::LoadSequencer;
use crate::session::Session;
use paperdesk_transport::{ApiClient, ApiRequest, TransportError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use view_state_cache::ViewStateCache;

#[derive(Deserialize)]
struct CitationRecord {
    citation_text: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    paper_id: i64,
    text: &'a str,
}

/// Either a citation or a business error. The error may come with a 4xx status.
#[derive(Deserialize)]
#[serde(untagged)]
enum GenerateResponse {
    Citation { citation: String },
    Error { error: String },
}

fn require_paper_id(paper_id: i64) -> StoreResult<()> {
    if paper_id <= 0 {
        return Err(StoreError::Validation(format!("Invalid paper id {paper_id}")));
    }
    Ok(())
}

/// Citation lists keyed by paper.
///
/// A generated citation is appended only after the server returns it.
#[derive(Debug)]
pub struct CitationsStore {
    api: ApiClient,
    session: Arc<Session>,
    events: EventBus,
    cache: Mutex<ViewStateCache<CitationList>>,
    loads: LoadSequencer<i64>,
}

impl CitationsStore {
    pub fn new(api: ApiClient, session: Arc<Session>, events: EventBus) -> Self {
        Self {
            api,
            session,
            events,
            cache: Mutex::new(ViewStateCache::new()),
            loads: LoadSequencer::new(),
        }
    }

    /// Citations known for `paper_id`, oldest first.
    pub async fn citations(&self, paper_id: i64) -> Vec<String> {
        self.cache
            .lock()
            .await
            .get(&paper_id)
            .map(|list| list.citations.clone())
            .unwrap_or_default()
    }

    fn finish<T>(&self, result: StoreResult<T>) -> StoreResult<T> {
        if let Err(e) = &result {
            self.events.report_failure(Resource::Citations, e);
        }
        result
    }

    /// Replace the citations for `paper_id` with the server's list.
    pub async fn load(&self, paper_id: i64) -> StoreResult<Vec<String>> {
        let result = self.try_load(paper_id).await;
        self.finish(result)
    }

    async fn try_load(&self, paper_id: i64) -> StoreResult<Vec<String>> {
        self.session.require_user()?;
        require_paper_id(paper_id)?;
        let ticket = self.loads.issue(paper_id);

        let result = self
            .api
            .json_list::<CitationRecord>(ApiRequest::get(format!("/citations/paper/{paper_id}")))
            .await;

        let mut cache = self.cache.lock().await;
        if !self.loads.is_latest(&paper_id, ticket) {
            debug!(paper_id, ticket, "Dropping superseded citations load");
            return Err(StoreError::Superseded);
        }
        let citations: Vec<String> = result?
            .into_iter()
            .map(|record| record.citation_text)
            .collect();
        cache.upsert_confirmed(CitationList {
            paper_id,
            citations: citations.clone(),
        });
        drop(cache);

        debug!(paper_id, count = citations.len(), "Citations loaded");
        self.events.publish(StoreEvent::CitationsChanged { paper_id });
        Ok(citations)
    }

    /// Ask the server to generate a citation from `text` and append it.
    pub async fn generate(&self, paper_id: i64, text: &str) -> StoreResult<String> {
        let result = self.try_generate(paper_id, text.trim()).await;
        self.finish(result)
    }

    async fn try_generate(&self, paper_id: i64, text: &str) -> StoreResult<String> {
        self.session.require_user()?;
        require_paper_id(paper_id)?;
        if text.is_empty() {
            return Err(StoreError::Validation(
                "Citation text cannot be empty".to_string(),
            ));
        }
        let request =
            ApiRequest::post("/citations/generate", &GenerateRequest { paper_id, text })?;

        self.cache.lock().await.begin_write(&paper_id)?;

        let outcome = match self.api.json_or_client_error(request).await {
            Ok(body) => serde_json::from_value::<GenerateResponse>(body).map_err(|e| {
                StoreError::from(TransportError::Parse(format!("unknown citation response: {e}")))
            }),
            Err(e) => Err(e.into()),
        };

        let mut cache = self.cache.lock().await;
        match outcome {
            Ok(GenerateResponse::Citation { citation }) => {
                let mut list = cache.get(&paper_id).cloned().unwrap_or(CitationList {
                    paper_id,
                    citations: Vec::new(),
                });
                list.citations.push(citation.clone());
                if !cache.commit_replace(&paper_id, list.clone()) {
                    cache.upsert_confirmed(list);
                }
                drop(cache);
                info!(paper_id, "Citation generated");
                self.events.publish(StoreEvent::CitationsChanged { paper_id });
                Ok(citation)
            }
            Ok(GenerateResponse::Error { error }) => {
                cache.revert_write(&paper_id);
                Err(StoreError::Semantic { message: error })
            }
            Err(e) => {
                cache.revert_write(&paper_id);
                Err(e)
            }
        }
    }
}
