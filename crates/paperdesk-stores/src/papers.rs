//! The user's papers.

use crate::error::{StoreError, StoreResult};
use crate::events::{EventBus, Resource, StoreEvent};
use crate::models::{Paper, PdfDocument};
use crate::sequence::LoadSequencer;
use crate::session::Session;
use paperdesk_transport::{ApiClient, ApiRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use view_state_cache::{Entry, ViewStateCache};

#[derive(Serialize)]
struct AddPaperRequest<'a> {
    title: &'a str,
    content: &'a str,
    user_id: i64,
    shared: bool,
}

#[derive(Deserialize)]
struct AddPaperResponse {
    paper_id: i64,
}

#[derive(Serialize)]
struct UpdatePaperRequest<'a> {
    paper_id: i64,
    title: &'a str,
    content: &'a str,
    user_id: i64,
    shared: bool,
}

#[derive(Serialize)]
struct DeletePaperRequest {
    paper_id: i64,
    user_id: i64,
}

#[derive(Serialize)]
struct LoadPapersRequest {
    user_id: i64,
}

#[derive(Serialize)]
struct ExportPdfRequest<'a> {
    title: &'a str,
    content: &'a str,
}

/// Trimmed copy of `paper` with a non-blank title.
fn normalized(mut paper: Paper) -> StoreResult<Paper> {
    paper.title = paper.title.trim().to_string();
    paper.content = paper.content.trim().to_string();
    if paper.title.is_empty() {
        return Err(StoreError::Validation("Title cannot be empty".to_string()));
    }
    Ok(paper)
}

/// Papers visible to the logged-in user.
///
/// `add` shows the paper immediately as pending and rolls it back if the
/// server refuses. `update` and `remove` change the collection only once the
/// server confirms.
#[derive(Debug)]
pub struct PapersStore {
    api: ApiClient,
    session: Arc<Session>,
    events: EventBus,
    cache: Mutex<ViewStateCache<Paper>>,
    loads: LoadSequencer<()>,
}

impl PapersStore {
    pub fn new(api: ApiClient, session: Arc<Session>, events: EventBus) -> Self {
        Self {
            api,
            session,
            events,
            cache: Mutex::new(ViewStateCache::new()),
            loads: LoadSequencer::new(),
        }
    }

    /// Current papers, pending ones included, in display order.
    pub async fn snapshot(&self) -> Vec<Paper> {
        self.cache.lock().await.snapshot()
    }

    /// Current entries with their sync state.
    pub async fn entries(&self) -> Vec<Entry<Paper>> {
        self.cache.lock().await.entries().to_vec()
    }

    pub async fn get(&self, paper_id: i64) -> Option<Paper> {
        self.cache.lock().await.get(&paper_id).cloned()
    }

    fn finish<T>(&self, result: StoreResult<T>) -> StoreResult<T> {
        if let Err(e) = &result {
            self.events.report_failure(Resource::Papers, e);
        }
        result
    }

    /// Replace the collection with the server's list.
    pub async fn load(&self) -> StoreResult<Vec<Paper>> {
        let result = self.try_load().await;
        self.finish(result)
    }

    async fn try_load(&self) -> StoreResult<Vec<Paper>> {
        let user_id = self.session.require_user()?;
        let ticket = self.loads.issue(());
        let request = ApiRequest::post("/load_papers", &LoadPapersRequest { user_id })?;

        let result = self.api.json_list::<Paper>(request).await;

        let mut cache = self.cache.lock().await;
        if !self.loads.is_latest(&(), ticket) {
            debug!(ticket, "Dropping superseded papers load");
            return Err(StoreError::Superseded);
        }
        let papers = result?;
        cache.replace_all(papers.clone());
        drop(cache);

        debug!(count = papers.len(), "Papers loaded");
        self.events.publish(StoreEvent::PapersChanged);
        Ok(papers)
    }

    /// Create a paper owned by the logged-in user. Returns the server id.
    pub async fn add(&self, draft: Paper) -> StoreResult<i64> {
        let result = self.try_add(draft).await;
        self.finish(result)
    }

    async fn try_add(&self, draft: Paper) -> StoreResult<i64> {
        let user_id = self.session.require_user()?;
        let pending = normalized(Paper {
            id: None,
            owner_id: user_id,
            ..draft
        })?;
        let request = ApiRequest::post(
            "/add_paper",
            &AddPaperRequest {
                title: &pending.title,
                content: &pending.content,
                user_id,
                shared: pending.shared,
            },
        )?;

        let local_id = self.cache.lock().await.insert_pending(pending.clone());
        self.events.publish(StoreEvent::PapersChanged);

        match self.api.json_as::<AddPaperResponse>(request).await {
            Ok(response) => {
                let confirmed = Paper {
                    id: Some(response.paper_id),
                    ..pending
                };
                self.cache.lock().await.confirm_insert(local_id, confirmed);
                self.events.publish(StoreEvent::PapersChanged);
                info!(paper_id = response.paper_id, "Paper added");
                Ok(response.paper_id)
            }
            Err(e) => {
                self.cache.lock().await.rollback_insert(local_id);
                self.events.publish(StoreEvent::PapersChanged);
                Err(e.into())
            }
        }
    }

    /// Save edits to an existing paper.
    pub async fn update(&self, paper: Paper) -> StoreResult<()> {
        let result = self.try_update(paper).await;
        self.finish(result)
    }

    async fn try_update(&self, paper: Paper) -> StoreResult<()> {
        let user_id = self.session.require_user()?;
        let paper_id = paper
            .id
            .ok_or_else(|| StoreError::Validation("Paper has not been saved yet".to_string()))?;
        let paper = normalized(paper)?;
        let request = ApiRequest::post(
            "/update_paper",
            &UpdatePaperRequest {
                paper_id,
                title: &paper.title,
                content: &paper.content,
                user_id,
                shared: paper.shared,
            },
        )?;

        self.cache.lock().await.begin_write(&paper_id)?;
        self.events.publish(StoreEvent::PapersChanged);

        match self.api.confirm(request).await {
            Ok(_) => {
                self.cache.lock().await.commit_replace(&paper_id, paper);
                self.events.publish(StoreEvent::PapersChanged);
                info!(paper_id, "Paper updated");
                Ok(())
            }
            Err(e) => {
                self.cache.lock().await.revert_write(&paper_id);
                self.events.publish(StoreEvent::PapersChanged);
                Err(e.into())
            }
        }
    }

    /// Set the shared flag. Only the owner may change it.
    pub async fn set_shared(&self, paper_id: i64, shared: bool) -> StoreResult<()> {
        let paper = match self.owned_paper(paper_id).await {
            Ok(paper) => paper,
            Err(e) => return self.finish(Err(e)),
        };
        if paper.shared == shared {
            return Ok(());
        }
        self.update(paper.with_shared(shared)).await
    }

    /// Flip the shared flag. Returns the new value.
    pub async fn toggle_shared(&self, paper_id: i64) -> StoreResult<bool> {
        let paper = match self.owned_paper(paper_id).await {
            Ok(paper) => paper,
            Err(e) => return self.finish(Err(e)),
        };
        let shared = !paper.shared;
        self.update(paper.with_shared(shared)).await?;
        Ok(shared)
    }

    async fn owned_paper(&self, paper_id: i64) -> StoreResult<Paper> {
        let user_id = self.session.require_user()?;
        let paper = self
            .get(paper_id)
            .await
            .ok_or_else(|| StoreError::NotFound(format!("paper {paper_id}")))?;
        if !paper.is_owned_by(user_id) {
            return Err(StoreError::Forbidden(
                "Only the owner can change sharing".to_string(),
            ));
        }
        Ok(paper)
    }

    /// Delete a paper.
    pub async fn remove(&self, paper_id: i64) -> StoreResult<()> {
        let result = self.try_remove(paper_id).await;
        self.finish(result)
    }

    async fn try_remove(&self, paper_id: i64) -> StoreResult<()> {
        let user_id = self.session.require_user()?;
        let request = ApiRequest::post("/delete_paper", &DeletePaperRequest { paper_id, user_id })?;

        self.cache.lock().await.begin_write(&paper_id)?;
        self.events.publish(StoreEvent::PapersChanged);

        match self.api.confirm(request).await {
            Ok(_) => {
                self.cache.lock().await.commit_remove(&paper_id);
                self.events.publish(StoreEvent::PapersChanged);
                info!(paper_id, "Paper deleted");
                Ok(())
            }
            Err(e) => {
                self.cache.lock().await.revert_write(&paper_id);
                self.events.publish(StoreEvent::PapersChanged);
                Err(e.into())
            }
        }
    }

    /// Render title and content to a PDF on the server.
    pub async fn export_pdf(&self, title: &str, content: &str) -> StoreResult<PdfDocument> {
        let result = self.try_export_pdf(title.trim(), content.trim()).await;
        self.finish(result)
    }

    async fn try_export_pdf(&self, title: &str, content: &str) -> StoreResult<PdfDocument> {
        if title.is_empty() || content.is_empty() {
            return Err(StoreError::Validation(
                "Title and content are required for export".to_string(),
            ));
        }
        let request = ApiRequest::post("/export_pdf", &ExportPdfRequest { title, content })?;
        let bytes = self.api.bytes(request).await?;
        let pdf = PdfDocument::new(bytes);
        info!(file_name = %pdf.file_name, len = pdf.len(), "PDF exported");
        Ok(pdf)
    }
}
