//! The user's reference library.

use crate::error::{StoreError, StoreResult};
use crate::events::{EventBus, Resource, StoreEvent};
use crate::models::{NewReference, Reference};
use crate::sequence::LoadSequencer;
use crate::session::Session;
use paperdesk_transport::{ApiClient, ApiRequest};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use view_state_cache::ViewStateCache;

#[derive(Serialize)]
struct AddReferenceRequest<'a> {
    user_id: i64,
    author: &'a str,
    category: &'a str,
    title: &'a str,
}

/// Id of the created reference, if the server echoed one.
fn created_id(body: Option<&Value>) -> Option<i64> {
    let object = body?.as_object()?;
    ["id", "reference_id"]
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_i64))
}

/// References belonging to the logged-in user.
///
/// Adds are confirmed by the server and followed by a reload. Removes take
/// the entry out of the list at once and put it back at its old position if
/// the server refuses.
#[derive(Debug)]
pub struct ReferencesStore {
    api: ApiClient,
    session: Arc<Session>,
    events: EventBus,
    cache: Mutex<ViewStateCache<Reference>>,
    loads: LoadSequencer<()>,
}

impl ReferencesStore {
    pub fn new(api: ApiClient, session: Arc<Session>, events: EventBus) -> Self {
        Self {
            api,
            session,
            events,
            cache: Mutex::new(ViewStateCache::new()),
            loads: LoadSequencer::new(),
        }
    }

    pub async fn snapshot(&self) -> Vec<Reference> {
        self.cache.lock().await.snapshot()
    }

    fn finish<T>(&self, result: StoreResult<T>) -> StoreResult<T> {
        if let Err(e) = &result {
            self.events.report_failure(Resource::References, e);
        }
        result
    }

    /// Replace the library with the server's list.
    pub async fn load(&self) -> StoreResult<Vec<Reference>> {
        let result = self.try_load().await;
        self.finish(result)
    }

    async fn try_load(&self) -> StoreResult<Vec<Reference>> {
        let user_id = self.session.require_user()?;
        let ticket = self.loads.issue(());

        let result = self
            .api
            .json_list::<Reference>(ApiRequest::get(format!("/references/{user_id}")))
            .await;

        let mut cache = self.cache.lock().await;
        if !self.loads.is_latest(&(), ticket) {
            debug!(ticket, "Dropping superseded references load");
            return Err(StoreError::Superseded);
        }
        let references = result?;
        cache.replace_all(references.clone());
        drop(cache);

        debug!(count = references.len(), "References loaded");
        self.events.publish(StoreEvent::ReferencesChanged);
        Ok(references)
    }

    /// Create a reference, then reload the library.
    ///
    /// Returns the new id when the server reports one. A failed reload after
    /// a successful create is logged, not returned.
    pub async fn add(&self, reference: NewReference) -> StoreResult<Option<i64>> {
        let result = self.try_add(reference).await;
        self.finish(result)
    }

    async fn try_add(&self, reference: NewReference) -> StoreResult<Option<i64>> {
        let user_id = self.session.require_user()?;
        let author = reference.author.trim();
        let category = reference.category.trim();
        let title = reference.title.trim();
        if author.is_empty() || category.is_empty() || title.is_empty() {
            return Err(StoreError::Validation(
                "Author, category and title are required".to_string(),
            ));
        }

        let request = ApiRequest::post(
            "/references",
            &AddReferenceRequest {
                user_id,
                author,
                category,
                title,
            },
        )?;
        let body = self.api.confirm(request).await?;
        let id = created_id(body.as_ref());
        info!(reference_id = ?id, "Reference added");

        match self.load().await {
            Ok(_) | Err(StoreError::Superseded) => {}
            Err(e) => warn!(error = %e, "Reload after adding reference failed"),
        }
        Ok(id)
    }

    /// Delete a reference. The entry disappears immediately and is restored
    /// if the server refuses.
    pub async fn remove(&self, reference_id: i64) -> StoreResult<()> {
        let result = self.try_remove(reference_id).await;
        self.finish(result)
    }

    async fn try_remove(&self, reference_id: i64) -> StoreResult<()> {
        self.session.require_user()?;

        let removed = self.cache.lock().await.remove_optimistic(&reference_id)?;
        self.events.publish(StoreEvent::ReferencesChanged);

        match self
            .api
            .confirm(ApiRequest::delete(format!("/references/{reference_id}")))
            .await
        {
            Ok(_) => {
                let reloaded = self.cache.lock().await.finish_remove(&reference_id);
                if reloaded.is_some() {
                    self.events.publish(StoreEvent::ReferencesChanged);
                }
                info!(reference_id, "Reference deleted");
                Ok(())
            }
            Err(e) => {
                self.cache.lock().await.restore(removed);
                self.events.publish(StoreEvent::ReferencesChanged);
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperdesk_transport::{Method, ScriptedResponse, ScriptedTransport, TransportError};
    use serde_json::json;
    use std::time::Duration;

    fn setup() -> (Arc<ScriptedTransport>, ReferencesStore) {
        let transport = Arc::new(ScriptedTransport::new());
        let session = Arc::new(Session::new());
        session.establish(7).unwrap();
        let store = ReferencesStore::new(
            ApiClient::new(transport.clone()),
            session,
            EventBus::default(),
        );
        (transport, store)
    }

    fn reference_json(id: i64, title: &str) -> Value {
        json!({"id": id, "user_id": 7, "author": "Knuth", "category": "Books", "title": title})
    }

    async fn seed(transport: &ScriptedTransport, store: &ReferencesStore) {
        transport.push(
            Method::Get,
            "/references/7",
            ScriptedResponse::json(
                200,
                json!([reference_json(1, "A"), reference_json(2, "B"), reference_json(3, "C")]),
            ),
        );
        store.load().await.unwrap();
    }

    fn titles(references: &[Reference]) -> Vec<&str> {
        references.iter().map(|r| r.title.as_str()).collect()
    }

    #[tokio::test]
    async fn test_load_equals_server_list() {
        let (transport, store) = setup();
        seed(&transport, &store).await;
        assert_eq!(titles(&store.snapshot().await), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_add_confirms_then_reloads() {
        let (transport, store) = setup();
        transport.push(
            Method::Post,
            "/references",
            ScriptedResponse::json(201, json!({"id": 4})),
        );
        transport.push(
            Method::Get,
            "/references/7",
            ScriptedResponse::json(200, json!([reference_json(4, "TAOCP")])),
        );

        let id = store
            .add(NewReference::new("Knuth", "Books", "TAOCP"))
            .await
            .unwrap();
        assert_eq!(id, Some(4));
        assert_eq!(titles(&store.snapshot().await), vec!["TAOCP"]);

        let sent = transport.requests_for(Method::Post, "/references");
        assert_eq!(
            sent[0].body,
            Some(json!({"user_id": 7, "author": "Knuth", "category": "Books", "title": "TAOCP"}))
        );
    }

    #[tokio::test]
    async fn test_add_without_echoed_id() {
        let (transport, store) = setup();
        transport.push(Method::Post, "/references", ScriptedResponse::text(201, ""));
        transport.push(
            Method::Get,
            "/references/7",
            ScriptedResponse::json(200, json!([])),
        );

        assert_eq!(
            store.add(NewReference::new("a", "b", "c")).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_failed_add_leaves_library_unchanged() {
        let (transport, store) = setup();
        seed(&transport, &store).await;
        transport.push(
            Method::Post,
            "/references",
            ScriptedResponse::json(400, json!({"error": "missing field"})),
        );

        let err = store
            .add(NewReference::new("a", "b", "c"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::Transport(TransportError::Server {
                status: 400,
                message: "missing field".into()
            })
        );
        assert_eq!(titles(&store.snapshot().await), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_add_requires_all_fields() {
        let (transport, store) = setup();
        let err = store
            .add(NewReference::new("Knuth", "", "TAOCP"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_remove_success() {
        let (transport, store) = setup();
        seed(&transport, &store).await;
        transport.push(Method::Delete, "/references/2", ScriptedResponse::text(204, ""));

        store.remove(2).await.unwrap();
        assert_eq!(titles(&store.snapshot().await), vec!["A", "C"]);
    }

    #[tokio::test]
    async fn test_failed_remove_restores_at_original_position() {
        let (transport, store) = setup();
        seed(&transport, &store).await;
        transport.push(
            Method::Delete,
            "/references/2",
            ScriptedResponse::json(500, json!({"error": "db down"}))
                .with_delay(Duration::from_millis(20)),
        );

        let (removed, during) = tokio::join!(store.remove(2), async {
            tokio::task::yield_now().await;
            store.snapshot().await
        });

        assert_eq!(titles(&during), vec!["A", "C"]);
        assert!(removed.is_err());
        assert_eq!(titles(&store.snapshot().await), vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_confirmed_remove_wins_over_load_that_finished_during_it() {
        let (transport, store) = setup();
        seed(&transport, &store).await;
        transport.push(
            Method::Delete,
            "/references/2",
            ScriptedResponse::text(204, "").with_delay(Duration::from_millis(20)),
        );
        transport.push(
            Method::Get,
            "/references/7",
            ScriptedResponse::json(
                200,
                json!([reference_json(1, "A"), reference_json(2, "B"), reference_json(3, "C")]),
            ),
        );

        let (removed, reloaded) = tokio::join!(store.remove(2), async {
            tokio::task::yield_now().await;
            let references = store.load().await.unwrap();
            (references.len(), store.snapshot().await)
        });

        removed.unwrap();
        let (loaded, during) = reloaded;
        assert_eq!(loaded, 3);
        assert_eq!(titles(&during), vec!["A", "B", "C"]);
        assert_eq!(titles(&store.snapshot().await), vec!["A", "C"]);
    }

    #[tokio::test]
    async fn test_remove_unknown_reference() {
        let (transport, store) = setup();
        seed(&transport, &store).await;
        assert_eq!(store.remove(42).await, Err(StoreError::NotFound("42".into())));
        assert!(transport.requests_for(Method::Delete, "/references/42").is_empty());
    }

    #[tokio::test]
    async fn test_double_remove_conflicts() {
        let (transport, store) = setup();
        seed(&transport, &store).await;
        transport.push(
            Method::Delete,
            "/references/1",
            ScriptedResponse::text(204, "").with_delay(Duration::from_millis(20)),
        );

        let (first, second) = tokio::join!(store.remove(1), store.remove(1));
        assert!(first.is_ok());
        assert_eq!(second, Err(StoreError::Conflict("1".into())));
        assert_eq!(titles(&store.snapshot().await), vec!["B", "C"]);
    }

    #[test]
    fn test_created_id() {
        assert_eq!(created_id(Some(&json!({"id": 4}))), Some(4));
        assert_eq!(created_id(Some(&json!({"reference_id": 5}))), Some(5));
        assert_eq!(created_id(Some(&json!({"message": "ok"}))), None);
        assert_eq!(created_id(None), None);
    }
}
