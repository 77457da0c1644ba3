//! Response classification on top of a [`Transport`].

use crate::error::{TransportError, TransportResult};
use crate::request::{ApiRequest, RawResponse, Transport};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{debug, warn};

fn summarize_response_body(body: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

/// Pull a human-readable error out of a JSON object body (`error` or `message`).
fn server_message(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let object = value.as_object()?;
    ["error", "message"]
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

/// The body as JSON when it is a JSON object.
fn json_object(body: &[u8]) -> Option<Value> {
    serde_json::from_slice::<Value>(body).ok().filter(Value::is_object)
}

/// Turn a non-success status into `Server`, logging only a body summary.
fn check_status(route: &str, response: RawResponse) -> TransportResult<RawResponse> {
    if !response.is_success() {
        let body_summary = summarize_response_body(&response.body);
        warn!(
            route = %route,
            status = response.status,
            body_summary = %body_summary,
            "API request failed"
        );
        let message = server_message(&response.body)
            .unwrap_or_else(|| format!("upstream error ({body_summary})"));
        return Err(TransportError::Server {
            status: response.status,
            message,
        });
    }

    debug!(
        route = %route,
        status = response.status,
        len = response.body.len(),
        "API request succeeded"
    );
    Ok(response)
}

fn parse_json(response: &RawResponse) -> TransportResult<Value> {
    if response.is_blank() {
        return Err(TransportError::EmptyBody);
    }
    serde_json::from_slice(&response.body).map_err(|e| TransportError::Parse(e.to_string()))
}

/// Typed access to the API: one request, one classified result.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Send a request and fail on anything but a success status.
    async fn send_checked(&self, request: ApiRequest) -> TransportResult<RawResponse> {
        let route = request.route();
        debug!(route = %route, "Sending API request");

        let response = self.transport.send(request).await?;
        check_status(&route, response)
    }

    /// Parsed JSON body of a success response. Empty bodies are `EmptyBody`.
    pub async fn json(&self, request: ApiRequest) -> TransportResult<Value> {
        let response = self.send_checked(request).await?;
        parse_json(&response)
    }

    /// Parsed JSON body of a success or 4xx response.
    ///
    /// For endpoints that report rejected input in the body (`{"error": ..}`,
    /// `{"status": "fail"}`) whatever the status. A 4xx without a JSON object
    /// body, and any 5xx, still fail as `Server`.
    pub async fn json_or_client_error(&self, request: ApiRequest) -> TransportResult<Value> {
        let route = request.route();
        debug!(route = %route, "Sending API request");

        let response = self.transport.send(request).await?;
        if (400..500).contains(&response.status) {
            if let Some(body) = json_object(&response.body) {
                debug!(
                    route = %route,
                    status = response.status,
                    "API request rejected with a JSON body"
                );
                return Ok(body);
            }
        }
        let response = check_status(&route, response)?;
        parse_json(&response)
    }

    /// Success body decoded into `T`. Shape mismatches are `Parse`.
    pub async fn json_as<T: DeserializeOwned>(&self, request: ApiRequest) -> TransportResult<T> {
        let value = self.json(request).await?;
        serde_json::from_value(value).map_err(|e| TransportError::Parse(e.to_string()))
    }

    /// Success body decoded as a JSON array; an empty body means an empty list.
    pub async fn json_list<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> TransportResult<Vec<T>> {
        match self.json_as::<Vec<T>>(request).await {
            Err(TransportError::EmptyBody) => Ok(Vec::new()),
            other => other,
        }
    }

    /// For endpoints that only signal success through the status code.
    ///
    /// Returns the body when it happens to be JSON; an empty or non-JSON body
    /// on a success status is still a success.
    pub async fn confirm(&self, request: ApiRequest) -> TransportResult<Option<Value>> {
        let response = self.send_checked(request).await?;
        if response.is_blank() {
            return Ok(None);
        }
        Ok(serde_json::from_slice(&response.body).ok())
    }

    /// Raw body of a success response (binary downloads). Empty is `EmptyBody`.
    pub async fn bytes(&self, request: ApiRequest) -> TransportResult<Vec<u8>> {
        let response = self.send_checked(request).await?;
        if response.body.is_empty() {
            return Err(TransportError::EmptyBody);
        }
        Ok(response.body)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Method, ScriptedResponse, ScriptedTransport};
    use serde::Deserialize;
    use serde_json::json;

    fn client_with(transport: &Arc<ScriptedTransport>) -> ApiClient {
        ApiClient::new(transport.clone())
    }

    #[tokio::test]
    async fn test_json_success() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(
            Method::Get,
            "/references/1",
            ScriptedResponse::json(200, json!([{"id": 1}])),
        );

        let value = client_with(&transport)
            .json(ApiRequest::get("/references/1"))
            .await
            .unwrap();
        assert_eq!(value, json!([{"id": 1}]));
    }

    #[tokio::test]
    async fn test_unparsable_success_body_is_parse_error() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(Method::Get, "/x", ScriptedResponse::text(200, "<html>"));

        let err = client_with(&transport).json(ApiRequest::get("/x")).await.unwrap_err();
        assert!(matches!(err, TransportError::Parse(_)));
    }

    #[tokio::test]
    async fn test_empty_success_body_is_empty_body_error() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(Method::Get, "/x", ScriptedResponse::text(200, ""));

        let err = client_with(&transport).json(ApiRequest::get("/x")).await.unwrap_err();
        assert_eq!(err, TransportError::EmptyBody);
    }

    #[tokio::test]
    async fn test_non_success_status_uses_server_message() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(
            Method::Get,
            "/x",
            ScriptedResponse::json(404, json!({"error": "no such paper"})),
        );
        transport.push(Method::Get, "/y", ScriptedResponse::text(500, "Traceback ..."));

        let client = client_with(&transport);
        let not_found = client.json(ApiRequest::get("/x")).await.unwrap_err();
        assert_eq!(
            not_found,
            TransportError::Server {
                status: 404,
                message: "no such paper".into()
            }
        );

        let crashed = client.json(ApiRequest::get("/y")).await.unwrap_err();
        match crashed {
            TransportError::Server { status, message } => {
                assert_eq!(status, 500);
                assert!(message.starts_with("upstream error (len=13"));
                assert!(!message.contains("Traceback"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_network_error_passes_through() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(Method::Get, "/x", ScriptedResponse::network_error("connection refused"));

        let err = client_with(&transport).json(ApiRequest::get("/x")).await.unwrap_err();
        assert!(matches!(err, TransportError::Network(_)));
    }

    #[tokio::test]
    async fn test_json_as_shape_mismatch_is_parse_error() {
        #[derive(Debug, Deserialize)]
        struct Added {
            #[allow(dead_code)]
            paper_id: i64,
        }

        let transport = Arc::new(ScriptedTransport::new());
        transport.push(Method::Get, "/x", ScriptedResponse::json(200, json!({"id": "nope"})));

        let err = client_with(&transport)
            .json_as::<Added>(ApiRequest::get("/x"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Parse(_)));
    }

    #[tokio::test]
    async fn test_json_list_treats_empty_body_as_empty_list() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(Method::Get, "/x", ScriptedResponse::text(200, ""));

        let items: Vec<Value> = client_with(&transport)
            .json_list(ApiRequest::get("/x"))
            .await
            .unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_confirm_accepts_any_success_body() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(Method::Delete, "/references/3", ScriptedResponse::text(204, ""));
        transport.push(Method::Delete, "/references/4", ScriptedResponse::text(200, "deleted"));
        transport.push(
            Method::Delete,
            "/references/5",
            ScriptedResponse::json(200, json!({"ok": true})),
        );

        let client = client_with(&transport);
        assert_eq!(client.confirm(ApiRequest::delete("/references/3")).await.unwrap(), None);
        assert_eq!(client.confirm(ApiRequest::delete("/references/4")).await.unwrap(), None);
        assert_eq!(
            client.confirm(ApiRequest::delete("/references/5")).await.unwrap(),
            Some(json!({"ok": true}))
        );
    }

    #[tokio::test]
    async fn test_bytes_requires_body() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(
            Method::Post,
            "/export_pdf",
            ScriptedResponse::bytes(200, b"%PDF-1.4".to_vec()),
        );
        transport.push(Method::Post, "/export_pdf", ScriptedResponse::bytes(200, Vec::new()));

        let client = client_with(&transport);
        let request =
            ApiRequest::post("/export_pdf", &json!({"title": "t", "content": "c"})).unwrap();
        assert_eq!(client.bytes(request.clone()).await.unwrap(), b"%PDF-1.4".to_vec());
        assert_eq!(client.bytes(request).await.unwrap_err(), TransportError::EmptyBody);
    }

    #[tokio::test]
    async fn test_json_or_client_error_returns_4xx_json_body() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(
            Method::Post,
            "/citations/generate",
            ScriptedResponse::json(400, json!({"error": "text too short"})),
        );

        let client = client_with(&transport);
        let request = ApiRequest::post("/citations/generate", &json!({"text": "x"})).unwrap();
        assert_eq!(
            client.json_or_client_error(request).await.unwrap(),
            json!({"error": "text too short"})
        );
    }

    #[tokio::test]
    async fn test_json_or_client_error_still_fails_on_5xx_and_plain_4xx() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push(
            Method::Post,
            "/login",
            ScriptedResponse::json(500, json!({"error": "db down"})),
        );
        transport.push(Method::Post, "/login", ScriptedResponse::text(404, "<html>"));

        let client = client_with(&transport);
        let request = ApiRequest::post("/login", &json!({})).unwrap();
        assert_eq!(
            client.json_or_client_error(request.clone()).await.unwrap_err(),
            TransportError::Server {
                status: 500,
                message: "db down".into()
            }
        );
        assert!(matches!(
            client.json_or_client_error(request).await.unwrap_err(),
            TransportError::Server { status: 404, .. }
        ));
    }

    #[test]
    fn test_summarize_response_body_hides_content() {
        let summary = summarize_response_body(b"secret");
        assert!(summary.starts_with("len=6,digest="));
        assert!(!summary.contains("secret"));
    }
}
