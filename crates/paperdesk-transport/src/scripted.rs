//! In-process transport that replays queued responses.
//!
//! Used by tests across the workspace in place of a live backend. Responses
//! are queued per route (`METHOD path`) and consumed in FIFO order; every
//! request is recorded for later inspection.

use crate::error::{TransportError, TransportResult};
use crate::request::{ApiRequest, Method, RawResponse, Transport};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// One queued outcome for a route.
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    outcome: Result<RawResponse, TransportError>,
    delay: Option<Duration>,
}

impl ScriptedResponse {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self::bytes(status, body.to_string().into_bytes())
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self::bytes(status, body.as_bytes().to_vec())
    }

    pub fn bytes(status: u16, body: Vec<u8>) -> Self {
        Self {
            outcome: Ok(RawResponse::new(status, body)),
            delay: None,
        }
    }

    pub fn network_error(message: &str) -> Self {
        Self {
            outcome: Err(TransportError::Network(message.to_string())),
            delay: None,
        }
    }

    /// Hold the response back for `delay` before completing.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// [`Transport`] backed by per-route response queues.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    queues: Mutex<HashMap<String, VecDeque<ScriptedResponse>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `method path`.
    pub fn push(&self, method: Method, path: &str, response: ScriptedResponse) {
        self.queues
            .lock()
            .entry(format!("{method} {path}"))
            .or_default()
            .push_back(response);
    }

    /// All requests seen so far, in arrival order.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }

    /// Requests seen for one route.
    pub fn requests_for(&self, method: Method, path: &str) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .cloned()
            .collect()
    }

    /// Number of queued responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.queues.lock().values().map(VecDeque::len).sum()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> TransportResult<RawResponse> {
        let route = request.route();
        self.requests.lock().push(request);

        let scripted = self
            .queues
            .lock()
            .get_mut(&route)
            .and_then(VecDeque::pop_front);

        let Some(scripted) = scripted else {
            return Err(TransportError::Network(format!(
                "no scripted response for {route}"
            )));
        };

        if let Some(delay) = scripted.delay {
            tokio::time::sleep(delay).await;
        }

        scripted.outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_responses_replay_in_order_per_route() {
        let transport = ScriptedTransport::new();
        transport.push(Method::Get, "/a", ScriptedResponse::text(200, "1"));
        transport.push(Method::Get, "/a", ScriptedResponse::text(200, "2"));
        transport.push(Method::Get, "/b", ScriptedResponse::text(500, "x"));

        assert_eq!(transport.send(ApiRequest::get("/a")).await.unwrap().body, b"1");
        assert_eq!(transport.send(ApiRequest::get("/b")).await.unwrap().status, 500);
        assert_eq!(transport.send(ApiRequest::get("/a")).await.unwrap().body, b"2");
        assert_eq!(transport.remaining(), 0);
    }

    #[tokio::test]
    async fn test_unscripted_route_is_network_error() {
        let transport = ScriptedTransport::new();
        let err = transport.send(ApiRequest::get("/missing")).await.unwrap_err();
        assert!(
            matches!(err, TransportError::Network(message) if message.contains("GET /missing"))
        );
    }

    #[tokio::test]
    async fn test_requests_are_recorded() {
        let transport = ScriptedTransport::new();
        transport.push(Method::Post, "/login", ScriptedResponse::json(200, json!({})));

        let request = ApiRequest::post("/login", &json!({"email": "a@b.com"})).unwrap();
        transport.send(request.clone()).await.unwrap();

        assert_eq!(transport.requests_for(Method::Post, "/login"), vec![request]);
        assert!(transport.requests_for(Method::Get, "/login").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_holds_response() {
        let transport = ScriptedTransport::new();
        transport.push(
            Method::Get,
            "/slow",
            ScriptedResponse::text(200, "late").with_delay(Duration::from_secs(5)),
        );

        let started = tokio::time::Instant::now();
        let response = transport.send(ApiRequest::get("/slow")).await.unwrap();
        assert_eq!(response.body, b"late");
        assert!(started.elapsed() >= Duration::from_secs(5));
    }
}
