//! reqwest-backed transport.

use crate::error::{TransportError, TransportResult};
use crate::request::{ApiRequest, Method, RawResponse, Transport};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// HTTP transport for the paper service.
#[derive(Clone)]
pub struct HttpTransport {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport for `base_url` (e.g. `http://127.0.0.1:5000`).
    ///
    /// `timeout` bounds each request end to end.
    pub fn new(base_url: &str, timeout: Duration) -> TransportResult<Self> {
        let parsed = Url::parse(base_url).map_err(|e| {
            TransportError::InvalidRequest(format!("invalid base URL {base_url}: {e}"))
        })?;

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    /// Absolute URL for an API path.
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> TransportResult<RawResponse> {
        let url = self.url(&request.path);

        let builder = match request.method {
            Method::Get => self.http_client.get(&url),
            Method::Post => self.http_client.post(&url),
            Method::Delete => self.http_client.delete(&url),
        };
        let builder = match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();

        debug!(method = %request.method, url = %url, status, "HTTP exchange complete");

        Ok(RawResponse { status, body })
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
