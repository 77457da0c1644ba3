//! Request/response types and the transport seam.

use crate::error::TransportResult;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

/// HTTP methods used by the paper service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request against the API, with a path relative to the base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    /// GET request without a body.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    /// DELETE request without a body.
    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            path: path.into(),
            body: None,
        }
    }

    /// POST request with a JSON body.
    pub fn post<T: Serialize>(path: impl Into<String>, body: &T) -> TransportResult<Self> {
        let body = serde_json::to_value(body)
            .map_err(|e| crate::TransportError::InvalidRequest(e.to_string()))?;
        Ok(Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
        })
    }

    /// Route key used in logs and by the scripted transport, e.g. `POST /login`.
    pub fn route(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// Status and body of an HTTP response, before any interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// True when the body is empty or only whitespace.
    pub fn is_blank(&self) -> bool {
        self.body.iter().all(|b| b.is_ascii_whitespace())
    }
}

/// Moves a request to the backend and returns the raw response.
///
/// Implementations report only failures that happen before a status line is
/// received; any status, success or not, is returned as a [`RawResponse`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> TransportResult<RawResponse>;
}
