//! Request descriptor handed to the transport.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AUTHORIZATION, Header, Headers, HttpMethod};
use crate::error::{DomainError, DomainResult};

/// Everything needed to send (and later replay) one backend call.
///
/// `path` is relative to the backend base URL and always starts with `/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSpec {
    /// Identifier used to correlate log lines for one logical call.
    pub id: Uuid,
    /// HTTP method
    pub method: HttpMethod,
    /// Path below the base URL, e.g. `/exercises/bygroup/back`
    pub path: String,
    /// Request-specific headers
    #[serde(default)]
    pub headers: Headers,
    /// Optional JSON body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    /// Per-request timeout override in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl RequestSpec {
    /// Creates a request with no headers and no body.
    #[must_use]
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        };
        Self {
            id: Uuid::now_v7(),
            method,
            path,
            headers: Headers::new(),
            body: None,
            timeout_ms: None,
        }
    }

    /// Creates a GET request.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    /// Creates a POST request.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    /// Attaches a JSON body serialized from `body`.
    ///
    /// # Errors
    ///
    /// Returns an error if `body` cannot be represented as JSON.
    pub fn with_json<T: Serialize>(mut self, body: &T) -> DomainResult<Self> {
        let value =
            serde_json::to_value(body).map_err(|e| DomainError::InvalidBody(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, header: Header) -> Self {
        self.headers.add(header);
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Returns a copy carrying `Authorization: Bearer <token>`, replacing
    /// whatever credential the request had.
    #[must_use]
    pub fn authorized(&self, token: &str) -> Self {
        let mut request = self.clone();
        request.headers.set(AUTHORIZATION, format!("Bearer {token}"));
        request
    }

    /// Returns the bearer token carried by this request, if any.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|v| v.strip_prefix("Bearer "))
    }
}
