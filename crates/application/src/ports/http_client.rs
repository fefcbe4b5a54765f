//! HTTP transport port

use std::future::Future;
use std::sync::Arc;

use gymlog_domain::{RequestSpec, ResponseSpec};
use thiserror::Error;

/// Failures where no HTTP response was received.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpClientError {
    /// The base URL and path did not form a valid URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// No response within the deadline.
    #[error("request timed out after {timeout_ms} ms")]
    Timeout {
        /// The deadline that elapsed.
        timeout_ms: u64,
    },

    /// The server refused the connection.
    #[error("connection refused by {host}:{port}")]
    ConnectionRefused {
        /// Target host.
        host: String,
        /// Target port.
        port: u16,
    },

    /// Any other connection-level failure.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The call was abandoned before completing.
    #[error("request cancelled")]
    Cancelled,

    /// Anything else the transport reports.
    #[error("{0}")]
    Other(String),
}

/// Port for executing HTTP requests against the backend.
///
/// Implementations return every HTTP status as a [`ResponseSpec`]; only a
/// missing response is an error.
pub trait HttpClient: Send + Sync {
    /// Executes an HTTP request and returns the response.
    ///
    /// # Errors
    ///
    /// Returns an error if no response was received.
    fn execute(
        &self,
        request: &RequestSpec,
    ) -> impl Future<Output = Result<ResponseSpec, HttpClientError>> + Send;
}

impl<T: HttpClient> HttpClient for Arc<T> {
    fn execute(
        &self,
        request: &RequestSpec,
    ) -> impl Future<Output = Result<ResponseSpec, HttpClientError>> + Send {
        (**self).execute(request)
    }
}
