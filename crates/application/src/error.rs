//! Application error types

use gymlog_domain::{DomainError, ResponseSpec, StatusCode, TokenCode};
use thiserror::Error;

use crate::ports::{HttpClientError, StoreError};

/// Everything a backend call can fail with.
///
/// `Clone` so a single refresh failure can be handed to every request that
/// was queued behind it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// No response was received (network failure, timeout, cancellation).
    #[error("{0}")]
    Transport(#[from] HttpClientError),

    /// The access token expired or is invalid and no refresh was possible.
    #[error("session expired ({code})")]
    SessionExpired {
        /// The 401 message code that reported it.
        code: String,
    },

    /// The refresh exchange failed; the inner error is what it failed with.
    #[error("token refresh failed: {0}")]
    RefreshFailed(Box<ApiError>),

    /// Error response carrying a structured message.
    #[error("{message}")]
    Application {
        /// Response status.
        status: StatusCode,
        /// Message from the error body.
        message: String,
    },

    /// Error response without a structured message.
    #[error("request failed with status {status}")]
    Unknown {
        /// Response status.
        status: StatusCode,
        /// Raw body, lossily decoded.
        body: String,
    },

    /// The token or user store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] DomainError),

    /// A 2xx body did not have the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl ApiError {
    /// Classifies a non-2xx response.
    #[must_use]
    pub fn from_response(response: &ResponseSpec) -> Self {
        match response.error_body() {
            Some(body)
                if response.status.is_unauthorized()
                    && TokenCode::parse(&body.message).is_some() =>
            {
                Self::SessionExpired { code: body.message }
            }
            Some(body) => Self::Application {
                status: response.status,
                message: body.message,
            },
            None => Self::Unknown {
                status: response.status,
                body: response.text(),
            },
        }
    }

    /// True for failures that end the signed-in session.
    #[must_use]
    pub const fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired { .. } | Self::RefreshFailed(_))
    }

    /// The single message shown to the user for this error.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Application { message, .. } => message.clone(),
            Self::SessionExpired { .. } | Self::RefreshFailed(_) => {
                "Your session has expired, please sign in again".to_string()
            }
            Self::Transport(_) => {
                "Could not reach the server, check your connection and try again".to_string()
            }
            Self::Unknown { .. } | Self::Store(_) | Self::InvalidRequest(_) | Self::Decode(_) => {
                "Something went wrong, try again later".to_string()
            }
        }
    }
}

/// Result type alias for backend calls.
pub type ApiResult<T> = Result<T, ApiError>;
