//! Authenticated API client.
//!
//! This module provides:
//! - Bearer token attachment on every outgoing request
//! - Single-flight token refresh on `token.expired` / `token.invalid` 401s
//! - Queue-and-replay of requests that fail while a refresh is running
//! - Sign-out handler registration

mod api_client;
mod refresh;
mod sign_out;

#[cfg(test)]
mod tests;

pub use api_client::{ApiClient, REFRESH_PATH};
pub use refresh::{PendingRequest, RefreshRole, RefreshState};
pub use sign_out::{SignOutHandler, SignOutRegistration};
