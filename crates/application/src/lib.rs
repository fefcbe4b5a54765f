//! Gymlog Application - Authenticated client, ports and use cases
//!
//! This crate defines the application layer with:
//! - Port traits (transport, token and user storage, file system)
//! - The authenticated API client with single-flight token refresh
//! - Use cases for the fitness backend and the sign-in session

pub mod client;
pub mod error;
pub mod ports;
pub mod use_cases;

pub use client::{ApiClient, RefreshRole, RefreshState, SignOutHandler, SignOutRegistration};
pub use error::{ApiError, ApiResult};
pub use ports::{
    FileSystem, FileSystemError, HttpClient, HttpClientError, StoreError, TokenStore, UserStore,
};
pub use use_cases::{FitnessApi, Session};
