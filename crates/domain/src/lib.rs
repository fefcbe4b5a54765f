//! Gymlog Domain - Core business types
//!
//! This crate defines the domain model for the Gymlog fitness API client.
//! All types here are pure Rust with no I/O dependencies.

pub mod auth;
pub mod error;
pub mod fitness;
pub mod request;
pub mod response;

pub use auth::{ErrorBody, TokenCode, TokenPair, token_preview};
pub use error::{DomainError, DomainResult};
pub use fitness::{
    Exercise, HistoryDay, HistoryEntry, NewUser, ProfileUpdate, SessionGrant, User,
};
pub use request::{AUTHORIZATION, Header, Headers, HttpMethod, RequestSpec};
pub use response::{ResponseSpec, StatusCode};
