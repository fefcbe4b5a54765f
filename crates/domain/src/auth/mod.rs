//! Authentication domain types

mod types;

pub use types::{ErrorBody, TokenCode, TokenPair, token_preview};
