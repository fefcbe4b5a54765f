//! Gymlog Infrastructure - Adapters and implementations
//!
//! This crate provides concrete implementations of the ports
//! defined in the application layer, plus settings loading.

pub mod adapters;
pub mod persistence;
pub mod serialization;
pub mod settings;

pub use adapters::ReqwestHttpClient;
pub use persistence::{
    FileTokenStore, FileUserStore, InMemoryTokenStore, InMemoryUserStore, TokioFileSystem,
};
pub use serialization::{SerializationError, from_json_bytes, to_json_stable, to_json_stable_bytes};
pub use settings::{ClientSettings, SettingsError};
