//! Token store port
//!
//! Durable home of the signed-in token pair.

use async_trait::async_trait;
use gymlog_domain::TokenPair;

/// Errors raised by the token and user stores.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Repository trait for the token pair.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Loads the stored pair.
    ///
    /// # Returns
    /// `None` when no session is stored or either token is empty.
    async fn get(&self) -> Result<Option<TokenPair>, StoreError>;

    /// Replaces the stored pair.
    ///
    /// # Errors
    /// Returns an error if the pair cannot be written.
    async fn save(&self, access_token: &str, refresh_token: &str) -> Result<(), StoreError>;

    /// Forgets the stored pair. Removing an absent pair is not an error.
    async fn remove(&self) -> Result<(), StoreError>;

    /// Convenience accessor for the refresh half.
    async fn refresh_token(&self) -> Result<Option<String>, StoreError> {
        Ok(self.get().await?.map(|pair| pair.refresh_token))
    }
}
