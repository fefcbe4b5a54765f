//! In-memory stores for tests and throwaway sessions.

use async_trait::async_trait;
use gymlog_application::ports::{StoreError, TokenStore, UserStore};
use gymlog_domain::{TokenPair, User};
use parking_lot::RwLock;

/// Token store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    pair: RwLock<Option<TokenPair>>,
}

impl InMemoryTokenStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store already holding a pair.
    #[must_use]
    pub fn with_pair(access_token: &str, refresh_token: &str) -> Self {
        Self {
            pair: RwLock::new(Some(TokenPair::new(access_token, refresh_token))),
        }
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn get(&self) -> Result<Option<TokenPair>, StoreError> {
        Ok(self.pair.read().clone().filter(TokenPair::is_complete))
    }

    async fn save(&self, access_token: &str, refresh_token: &str) -> Result<(), StoreError> {
        *self.pair.write() = Some(TokenPair::new(access_token, refresh_token));
        Ok(())
    }

    async fn remove(&self) -> Result<(), StoreError> {
        *self.pair.write() = None;
        Ok(())
    }
}

/// User store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    user: RwLock<Option<User>>,
}

impl InMemoryUserStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get(&self) -> Result<Option<User>, StoreError> {
        Ok(self.user.read().clone())
    }

    async fn save(&self, user: &User) -> Result<(), StoreError> {
        *self.user.write() = Some(user.clone());
        Ok(())
    }

    async fn remove(&self) -> Result<(), StoreError> {
        *self.user.write() = None;
        Ok(())
    }
}
