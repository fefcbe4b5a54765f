//! User store port

use async_trait::async_trait;
use gymlog_domain::User;

use super::StoreError;

/// Repository trait for the signed-in user's profile.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Loads the stored user, `None` when nobody is signed in.
    async fn get(&self) -> Result<Option<User>, StoreError>;

    /// Replaces the stored user.
    async fn save(&self, user: &User) -> Result<(), StoreError>;

    /// Forgets the stored user.
    async fn remove(&self) -> Result<(), StoreError>;
}
