//! Signed-in session: tokens, cached user and the sign-out wiring.

use std::sync::{Arc, Weak};

use gymlog_domain::{ProfileUpdate, User, token_preview};
use parking_lot::RwLock;
use tracing::{info, warn};

use super::FitnessApi;
use crate::client::{ApiClient, SignOutRegistration};
use crate::error::{ApiError, ApiResult};
use crate::ports::{HttpClient, TokenStore, UserStore};

/// Owns the persisted session and keeps the client's default token in sync
/// with it.
pub struct Session<C> {
    api: FitnessApi<C>,
    tokens: Arc<dyn TokenStore>,
    users: Arc<dyn UserStore>,
    user: RwLock<Option<User>>,
}

impl<C: HttpClient> Session<C> {
    /// Creates a signed-out session. The token store should be the one the
    /// client refreshes into.
    pub fn new(api: FitnessApi<C>, users: Arc<dyn UserStore>) -> Self {
        let tokens = Arc::clone(api.client().token_store());
        Self {
            api,
            tokens,
            users,
            user: RwLock::new(None),
        }
    }

    /// The backend endpoints.
    pub const fn api(&self) -> &FitnessApi<C> {
        &self.api
    }

    fn client(&self) -> &ApiClient<C> {
        self.api.client()
    }

    /// The signed-in user, if any.
    pub fn current_user(&self) -> Option<User> {
        self.user.read().clone()
    }

    /// Signs in and persists the user and token pair.
    ///
    /// # Errors
    ///
    /// Returns the backend error, `Decode` if the grant lacks the user or a
    /// token, or `Store` if persisting fails.
    pub async fn sign_in(&self, email: &str, password: &str) -> ApiResult<User> {
        let grant = self.api.sign_in(email, password).await?;
        let (user, pair) = grant
            .into_parts()
            .ok_or_else(|| ApiError::Decode("sign-in response is incomplete".to_string()))?;

        self.tokens.save(&pair.access_token, &pair.refresh_token).await?;
        self.users.save(&user).await?;
        self.client().set_access_token(Some(pair.access_token.clone()));
        *self.user.write() = Some(user.clone());

        info!(user_id = user.id, token = %token_preview(&pair.access_token), "Signed in");
        Ok(user)
    }

    /// Loads a previously persisted session.
    ///
    /// Returns `None` unless both the user and a complete token pair are
    /// stored.
    ///
    /// # Errors
    ///
    /// Returns `Store` if either store cannot be read.
    pub async fn restore(&self) -> ApiResult<Option<User>> {
        let user = self.users.get().await?;
        let pair = self.tokens.get().await?;

        match (user, pair) {
            (Some(user), Some(pair)) if pair.is_complete() => {
                self.client().set_access_token(Some(pair.access_token));
                *self.user.write() = Some(user.clone());
                Ok(Some(user))
            }
            _ => Ok(None),
        }
    }

    /// Forgets the session locally and on disk.
    ///
    /// # Errors
    ///
    /// Returns `Store` if a store cannot be cleared; in-memory state is
    /// cleared regardless.
    pub async fn sign_out(&self) -> ApiResult<()> {
        self.forget();
        self.clear_stores().await
    }

    /// Updates the profile and the cached user's name.
    ///
    /// # Errors
    ///
    /// Returns the backend error or `Store` if the user cannot be persisted.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> ApiResult<Option<User>> {
        self.api.update_profile(update).await?;

        let updated = self.current_user().map(|user| User {
            name: update.name.clone(),
            ..user
        });
        if let Some(user) = &updated {
            self.users.save(user).await?;
            *self.user.write() = Some(user.clone());
        }
        Ok(updated)
    }

    fn forget(&self) {
        self.client().set_access_token(None);
        *self.user.write() = None;
    }

    async fn clear_stores(&self) -> ApiResult<()> {
        let users = self.users.remove().await;
        let tokens = self.tokens.remove().await;
        users?;
        tokens?;
        Ok(())
    }
}

impl<C: HttpClient + 'static> Session<C> {
    /// Registers this session's sign-out as the client's handler, enabling
    /// refresh-on-401 until the registration is dropped.
    ///
    /// The handler clears the default token and cached user immediately;
    /// stored data is removed on a background task of the current runtime.
    pub fn activate(self: &Arc<Self>) -> SignOutRegistration {
        let session: Weak<Self> = Arc::downgrade(self);
        let runtime = tokio::runtime::Handle::try_current().ok();

        self.client().register_sign_out_handler(Arc::new(move || {
            let Some(session) = session.upgrade() else {
                return;
            };
            session.forget();
            info!("Session ended by the client");

            let Some(runtime) = &runtime else {
                warn!("No runtime, stored session left in place");
                return;
            };
            runtime.spawn(async move {
                if let Err(e) = session.clear_stores().await {
                    warn!(error = %e, "Failed to clear stored session");
                }
            });
        }))
    }
}
