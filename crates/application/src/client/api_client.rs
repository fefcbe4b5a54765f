//! Bearer-authenticated client with refresh-on-401.

use std::sync::Arc;
use std::time::Duration;

use gymlog_domain::{
    AUTHORIZATION, HttpMethod, RequestSpec, ResponseSpec, TokenCode, TokenPair, token_preview,
};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::refresh::{RefreshAttempt, RefreshRole, RefreshState};
use super::sign_out::{SignOutHandler, SignOutRegistration, SignOutSlot};
use crate::error::{ApiError, ApiResult};
use crate::ports::{HttpClient, HttpClientError, TokenStore};

/// Backend endpoint that trades a refresh token for a new pair.
pub const REFRESH_PATH: &str = "/sessions/refresh-token";

const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// HTTP client that attaches the current access token to every request and,
/// while a sign-out handler is registered, recovers from expired tokens.
///
/// When several requests fail with `token.expired` / `token.invalid` at
/// once, exactly one of them performs the refresh exchange; the others
/// wait for it and are replayed with the new token.
pub struct ApiClient<C> {
    transport: C,
    tokens: Arc<dyn TokenStore>,
    default_token: RwLock<Option<String>>,
    refresh: Mutex<RefreshState>,
    sign_out: SignOutSlot,
    rejected_replay: Mutex<Option<String>>,
    refresh_timeout: Duration,
}

impl<C: HttpClient> ApiClient<C> {
    /// Creates a client with no default token and no sign-out handler.
    pub fn new(transport: C, tokens: Arc<dyn TokenStore>) -> Self {
        Self {
            transport,
            tokens,
            default_token: RwLock::new(None),
            refresh: Mutex::new(RefreshState::new()),
            sign_out: SignOutSlot::default(),
            rejected_replay: Mutex::new(None),
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
        }
    }

    /// Bounds the refresh exchange; exceeding it fails the attempt.
    #[must_use]
    pub const fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    /// Returns the underlying transport.
    pub const fn transport(&self) -> &C {
        &self.transport
    }

    /// Returns the token store shared with the session.
    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    /// Sets (or clears) the access token attached to all future requests.
    pub fn set_access_token(&self, token: Option<String>) {
        *self.default_token.write() = token.filter(|t| !t.is_empty());
    }

    /// The access token currently attached to outgoing requests.
    pub fn access_token(&self) -> Option<String> {
        self.default_token.read().clone()
    }

    /// True while a refresh exchange is in flight.
    pub fn is_refreshing(&self) -> bool {
        self.refresh.lock().is_refreshing()
    }

    /// Number of requests parked behind the running refresh.
    pub fn queued_requests(&self) -> usize {
        self.refresh.lock().queued()
    }

    /// Installs `handler` and enables refresh-on-401 until the returned
    /// registration is dropped.
    pub fn register_sign_out_handler(&self, handler: SignOutHandler) -> SignOutRegistration {
        self.sign_out.install(handler)
    }

    /// Sends `request` with the current access token.
    ///
    /// 2xx responses are returned unmodified; everything else is classified
    /// into an [`ApiError`].
    ///
    /// # Errors
    ///
    /// - `Transport` when no response was received
    /// - `SessionExpired` / `RefreshFailed` when an expired token could not
    ///   be recovered
    /// - `Application` / `Unknown` for other error responses
    pub async fn request(&self, request: &RequestSpec) -> ApiResult<ResponseSpec> {
        let outgoing = self.attach_token(request);
        let response = self.send(&outgoing).await?;
        if response.is_success() {
            return Ok(response);
        }

        let Some(sign_out) = self.sign_out.current() else {
            return Err(ApiError::from_response(&response));
        };

        if response.status.is_unauthorized() {
            let code = response
                .error_body()
                .and_then(|body| TokenCode::parse(&body.message));
            if let Some(code) = code {
                return self
                    .recover(request, outgoing.bearer_token(), code, &sign_out)
                    .await;
            }
            warn!(request_id = %request.id, path = %request.path, "Unauthorized, signing out");
            sign_out();
        }

        Err(ApiError::from_response(&response))
    }

    /// Sends a GET and decodes the JSON body.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`]; additionally `Decode` for unexpected bodies.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let response = self.request(&RequestSpec::get(path)).await?;
        decode(&response)
    }

    /// Sends `body` as JSON with `method` and decodes the JSON reply.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`]; additionally `Decode` for unexpected bodies.
    pub async fn send_json<B, T>(&self, method: HttpMethod, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let request = RequestSpec::new(method, path).with_json(body)?;
        let response = self.request(&request).await?;
        decode(&response)
    }

    /// Sends a POST with a JSON body and decodes the JSON reply.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::send_json`].
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        self.send_json(HttpMethod::Post, path, body).await
    }

    /// Sends a PUT with a JSON body and decodes the JSON reply.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::send_json`].
    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        self.send_json(HttpMethod::Put, path, body).await
    }

    fn attach_token(&self, request: &RequestSpec) -> RequestSpec {
        if request.headers.contains(AUTHORIZATION) {
            return request.clone();
        }
        match self.access_token() {
            Some(token) => request.authorized(&token),
            None => request.clone(),
        }
    }

    async fn send(&self, request: &RequestSpec) -> Result<ResponseSpec, HttpClientError> {
        debug!(request_id = %request.id, method = %request.method, path = %request.path, "Sending request");
        let result = self.transport.execute(request).await;
        match &result {
            Ok(response) => debug!(
                request_id = %request.id,
                status = response.status.as_u16(),
                elapsed_ms = u64::try_from(response.duration.as_millis()).unwrap_or(u64::MAX),
                "Received response"
            ),
            Err(e) => debug!(request_id = %request.id, error = %e, "Transport failure"),
        }
        result
    }

    /// Handles a refreshable 401 for `original`, which was sent with
    /// `rejected` as its bearer token.
    async fn recover(
        &self,
        original: &RequestSpec,
        rejected: Option<&str>,
        code: TokenCode,
        sign_out: &SignOutHandler,
    ) -> ApiResult<ResponseSpec> {
        match self.tokens.refresh_token().await {
            Ok(Some(token)) if !token.is_empty() => {}
            Ok(_) => {
                warn!(request_id = %original.id, code = code.as_str(), "No refresh token, signing out");
                sign_out();
                return Err(ApiError::SessionExpired {
                    code: code.as_str().to_string(),
                });
            }
            Err(e) => {
                warn!(request_id = %original.id, error = %e, "Could not read refresh token, signing out");
                sign_out();
                return Err(ApiError::Store(e));
            }
        }

        // Test-and-set happens under one lock acquisition, with no await in between.
        let role = self.refresh.lock().begin();
        let attempt = match role {
            RefreshRole::Follower(outcome) => {
                debug!(request_id = %original.id, "Refresh in progress, queued");
                let token = match outcome.await {
                    Ok(Ok(token)) => token,
                    Ok(Err(e)) => return Err(e),
                    Err(_) => return Err(ApiError::Transport(HttpClientError::Cancelled)),
                };
                return self.replay(original, &token).await;
            }
            RefreshRole::Leader => RefreshAttempt::new(&self.refresh),
        };

        // An attempt that finished while this request was reading the store
        // already replaced the rejected token.
        if let Some(current) = self.access_token().filter(|t| Some(t.as_str()) != rejected) {
            attempt.finish(&Ok(current.clone()));
            debug!(request_id = %original.id, "Token already refreshed, replaying");
            return self.replay(original, &current).await;
        }

        info!(request_id = %original.id, code = code.as_str(), "Refreshing access token");
        let result = match self.tokens.refresh_token().await {
            Ok(Some(token)) if !token.is_empty() => self
                .exchange(&token)
                .await
                .map_err(|e| ApiError::RefreshFailed(Box::new(e))),
            Ok(_) => Err(ApiError::SessionExpired {
                code: code.as_str().to_string(),
            }),
            Err(e) => Err(ApiError::Store(e)),
        };

        match result {
            Ok(pair) => {
                self.set_access_token(Some(pair.access_token.clone()));
                let followers = attempt.finish(&Ok(pair.access_token.clone()));
                info!(
                    token = %token_preview(&pair.access_token),
                    followers,
                    "Access token refreshed"
                );
                self.replay(original, &pair.access_token).await
            }
            Err(error) => {
                let followers = attempt.finish(&Err(error.clone()));
                warn!(error = %error, followers, "Token refresh failed, signing out");
                sign_out();
                Err(error)
            }
        }
    }

    /// Trades the refresh token for a new pair and persists it.
    async fn exchange(&self, refresh_token: &str) -> ApiResult<TokenPair> {
        let timeout_ms = u64::try_from(self.refresh_timeout.as_millis()).unwrap_or(u64::MAX);
        let request = RequestSpec::post(REFRESH_PATH)
            .with_json(&RefreshRequest { refresh_token })?
            .with_timeout_ms(timeout_ms);

        let response = tokio::time::timeout(self.refresh_timeout, self.send(&request))
            .await
            .map_err(|_| HttpClientError::Timeout { timeout_ms })??;

        if !response.is_success() {
            return Err(ApiError::from_response(&response));
        }

        let pair: TokenPair = decode(&response)?;
        if !pair.is_complete() {
            return Err(ApiError::Decode(
                "refresh response is missing a token".to_string(),
            ));
        }

        self.tokens
            .save(&pair.access_token, &pair.refresh_token)
            .await?;
        Ok(pair)
    }

    /// Re-sends `original` with `token`. A replay is never refreshed again.
    ///
    /// Replays rejected with the same token sign out once.
    async fn replay(&self, original: &RequestSpec, token: &str) -> ApiResult<ResponseSpec> {
        let response = self.send(&original.authorized(token)).await?;
        if response.is_success() {
            return Ok(response);
        }
        if response.status.is_unauthorized() {
            let first = {
                let mut last = self.rejected_replay.lock();
                if last.as_deref() == Some(token) {
                    false
                } else {
                    *last = Some(token.to_string());
                    true
                }
            };
            if first {
                warn!(request_id = %original.id, "Replay rejected, signing out");
                self.sign_out.invoke();
            }
        }
        Err(ApiError::from_response(&response))
    }
}

impl<C> std::fmt::Debug for ApiClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("has_token", &self.default_token.read().is_some())
            .field("refresh", &*self.refresh.lock())
            .field("sign_out", &self.sign_out)
            .field("refresh_timeout", &self.refresh_timeout)
            .finish_non_exhaustive()
    }
}

fn decode<T: DeserializeOwned>(response: &ResponseSpec) -> ApiResult<T> {
    response
        .json_body()
        .map_err(|e| ApiError::Decode(e.to_string()))
}
