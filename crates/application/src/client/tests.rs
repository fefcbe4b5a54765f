#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use gymlog_domain::{RequestSpec, ResponseSpec, StatusCode, TokenPair};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::{ApiClient, REFRESH_PATH, SignOutRegistration};
use crate::error::ApiError;
use crate::ports::{HttpClient, HttpClientError, StoreError, TokenStore};

/// How the mock backend answers `POST /sessions/refresh-token`.
#[derive(Clone)]
enum RefreshReply {
    Issue(TokenPair),
    NetworkError,
    Rejected,
}

/// Backend double: accepts exactly one access token, answers everything
/// else with a 401 carrying `reject_message`.
struct MockBackend {
    valid_token: Mutex<String>,
    reject_message: Mutex<String>,
    refresh_reply: RefreshReply,
    refresh_gate: Option<Arc<Semaphore>>,
    refresh_calls: AtomicUsize,
    fail_transport: bool,
    seen: Mutex<Vec<(String, Option<String>)>>,
    refresh_timeouts: Mutex<Vec<Option<u64>>>,
}

impl MockBackend {
    fn new(refresh_reply: RefreshReply) -> Self {
        Self {
            valid_token: Mutex::new("T2".to_string()),
            reject_message: Mutex::new("token.expired".to_string()),
            refresh_reply,
            refresh_gate: None,
            refresh_calls: AtomicUsize::new(0),
            fail_transport: false,
            seen: Mutex::new(Vec::new()),
            refresh_timeouts: Mutex::new(Vec::new()),
        }
    }

    fn gated(mut self, gate: &Arc<Semaphore>) -> Self {
        self.refresh_gate = Some(Arc::clone(gate));
        self
    }

    fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Bearer tokens sent to `path`, in order.
    fn bearers_for(&self, path: &str) -> Vec<Option<String>> {
        self.seen
            .lock()
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, bearer)| bearer.clone())
            .collect()
    }
}

impl HttpClient for MockBackend {
    async fn execute(&self, request: &RequestSpec) -> Result<ResponseSpec, HttpClientError> {
        self.seen.lock().push((
            request.path.clone(),
            request.bearer_token().map(str::to_string),
        ));

        if self.fail_transport {
            return Err(HttpClientError::ConnectionFailed("reset by peer".to_string()));
        }

        if request.path == REFRESH_PATH {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            self.refresh_timeouts.lock().push(request.timeout_ms);
            if let Some(gate) = &self.refresh_gate {
                gate.acquire().await.unwrap().forget();
            }
            return match &self.refresh_reply {
                RefreshReply::Issue(pair) => Ok(ResponseSpec::json(200, &json!(pair))),
                RefreshReply::NetworkError => Err(HttpClientError::ConnectionRefused {
                    host: "localhost".to_string(),
                    port: 3333,
                }),
                RefreshReply::Rejected => Ok(ResponseSpec::json(
                    401,
                    &json!({ "message": "refresh_token.invalid" }),
                )),
            };
        }

        if request.bearer_token() == Some(self.valid_token.lock().as_str()) {
            Ok(ResponseSpec::json(200, &json!({ "path": request.path })))
        } else {
            let message = self.reject_message.lock().clone();
            Ok(ResponseSpec::json(401, &json!({ "message": message })))
        }
    }
}

#[derive(Default)]
struct MemoryTokens {
    pair: Mutex<Option<TokenPair>>,
    saves: AtomicUsize,
}

impl MemoryTokens {
    fn with(access: &str, refresh: &str) -> Self {
        Self {
            pair: Mutex::new(Some(TokenPair::new(access, refresh))),
            saves: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokens {
    async fn get(&self) -> Result<Option<TokenPair>, StoreError> {
        Ok(self.pair.lock().clone().filter(TokenPair::is_complete))
    }

    async fn save(&self, access_token: &str, refresh_token: &str) -> Result<(), StoreError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.pair.lock() = Some(TokenPair::new(access_token, refresh_token));
        Ok(())
    }

    async fn remove(&self) -> Result<(), StoreError> {
        *self.pair.lock() = None;
        Ok(())
    }
}

struct Harness {
    client: Arc<ApiClient<Arc<MockBackend>>>,
    backend: Arc<MockBackend>,
    tokens: Arc<MemoryTokens>,
    sign_outs: Arc<AtomicUsize>,
    _registration: SignOutRegistration,
}

fn harness(backend: MockBackend, tokens: MemoryTokens) -> Harness {
    let backend = Arc::new(backend);
    let tokens = Arc::new(tokens);
    let store: Arc<dyn TokenStore> = tokens.clone();
    let client = ApiClient::new(Arc::clone(&backend), store);
    client.set_access_token(Some("T1".to_string()));

    let sign_outs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&sign_outs);
    let registration = client.register_sign_out_handler(Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    Harness {
        client: Arc::new(client),
        backend,
        tokens,
        sign_outs,
        _registration: registration,
    }
}

fn issued() -> RefreshReply {
    RefreshReply::Issue(TokenPair::new("T2", "R2"))
}

/// Starts `n` requests concurrently and waits until all but the leader are
/// parked behind the refresh.
async fn fan_out(h: &Harness, n: usize) -> JoinSet<(usize, Result<ResponseSpec, ApiError>)> {
    let mut set = JoinSet::new();
    for i in 0..n {
        let client = Arc::clone(&h.client);
        set.spawn(async move {
            let result = client.request(&RequestSpec::get(format!("/r{i}"))).await;
            (i, result)
        });
    }
    for _ in 0..1_000 {
        if h.client.queued_requests() == n - 1 && h.backend.refresh_calls() == 1 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(h.client.queued_requests(), n - 1);
    set
}

#[tokio::test]
async fn test_valid_token_is_attached_and_response_passed_through() {
    let h = harness(MockBackend::new(issued()), MemoryTokens::with("T2", "R1"));
    h.client.set_access_token(Some("T2".to_string()));

    let response = h.client.request(&RequestSpec::get("/groups")).await.unwrap();

    assert_eq!(response.status, StatusCode::new(200));
    assert_eq!(h.backend.bearers_for("/groups"), vec![Some("T2".to_string())]);
    assert_eq!(h.backend.refresh_calls(), 0);
}

#[tokio::test]
async fn test_transport_error_propagates_unchanged() {
    let mut backend = MockBackend::new(issued());
    backend.fail_transport = true;
    let h = harness(backend, MemoryTokens::with("T1", "R1"));

    let error = h.client.request(&RequestSpec::get("/groups")).await.unwrap_err();

    assert_eq!(
        error,
        ApiError::Transport(HttpClientError::ConnectionFailed("reset by peer".to_string()))
    );
    assert_eq!(h.sign_outs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_concurrent_expiry_refreshes_once_and_replays_all() {
    let gate = Arc::new(Semaphore::new(0));
    let h = harness(
        MockBackend::new(issued()).gated(&gate),
        MemoryTokens::with("T1", "R1"),
    );

    let mut set = fan_out(&h, 5).await;
    assert!(h.client.is_refreshing());
    gate.add_permits(1);

    let mut succeeded = 0;
    while let Some(joined) = set.join_next().await {
        let (i, result) = joined.unwrap();
        let response = result.unwrap();
        assert_eq!(response.json_body::<serde_json::Value>().unwrap()["path"], format!("/r{i}"));
        assert_eq!(
            h.backend.bearers_for(&format!("/r{i}")),
            vec![Some("T1".to_string()), Some("T2".to_string())]
        );
        succeeded += 1;
    }

    assert_eq!(succeeded, 5);
    assert_eq!(h.backend.refresh_calls(), 1);
    assert_eq!(h.tokens.saves.load(Ordering::SeqCst), 1);
    assert_eq!(
        h.tokens.get().await.unwrap(),
        Some(TokenPair::new("T2", "R2"))
    );
    assert_eq!(h.client.access_token(), Some("T2".to_string()));
    assert_eq!(h.sign_outs.load(Ordering::SeqCst), 0);
    assert!(!h.client.is_refreshing());
    assert_eq!(h.client.queued_requests(), 0);
}

#[tokio::test]
async fn test_refresh_request_carries_only_the_refresh_token() {
    let h = harness(MockBackend::new(issued()), MemoryTokens::with("T1", "R1"));

    h.client.request(&RequestSpec::get("/history")).await.unwrap();

    assert_eq!(h.backend.bearers_for(REFRESH_PATH), vec![None]);
    assert_eq!(*h.backend.refresh_timeouts.lock(), vec![Some(15_000)]);
}

#[tokio::test]
async fn test_refresh_network_failure_rejects_all_and_signs_out_once() {
    let gate = Arc::new(Semaphore::new(0));
    let h = harness(
        MockBackend::new(RefreshReply::NetworkError).gated(&gate),
        MemoryTokens::with("T1", "R1"),
    );

    let mut set = fan_out(&h, 2).await;
    gate.add_permits(1);

    let expected = ApiError::RefreshFailed(Box::new(ApiError::Transport(
        HttpClientError::ConnectionRefused {
            host: "localhost".to_string(),
            port: 3333,
        },
    )));
    while let Some(joined) = set.join_next().await {
        let (_, result) = joined.unwrap();
        assert_eq!(result.unwrap_err(), expected);
    }

    assert_eq!(h.sign_outs.load(Ordering::SeqCst), 1);
    assert_eq!(h.backend.refresh_calls(), 1);
    assert_eq!(h.tokens.saves.load(Ordering::SeqCst), 0);
    assert_eq!(
        h.tokens.get().await.unwrap(),
        Some(TokenPair::new("T1", "R1"))
    );
    assert!(!h.client.is_refreshing());
}

#[tokio::test]
async fn test_refresh_rejected_by_backend_fails_attempt() {
    let h = harness(
        MockBackend::new(RefreshReply::Rejected),
        MemoryTokens::with("T1", "R1"),
    );

    let error = h.client.request(&RequestSpec::get("/groups")).await.unwrap_err();

    assert!(error.is_session_expired());
    assert!(matches!(
        error,
        ApiError::RefreshFailed(inner) if matches!(*inner, ApiError::Application { .. })
    ));
    assert_eq!(h.sign_outs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_refresh_token_signs_out_without_exchange() {
    let h = harness(MockBackend::new(issued()), MemoryTokens::default());

    let error = h.client.request(&RequestSpec::get("/groups")).await.unwrap_err();

    assert_eq!(
        error,
        ApiError::SessionExpired {
            code: "token.expired".to_string()
        }
    );
    assert_eq!(h.sign_outs.load(Ordering::SeqCst), 1);
    assert_eq!(h.backend.refresh_calls(), 0);
}

#[tokio::test]
async fn test_revoked_token_signs_out_without_refresh() {
    let h = harness(MockBackend::new(issued()), MemoryTokens::with("T1", "R1"));
    *h.backend.reject_message.lock() = "token.revoked".to_string();

    let error = h.client.request(&RequestSpec::get("/groups")).await.unwrap_err();

    assert_eq!(
        error,
        ApiError::Application {
            status: StatusCode::UNAUTHORIZED,
            message: "token.revoked".to_string()
        }
    );
    assert_eq!(h.sign_outs.load(Ordering::SeqCst), 1);
    assert_eq!(h.backend.refresh_calls(), 0);
}

#[tokio::test]
async fn test_request_after_refresh_is_not_queued() {
    let h = harness(MockBackend::new(issued()), MemoryTokens::with("T1", "R1"));

    h.client.request(&RequestSpec::get("/groups")).await.unwrap();
    assert!(!h.client.is_refreshing());

    h.client.request(&RequestSpec::get("/history")).await.unwrap();

    assert_eq!(h.backend.bearers_for("/history"), vec![Some("T2".to_string())]);
    assert_eq!(h.backend.refresh_calls(), 1);
}

#[tokio::test]
async fn test_expiry_after_completed_refresh_starts_new_attempt() {
    let h = harness(MockBackend::new(issued()), MemoryTokens::with("T1", "R1"));
    h.client.request(&RequestSpec::get("/groups")).await.unwrap();

    // The backend rotates again; T2 is now stale too.
    *h.backend.valid_token.lock() = "T3".to_string();
    let error = h.client.request(&RequestSpec::get("/history")).await.unwrap_err();

    // A second exchange ran (it issues T2 again, so the replay is rejected).
    assert_eq!(h.backend.refresh_calls(), 2);
    assert!(error.is_session_expired());
}

#[tokio::test]
async fn test_rejected_replay_is_not_refreshed_again() {
    let h = harness(MockBackend::new(issued()), MemoryTokens::with("T1", "R1"));
    *h.backend.valid_token.lock() = "never".to_string();

    let error = h.client.request(&RequestSpec::get("/groups")).await.unwrap_err();

    assert_eq!(
        error,
        ApiError::SessionExpired {
            code: "token.expired".to_string()
        }
    );
    assert_eq!(h.backend.refresh_calls(), 1);
    assert_eq!(h.backend.bearers_for("/groups").len(), 2);
    assert_eq!(h.sign_outs.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_refresh_timeout_fails_attempt() {
    let gate = Arc::new(Semaphore::new(0));
    let backend = Arc::new(MockBackend::new(issued()).gated(&gate));
    let tokens: Arc<dyn TokenStore> = Arc::new(MemoryTokens::with("T1", "R1"));
    let client = ApiClient::new(Arc::clone(&backend), tokens)
        .with_refresh_timeout(Duration::from_millis(20));
    client.set_access_token(Some("T1".to_string()));
    let _registration = client.register_sign_out_handler(Arc::new(|| {}));

    let error = client.request(&RequestSpec::get("/groups")).await.unwrap_err();

    assert_eq!(
        error,
        ApiError::RefreshFailed(Box::new(ApiError::Transport(HttpClientError::Timeout {
            timeout_ms: 20
        })))
    );
    assert!(!client.is_refreshing());
}

#[tokio::test]
async fn test_without_handler_expired_token_is_not_refreshed() {
    let backend = Arc::new(MockBackend::new(issued()));
    let tokens: Arc<dyn TokenStore> = Arc::new(MemoryTokens::with("T1", "R1"));
    let client = ApiClient::new(Arc::clone(&backend), tokens);
    client.set_access_token(Some("T1".to_string()));

    let registration = client.register_sign_out_handler(Arc::new(|| {}));
    registration.unregister();

    let error = client.request(&RequestSpec::get("/groups")).await.unwrap_err();

    assert!(matches!(error, ApiError::SessionExpired { .. }));
    assert_eq!(backend.refresh_calls(), 0);
}

#[tokio::test]
async fn test_explicit_authorization_header_wins() {
    let h = harness(MockBackend::new(issued()), MemoryTokens::with("T1", "R1"));

    let request = RequestSpec::get("/groups").authorized("T2");
    h.client.request(&request).await.unwrap();

    assert_eq!(h.backend.bearers_for("/groups"), vec![Some("T2".to_string())]);
}

#[tokio::test]
async fn test_get_json_decodes_body() {
    let h = harness(MockBackend::new(issued()), MemoryTokens::with("T2", "R1"));
    h.client.set_access_token(Some("T2".to_string()));

    let body: serde_json::Value = h.client.get_json("/groups").await.unwrap();
    assert_eq!(body, json!({ "path": "/groups" }));

    let error = h.client.get_json::<Vec<String>>("/groups").await.unwrap_err();
    assert!(matches!(error, ApiError::Decode(_)));
}

#[tokio::test]
async fn test_invalid_token_code_triggers_refresh() {
    let h = harness(MockBackend::new(issued()), MemoryTokens::with("T1", "R1"));
    *h.backend.reject_message.lock() = "token.invalid".to_string();

    h.client.request(&RequestSpec::get("/groups")).await.unwrap();

    assert_eq!(h.backend.refresh_calls(), 1);
    assert_eq!(
        h.backend.bearers_for("/groups"),
        vec![Some("T1".to_string()), Some("T2".to_string())]
    );
    assert_eq!(h.sign_outs.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_rejected_replays_sign_out_once() {
    let gate = Arc::new(Semaphore::new(0));
    let h = harness(
        MockBackend::new(issued()).gated(&gate),
        MemoryTokens::with("T1", "R1"),
    );
    *h.backend.valid_token.lock() = "never".to_string();

    let mut set = fan_out(&h, 3).await;
    gate.add_permits(1);

    while let Some(joined) = set.join_next().await {
        let (_, result) = joined.unwrap();
        assert!(result.unwrap_err().is_session_expired());
    }

    assert_eq!(h.backend.refresh_calls(), 1);
    assert_eq!(h.sign_outs.load(Ordering::SeqCst), 1);
}

/// Token store whose next `get` snapshots the pair and then parks until
/// released, so a refresh can complete while the read is suspended.
struct ParkingTokens {
    inner: MemoryTokens,
    park_next: AtomicBool,
    parked: AtomicBool,
    release: Semaphore,
}

#[async_trait]
impl TokenStore for ParkingTokens {
    async fn get(&self) -> Result<Option<TokenPair>, StoreError> {
        let snapshot = self.inner.get().await;
        if self.park_next.swap(false, Ordering::SeqCst) {
            self.parked.store(true, Ordering::SeqCst);
            self.release.acquire().await.unwrap().forget();
        }
        snapshot
    }

    async fn save(&self, access_token: &str, refresh_token: &str) -> Result<(), StoreError> {
        self.inner.save(access_token, refresh_token).await
    }

    async fn remove(&self) -> Result<(), StoreError> {
        self.inner.remove().await
    }
}

#[tokio::test]
async fn test_refresh_completed_during_store_read_is_reused() {
    let backend = Arc::new(MockBackend::new(issued()));
    let tokens = Arc::new(ParkingTokens {
        inner: MemoryTokens::with("T1", "R1"),
        park_next: AtomicBool::new(true),
        parked: AtomicBool::new(false),
        release: Semaphore::new(0),
    });
    let store: Arc<dyn TokenStore> = tokens.clone();
    let client = Arc::new(ApiClient::new(Arc::clone(&backend), store));
    client.set_access_token(Some("T1".to_string()));
    let sign_outs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&sign_outs);
    let _registration = client.register_sign_out_handler(Arc::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    // `/b` is rejected with T1 and stalls reading the old refresh token.
    let stalled = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.request(&RequestSpec::get("/b")).await })
    };
    while !tokens.parked.load(Ordering::SeqCst) {
        tokio::task::yield_now().await;
    }

    // `/a` runs a whole refresh attempt meanwhile.
    client.request(&RequestSpec::get("/a")).await.unwrap();
    assert!(!client.is_refreshing());

    tokens.release.add_permits(1);
    stalled.await.unwrap().unwrap();

    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(
        backend.bearers_for("/b"),
        vec![Some("T1".to_string()), Some("T2".to_string())]
    );
    assert_eq!(sign_outs.load(Ordering::SeqCst), 0);
    assert_eq!(
        tokens.get().await.unwrap(),
        Some(TokenPair::new("T2", "R2"))
    );
}
