//! Typed calls to the fitness backend.

use std::sync::Arc;

use gymlog_domain::{DomainError, Exercise, HistoryDay, NewUser, ProfileUpdate, SessionGrant};
use serde::Serialize;
use serde::de::IgnoredAny;
use url::Url;

use crate::client::ApiClient;
use crate::error::ApiResult;
use crate::ports::HttpClient;

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct CompletedExercise {
    exercise_id: u64,
}

/// Endpoints of the fitness backend, on top of an [`ApiClient`].
pub struct FitnessApi<C> {
    client: Arc<ApiClient<C>>,
    base_url: Url,
}

impl<C: HttpClient> FitnessApi<C> {
    /// Creates the API facade. `base_url` is only used to build asset URLs;
    /// requests go through the client's transport.
    pub const fn new(client: Arc<ApiClient<C>>, base_url: Url) -> Self {
        Self { client, base_url }
    }

    /// The client used for every call.
    pub const fn client(&self) -> &Arc<ApiClient<C>> {
        &self.client
    }

    /// `POST /sessions`
    ///
    /// # Errors
    ///
    /// Wrong credentials surface as `ApiError::Application`.
    pub async fn sign_in(&self, email: &str, password: &str) -> ApiResult<SessionGrant> {
        self.client
            .post_json("/sessions", &Credentials { email, password })
            .await
    }

    /// `POST /users`
    ///
    /// # Errors
    ///
    /// Fails if the email is already registered.
    pub async fn sign_up(&self, user: &NewUser) -> ApiResult<()> {
        let _: IgnoredAny = self.client.post_json("/users", user).await?;
        Ok(())
    }

    /// `GET /groups`: muscle group names.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn groups(&self) -> ApiResult<Vec<String>> {
        self.client.get_json("/groups").await
    }

    /// `GET /exercises/bygroup/{group}`
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn exercises_by_group(&self, group: &str) -> ApiResult<Vec<Exercise>> {
        self.client
            .get_json(&format!("/exercises/bygroup/{}", encode_segment(group)))
            .await
    }

    /// `GET /exercises/{id}`
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn exercise(&self, id: u64) -> ApiResult<Exercise> {
        self.client.get_json(&format!("/exercises/{id}")).await
    }

    /// `POST /history`: logs the exercise as done now.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn mark_done(&self, exercise_id: u64) -> ApiResult<()> {
        let _: IgnoredAny = self
            .client
            .post_json("/history", &CompletedExercise { exercise_id })
            .await?;
        Ok(())
    }

    /// `GET /history`: completed exercises grouped by day.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn history(&self) -> ApiResult<Vec<HistoryDay>> {
        self.client.get_json("/history").await
    }

    /// `PUT /users`
    ///
    /// # Errors
    ///
    /// A wrong `old_password` surfaces as `ApiError::Application`.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> ApiResult<()> {
        let _: IgnoredAny = self.client.put_json("/users", update).await?;
        Ok(())
    }

    /// URL of an uploaded avatar.
    ///
    /// # Errors
    ///
    /// Returns an error if the file name does not form a valid URL.
    pub fn avatar_url(&self, file: &str) -> Result<Url, DomainError> {
        self.asset_url("avatar", file)
    }

    /// URL of an exercise's demo animation.
    ///
    /// # Errors
    ///
    /// Returns an error if the file name does not form a valid URL.
    pub fn exercise_demo_url(&self, file: &str) -> Result<Url, DomainError> {
        self.asset_url("exercise/demo", file)
    }

    /// URL of an exercise's thumbnail.
    ///
    /// # Errors
    ///
    /// Returns an error if the file name does not form a valid URL.
    pub fn exercise_thumb_url(&self, file: &str) -> Result<Url, DomainError> {
        self.asset_url("exercise/thumb", file)
    }

    fn asset_url(&self, prefix: &str, file: &str) -> Result<Url, DomainError> {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        base.join(&format!("{prefix}/{}", encode_segment(file)))
            .map_err(|e| DomainError::InvalidPath(e.to_string()))
    }
}

/// Percent-encodes one path segment.
fn encode_segment(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gymlog_domain::{RequestSpec, ResponseSpec, TokenPair};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    use crate::ports::{HttpClientError, StoreError, TokenStore};

    /// Answers every request with `reply` and records what was sent.
    struct Recorder {
        reply: Value,
        sent: Mutex<Vec<RequestSpec>>,
    }

    impl HttpClient for Recorder {
        async fn execute(&self, request: &RequestSpec) -> Result<ResponseSpec, HttpClientError> {
            self.sent.lock().push(request.clone());
            Ok(ResponseSpec::json(200, &self.reply))
        }
    }

    struct NoTokens;

    #[async_trait]
    impl TokenStore for NoTokens {
        async fn get(&self) -> Result<Option<TokenPair>, StoreError> {
            Ok(None)
        }
        async fn save(&self, _: &str, _: &str) -> Result<(), StoreError> {
            Ok(())
        }
        async fn remove(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn api(reply: Value) -> FitnessApi<Recorder> {
        let transport = Recorder {
            reply,
            sent: Mutex::new(Vec::new()),
        };
        let client = ApiClient::new(transport, Arc::new(NoTokens));
        FitnessApi::new(Arc::new(client), Url::parse("http://192.168.4.47:3333").unwrap())
    }

    fn last_sent(api: &FitnessApi<Recorder>) -> RequestSpec {
        api.client().transport().sent.lock().last().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_exercises_by_group_encodes_segment() {
        let api = api(json!([]));
        api.exercises_by_group("upper back").await.unwrap();
        assert_eq!(last_sent(&api).path, "/exercises/bygroup/upper%20back");
    }

    #[tokio::test]
    async fn test_mark_done_body() {
        let api = api(json!({}));
        api.mark_done(12).await.unwrap();

        let sent = last_sent(&api);
        assert_eq!(sent.path, "/history");
        assert_eq!(sent.body, Some(json!({ "exercise_id": 12 })));
    }

    #[tokio::test]
    async fn test_sign_in_posts_credentials() {
        let api = api(json!({
            "user": { "id": 1, "name": "Ana", "email": "ana@example.com" },
            "token": "t1",
            "refresh_token": "r1"
        }));

        let grant = api.sign_in("ana@example.com", "secret").await.unwrap();

        let (user, tokens) = grant.into_parts().unwrap();
        assert_eq!(user.name, "Ana");
        assert_eq!(tokens, TokenPair::new("t1", "r1"));
        assert_eq!(
            last_sent(&api).body,
            Some(json!({ "email": "ana@example.com", "password": "secret" }))
        );
    }

    #[tokio::test]
    async fn test_update_profile_uses_put() {
        let api = api(Value::Null);
        api.update_profile(&ProfileUpdate {
            name: "Ana B".to_string(),
            password: Some("new".to_string()),
            old_password: Some("old".to_string()),
        })
        .await
        .unwrap();

        let sent = last_sent(&api);
        assert_eq!(sent.method, gymlog_domain::HttpMethod::Put);
        assert_eq!(sent.path, "/users");
    }

    #[test]
    fn test_asset_urls() {
        let api = api(Value::Null);
        assert_eq!(
            api.avatar_url("ana-1.png").unwrap().as_str(),
            "http://192.168.4.47:3333/avatar/ana-1.png"
        );
        assert_eq!(
            api.exercise_thumb_url("pull up.gif").unwrap().as_str(),
            "http://192.168.4.47:3333/exercise/thumb/pull%20up.gif"
        );
    }
}
