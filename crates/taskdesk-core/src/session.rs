//! Current-user state and the sign-in/sign-up/sign-out flows.
//!
//! Status starts as [`SessionStatus::Unknown`] until [`SessionManager::restore`]
//! has checked the stored tokens. Any session operation raises the loading flag
//! for its duration; a drop guard lowers it again whatever the outcome.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use taskdesk_types::User;

use crate::api::{ApiClient, ApiResult, AuthApi};
use crate::auth::TokenKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Startup token check has not finished
    Unknown,
    Authenticated,
    Unauthenticated,
}

#[derive(Debug)]
struct SessionState {
    status: SessionStatus,
    user: Option<User>,
    /// Number of session operations in flight
    pending: usize,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            status: SessionStatus::Unknown,
            user: None,
            pending: 0,
        }
    }
}

impl SessionState {
    fn sign_out(&mut self) {
        self.user = None;
        self.status = SessionStatus::Unauthenticated;
    }
}

fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Raises the loading flag until dropped.
struct LoadingGuard<'a> {
    state: &'a Mutex<SessionState>,
}

impl<'a> LoadingGuard<'a> {
    fn start(state: &'a Mutex<SessionState>) -> Self {
        lock(state).pending += 1;
        Self { state }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut state = lock(self.state);
        state.pending = state.pending.saturating_sub(1);
    }
}

/// Owns the signed-in user and derives the authentication status.
#[derive(Debug, Clone)]
pub struct SessionManager {
    client: ApiClient,
    auth: AuthApi,
    state: Arc<Mutex<SessionState>>,
}

impl SessionManager {
    /// Creates a manager and subscribes it to forced sign-outs from `client`.
    pub fn new(client: ApiClient) -> Self {
        let state = Arc::new(Mutex::new(SessionState::default()));

        let weak: Weak<Mutex<SessionState>> = Arc::downgrade(&state);
        client.on_forced_sign_out(move || {
            if let Some(state) = weak.upgrade() {
                lock(&state).sign_out();
            }
        });

        Self {
            auth: AuthApi::new(client.clone()),
            client,
            state,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn status(&self) -> SessionStatus {
        lock(&self.state).status
    }

    pub fn user(&self) -> Option<User> {
        lock(&self.state).user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.status() == SessionStatus::Authenticated
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.state).pending > 0
    }

    /// Startup check: fetch the user if an access token is stored.
    pub async fn restore(&self) -> SessionStatus {
        let _loading = LoadingGuard::start(&self.state);

        if self.client.token(TokenKind::Access).is_none() {
            lock(&self.state).sign_out();
            return SessionStatus::Unauthenticated;
        }

        match self.fetch_user_info().await {
            Ok(_) => SessionStatus::Authenticated,
            Err(_) => SessionStatus::Unauthenticated,
        }
    }

    /// Signs in and loads the user.
    ///
    /// Tokens are only persisted once the backend accepted the credentials.
    ///
    /// # Errors
    /// Returns the credential error, a storage error, or the `/auth/me` error
    /// (after which the session is signed out).
    pub async fn sign_in(&self, email: &str, password: &str) -> ApiResult<User> {
        let _loading = LoadingGuard::start(&self.state);
        self.discard_stale_tokens();

        let tokens = match self.auth.sign_in(email, password).await {
            Ok(tokens) => tokens,
            Err(err) => {
                tracing::info!(error = %err, "Sign-in rejected");
                lock(&self.state).sign_out();
                return Err(err);
            }
        };

        if let Err(err) = self.client.store_tokens(&tokens) {
            lock(&self.state).sign_out();
            return Err(err);
        }

        self.fetch_user_info().await
    }

    /// Registers an account; the response carries both the user and tokens.
    ///
    /// # Errors
    /// Returns the backend error or a storage error.
    pub async fn sign_up(&self, name: &str, email: &str, password: &str) -> ApiResult<User> {
        let _loading = LoadingGuard::start(&self.state);
        self.discard_stale_tokens();

        let response = match self.auth.sign_up(name, email, password).await {
            Ok(response) => response,
            Err(err) => {
                tracing::info!(error = %err, "Sign-up rejected");
                lock(&self.state).sign_out();
                return Err(err);
            }
        };

        if let Err(err) = self.client.store_tokens(&response.tokens) {
            lock(&self.state).sign_out();
            return Err(err);
        }

        let mut state = lock(&self.state);
        state.user = Some(response.user.clone());
        state.status = SessionStatus::Authenticated;
        tracing::info!(user_id = %response.user.id, "Signed up");
        Ok(response.user)
    }

    /// Ends the session. The server logout is best-effort; local state is
    /// always cleared.
    pub async fn sign_out(&self) {
        let _loading = LoadingGuard::start(&self.state);

        if let Err(err) = self.auth.logout().await {
            tracing::warn!(error = %err, "Logout request failed");
        }
        if let Err(err) = self.client.clear_tokens() {
            tracing::error!(error = %format!("{err:#}"), "Failed to clear session tokens");
        }
        lock(&self.state).sign_out();
    }

    /// Loads the current user; any failure signs the session out.
    ///
    /// # Errors
    /// Returns the `/auth/me` error.
    pub async fn fetch_user_info(&self) -> ApiResult<User> {
        let _loading = LoadingGuard::start(&self.state);

        match self.auth.me().await {
            Ok(user) => {
                let mut state = lock(&self.state);
                state.user = Some(user.clone());
                state.status = SessionStatus::Authenticated;
                tracing::debug!(user_id = %user.id, "Session user loaded");
                Ok(user)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Failed to load session user");
                self.sign_out().await;
                Err(err)
            }
        }
    }

    fn discard_stale_tokens(&self) {
        if self.client.token(TokenKind::Refresh).is_none()
            && self.client.token(TokenKind::Access).is_none()
        {
            return;
        }
        tracing::debug!("Discarding tokens from a previous session");
        if let Err(err) = self.client.clear_tokens() {
            tracing::warn!(error = %format!("{err:#}"), "Failed to discard previous session tokens");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use taskdesk_types::TokenPair;
    use url::Url;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::api::{ApiErrorKind, ApiRequest};
    use crate::auth::{MemoryTokenStore, TokenStore};

    fn user_json() -> serde_json::Value {
        json!({
            "id": "u1",
            "name": "Ada",
            "email": "ada@example.com",
            "createdAt": "2025-03-01T10:00:00.000Z"
        })
    }

    fn pair(access: &str, refresh: &str) -> TokenPair {
        TokenPair {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
        }
    }

    fn manager(server: &MockServer, store: Arc<MemoryTokenStore>) -> SessionManager {
        let url = Url::parse(&server.uri()).unwrap();
        SessionManager::new(ApiClient::new(&url, store, None).unwrap())
    }

    #[tokio::test]
    async fn test_restore_without_token_is_unauthenticated() {
        let server = MockServer::start().await;
        let session = manager(&server, Arc::new(MemoryTokenStore::new()));
        assert_eq!(session.status(), SessionStatus::Unknown);

        assert_eq!(session.restore().await, SessionStatus::Unauthenticated);
        assert!(server.received_requests().await.unwrap().is_empty());
        assert!(!session.is_loading());
    }

    #[tokio::test]
    async fn test_restore_with_token_loads_user() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/me"))
            .and(header("authorization", "Bearer a1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_json()))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryTokenStore::with_tokens(&pair("a1", "r1")));
        let session = manager(&server, store);

        assert_eq!(session.restore().await, SessionStatus::Authenticated);
        assert_eq!(session.user().unwrap().name, "Ada");
    }

    #[tokio::test]
    async fn test_sign_in_stores_tokens_and_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/signin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "accessToken": "a1",
                "refreshToken": "r1"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/auth/me"))
            .and(header("authorization", "Bearer a1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_json()))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryTokenStore::new());
        let session = manager(&server, Arc::clone(&store));

        let user = session.sign_in("ada@example.com", "hunter22").await.unwrap();
        assert_eq!(user.id, "u1");
        assert!(session.is_authenticated());
        assert!(!session.is_loading());
        assert_eq!(store.get(TokenKind::Access).as_deref(), Some("a1"));
        assert_eq!(store.get(TokenKind::Refresh).as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn test_rejected_sign_in_persists_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/signin"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "message": "Invalid credentials" })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/auth/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_json()))
            .expect(0)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryTokenStore::with_tokens(&pair("stale", "stale-r")));
        let session = manager(&server, Arc::clone(&store));

        let err = session.sign_in("ada@example.com", "wrong").await.unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::Auth);
        assert_eq!(err.message, "HTTP 401: Invalid credentials");
        assert_eq!(session.status(), SessionStatus::Unauthenticated);
        assert!(store.get(TokenKind::Access).is_none());
        assert!(store.get(TokenKind::Refresh).is_none());
    }

    #[tokio::test]
    async fn test_sign_up_uses_inline_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/signup"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "user": user_json(),
                "tokens": { "accessToken": "a2", "refreshToken": "r2" }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/auth/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_json()))
            .expect(0)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryTokenStore::new());
        let session = manager(&server, Arc::clone(&store));

        let user = session
            .sign_up("Ada", "ada@example.com", "hunter22")
            .await
            .unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert!(session.is_authenticated());
        assert_eq!(store.get(TokenKind::Access).as_deref(), Some("a2"));
    }

    #[tokio::test]
    async fn test_sign_out_clears_even_when_logout_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_json()))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/logout"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryTokenStore::with_tokens(&pair("a1", "r1")));
        let session = manager(&server, Arc::clone(&store));
        session.restore().await;
        assert!(session.is_authenticated());

        session.sign_out().await;

        assert_eq!(session.status(), SessionStatus::Unauthenticated);
        assert!(session.user().is_none());
        assert!(store.get(TokenKind::Access).is_none());
        assert!(store.get(TokenKind::Refresh).is_none());
    }

    #[tokio::test]
    async fn test_failed_user_fetch_signs_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/me"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/logout"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryTokenStore::with_tokens(&pair("a1", "r1")));
        let session = manager(&server, Arc::clone(&store));

        let err = session.fetch_user_info().await.unwrap_err();
        assert_eq!(err.status, Some(500));
        assert_eq!(session.status(), SessionStatus::Unauthenticated);
        assert!(store.get(TokenKind::Access).is_none());
    }

    #[tokio::test]
    async fn test_refresh_failure_moves_session_to_unauthenticated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_json()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tasks"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/logout"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryTokenStore::with_tokens(&pair("a1", "r1")));
        let session = manager(&server, Arc::clone(&store));
        session.restore().await;
        assert!(session.is_authenticated());

        let err = session
            .client()
            .send::<serde_json::Value>(&ApiRequest::get("/tasks"))
            .await
            .unwrap_err();
        assert!(err.is_auth());
        assert_eq!(session.status(), SessionStatus::Unauthenticated);
        assert!(session.user().is_none());
        assert!(store.get(TokenKind::Refresh).is_none());
    }

    #[tokio::test]
    async fn test_loading_flag_spans_the_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/me"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(user_json())
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;

        let store = Arc::new(MemoryTokenStore::with_tokens(&pair("a1", "r1")));
        let session = manager(&server, store);

        let background = session.clone();
        let handle = tokio::spawn(async move { background.restore().await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(session.is_loading());

        assert_eq!(handle.await.unwrap(), SessionStatus::Authenticated);
        assert!(!session.is_loading());
    }
}
