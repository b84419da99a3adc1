//! HTTP entry point for every backend call.
//!
//! The access token is read from the [`TokenStore`] and attached to each
//! request explicitly, so there is no shared default header that could change
//! under an in-flight request.
//!
//! # Refresh-and-retry
//! A 401 on a session request triggers at most one `POST /auth/refresh`,
//! followed by exactly one re-issue of the original request carrying the new
//! access token. The retry budget lives in [`ApiClient::execute`]'s call frame,
//! so a backend that keeps answering 401 cannot cause a refresh loop.
//! Refreshes on one client are serialized. A request whose 401 arrives while
//! another request is refreshing waits, then retries with the rotated token.
//! If the refresh itself fails, the client forces a sign-out and returns the
//! refresh error. Registered sign-out hooks run after the tokens are cleared.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use taskdesk_types::{RefreshRequest, TokenPair};
use url::Url;

use super::error::{ApiError, ApiResult};
use crate::auth::{TokenKind, TokenStore};
use crate::config::Config;

const REFRESH_PATH: &str = "/auth/refresh";
const LOGOUT_PATH: &str = "/auth/logout";

/// Callback fired after the client forced a sign-out.
type SignOutHook = Arc<dyn Fn() + Send + Sync>;

/// How a request relates to the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestAuth {
    /// No bearer token, never refreshed (credential endpoints)
    Anonymous,
    /// Bearer token attached, refreshed once on 401
    Session,
}

/// A backend request that can be issued more than once.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    auth: RequestAuth,
}

impl ApiRequest {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            auth: RequestAuth::Session,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    #[must_use]
    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    /// Attaches a JSON body.
    ///
    /// # Errors
    /// Returns a parse error if the body cannot be represented as JSON.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> ApiResult<Self> {
        let value = serde_json::to_value(body).map_err(|e| ApiError::parse("request body", &e))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Sends without a bearer token and never refreshes.
    #[must_use]
    pub fn anonymous(mut self) -> Self {
        self.auth = RequestAuth::Anonymous;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

struct Inner {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenStore>,
    sign_out_hooks: Mutex<Vec<SignOutHook>>,
    /// Serializes refreshes; the refresh token rotates on every use
    refresh_lock: tokio::sync::Mutex<()>,
}

/// Cheaply cloneable handle to the backend.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Creates a client for `base_url` backed by `tokens`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: &Url,
        tokens: Arc<dyn TokenStore>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Failed to build HTTP client")?;

        if tokens.get(TokenKind::Access).is_some() {
            tracing::debug!("Using stored access token");
        }

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url: base_url.as_str().trim_end_matches('/').to_string(),
                tokens,
                sign_out_hooks: Mutex::new(Vec::new()),
                refresh_lock: tokio::sync::Mutex::new(()),
            }),
        })
    }

    /// Creates a client from the loaded configuration.
    ///
    /// # Errors
    /// Returns an error if the API URL is invalid or the HTTP client cannot be built.
    pub fn from_config(config: &Config, tokens: Arc<dyn TokenStore>) -> Result<Self> {
        let base_url = config.effective_api_url()?;
        Self::new(&base_url, tokens, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Registers a callback fired whenever a failed refresh forces a sign-out.
    pub fn on_forced_sign_out(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.inner
            .sign_out_hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(hook));
    }

    /// Returns the stored token of the given kind.
    pub fn token(&self, kind: TokenKind) -> Option<String> {
        self.inner.tokens.get(kind)
    }

    /// Persists a freshly issued token pair.
    ///
    /// # Errors
    /// Returns a storage error if the pair cannot be written.
    pub fn store_tokens(&self, tokens: &TokenPair) -> ApiResult<()> {
        self.inner
            .tokens
            .set(tokens)
            .map_err(|e| ApiError::storage(&e))
    }

    /// Removes both tokens from storage.
    ///
    /// # Errors
    /// Returns an error if the backing storage cannot be updated.
    pub fn clear_tokens(&self) -> Result<()> {
        self.inner.tokens.clear()
    }

    /// Sends `request` and decodes a JSON body.
    ///
    /// # Errors
    /// See [`ApiClient::execute`]; also fails with a parse error on an undecodable body.
    pub async fn send<T: DeserializeOwned>(&self, request: &ApiRequest) -> ApiResult<T> {
        let response = self.execute(request).await?;
        decode(response, request.path()).await
    }

    /// Sends `request` and ignores the response body.
    ///
    /// # Errors
    /// See [`ApiClient::execute`].
    pub async fn send_empty(&self, request: &ApiRequest) -> ApiResult<()> {
        self.execute(request).await.map(drop)
    }

    /// Sends `request`, refreshing the session once on 401.
    ///
    /// # Errors
    /// - Network error if the transport fails
    /// - Auth error for a 401 that could not be recovered
    /// - Server error for any other non-2xx status
    /// - The refresh error itself when refreshing failed (the session is signed out first)
    pub async fn execute(&self, request: &ApiRequest) -> ApiResult<Response> {
        let access = match request.auth {
            RequestAuth::Anonymous => None,
            RequestAuth::Session => self.inner.tokens.get(TokenKind::Access),
        };

        let response = self.dispatch(request, access.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED || request.auth != RequestAuth::Session {
            return check_status(response).await;
        }

        let fresh_access = {
            let _refreshing = self.inner.refresh_lock.lock().await;
            let current = self.inner.tokens.get(TokenKind::Access);
            if current.is_some() && current != access {
                // Rotated by a concurrent request while this one waited for the lock.
                tracing::debug!(path = %request.path, "Session already refreshed, retrying");
                current
            } else {
                let Some(refresh_token) = self.inner.tokens.get(TokenKind::Refresh) else {
                    return check_status(response).await;
                };

                tracing::debug!(method = %request.method, path = %request.path, "Access token rejected, refreshing session");
                match self.refresh(&refresh_token).await {
                    Ok(tokens) => Some(tokens.access_token),
                    Err(err) => {
                        tracing::warn!(error = %err, "Session refresh failed, signing out");
                        self.force_sign_out().await;
                        return Err(err);
                    }
                }
            }
        };

        let retried = self.dispatch(request, fresh_access.as_deref()).await?;
        check_status(retried).await
    }

    /// Best-effort `POST /auth/logout` with the stored refresh token.
    ///
    /// Does nothing when no refresh token is stored. Carries the bearer token
    /// but never refreshes.
    ///
    /// # Errors
    /// Returns the transport or HTTP error of the logout call.
    pub async fn logout(&self) -> ApiResult<()> {
        let Some(refresh_token) = self.inner.tokens.get(TokenKind::Refresh) else {
            return Ok(());
        };
        let request = ApiRequest::post(LOGOUT_PATH).json(&RefreshRequest {
            refresh_token: &refresh_token,
        })?;
        let access = self.inner.tokens.get(TokenKind::Access);
        let response = self.dispatch(&request, access.as_deref()).await?;
        check_status(response).await.map(drop)
    }

    // Goes straight to `dispatch`: the refresh call must never re-enter `execute`.
    async fn refresh(&self, refresh_token: &str) -> ApiResult<TokenPair> {
        let request = ApiRequest::post(REFRESH_PATH)
            .json(&RefreshRequest { refresh_token })?
            .anonymous();
        let response = check_status(self.dispatch(&request, None).await?).await?;
        let tokens: TokenPair = decode(response, REFRESH_PATH).await?;
        self.store_tokens(&tokens)?;
        tracing::info!("Session refreshed");
        Ok(tokens)
    }

    async fn force_sign_out(&self) {
        if let Err(err) = self.logout().await {
            tracing::warn!(error = %err, "Logout after failed refresh was rejected");
        }
        if let Err(err) = self.clear_tokens() {
            tracing::error!(error = %format!("{err:#}"), "Failed to clear session tokens");
        }

        let hooks: Vec<SignOutHook> = self
            .inner
            .sign_out_hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for hook in hooks {
            hook();
        }
    }

    async fn dispatch(&self, request: &ApiRequest, access: Option<&str>) -> ApiResult<Response> {
        let url = format!("{}{}", self.inner.base_url, request.path);
        let mut builder = self
            .inner
            .http
            .request(request.method.clone(), &url)
            .header(CONTENT_TYPE, "application/json");

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = access {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        builder.send().await.map_err(|e| {
            tracing::warn!(method = %request.method, path = %request.path, error = %e, "Request failed");
            ApiError::network(&e)
        })
    }
}

async fn check_status(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::http_status(status.as_u16(), &body))
}

async fn decode<T: DeserializeOwned>(response: Response, context: &str) -> ApiResult<T> {
    let bytes = response.bytes().await.map_err(|e| ApiError::network(&e))?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::parse(&format!("response from {context}"), &e))
}
