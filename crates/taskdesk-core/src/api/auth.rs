//! `/auth` endpoints.

use taskdesk_types::{SignInRequest, SignUpRequest, SignUpResponse, TokenPair, User};

use super::client::{ApiClient, ApiRequest};
use super::error::ApiResult;

#[derive(Debug, Clone)]
pub struct AuthApi {
    client: ApiClient,
}

impl AuthApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// `POST /auth/signin`. Does not persist the returned pair.
    ///
    /// # Errors
    /// Returns an auth error for rejected credentials.
    pub async fn sign_in(&self, email: &str, password: &str) -> ApiResult<TokenPair> {
        let request = ApiRequest::post("/auth/signin")
            .json(&SignInRequest { email, password })?
            .anonymous();
        self.client.send(&request).await
    }

    /// `POST /auth/signup`. Does not persist the returned pair.
    ///
    /// # Errors
    /// Returns the backend error (e.g. an already registered email).
    pub async fn sign_up(&self, name: &str, email: &str, password: &str) -> ApiResult<SignUpResponse> {
        let request = ApiRequest::post("/auth/signup")
            .json(&SignUpRequest {
                name,
                email,
                password,
            })?
            .anonymous();
        self.client.send(&request).await
    }

    /// `GET /auth/me` for the current access token.
    ///
    /// # Errors
    /// Returns an auth error when the session cannot be refreshed.
    pub async fn me(&self) -> ApiResult<User> {
        self.client.send(&ApiRequest::get("/auth/me")).await
    }

    /// `POST /auth/logout`. See [`ApiClient::logout`].
    ///
    /// # Errors
    /// Returns the transport or HTTP error of the logout call.
    pub async fn logout(&self) -> ApiResult<()> {
        self.client.logout().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::auth::MemoryTokenStore;

    fn auth_api(server: &MockServer) -> AuthApi {
        let url = Url::parse(&server.uri()).unwrap();
        let client = ApiClient::new(&url, Arc::new(MemoryTokenStore::new()), None).unwrap();
        AuthApi::new(client)
    }

    #[tokio::test]
    async fn test_sign_in_posts_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/signin"))
            .and(body_json(json!({ "email": "ada@example.com", "password": "hunter22" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "accessToken": "a1",
                "refreshToken": "r1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = auth_api(&server)
            .sign_in("ada@example.com", "hunter22")
            .await
            .unwrap();
        assert_eq!(tokens.access_token, "a1");
        assert_eq!(tokens.refresh_token, "r1");
    }

    #[tokio::test]
    async fn test_sign_up_returns_user_and_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/signup"))
            .and(body_json(json!({
                "name": "Ada",
                "email": "ada@example.com",
                "password": "hunter22"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "user": {
                    "id": "u1",
                    "name": "Ada",
                    "email": "ada@example.com",
                    "createdAt": "2025-03-01T10:00:00.000Z"
                },
                "tokens": { "accessToken": "a1", "refreshToken": "r1" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = auth_api(&server)
            .sign_up("Ada", "ada@example.com", "hunter22")
            .await
            .unwrap();
        assert_eq!(response.user.id, "u1");
        assert_eq!(response.tokens.refresh_token, "r1");
    }

    #[tokio::test]
    async fn test_logout_without_refresh_token_is_noop() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/logout"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        auth_api(&server).logout().await.unwrap();
    }
}
