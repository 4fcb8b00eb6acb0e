//! Gluco-meter REST API Client
//!
//! Thin wrapper over `reqwest` that knows the base URL, stamps every request
//! with a request id and turns non-success responses into [`ClientError`].

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use uuid::Uuid;

use super::dto::{LoginForm, RegisterRequest, TokenResponse, UserProfile};
use super::error::{extract_detail, ClientError};
use crate::config::ApiConfig;

/// Header carrying the per-request correlation id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// HTTP client for the gluco-meter API
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client from the API configuration
    pub fn new(config: &ApiConfig) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("gluco/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.resolved_base_url(),
        })
    }

    /// Create a client against an explicit base URL with default settings
    pub fn with_base_url(base_url: &str) -> Result<Self, ClientError> {
        Self::new(&ApiConfig {
            base_url: Some(base_url.to_string()),
            ..ApiConfig::default()
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an API path such as `/readings`
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Start an unauthenticated request
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request_id = Uuid::new_v4().to_string();
        let url = self.url(path);
        tracing::debug!(request_id = %request_id, method = %method, url = %url, "API request");

        self.http
            .request(method, url)
            .header(REQUEST_ID_HEADER, request_id)
    }

    /// Start a request carrying `Authorization: Bearer <token>`
    pub fn authorized(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        self.request(method, path).bearer_auth(token)
    }

    /// Exchange credentials for an access token (`POST /login`, form encoded)
    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenResponse, ClientError> {
        let form = LoginForm {
            username: email,
            password,
        };
        self.send_json(self.request(Method::POST, "/login").form(&form))
            .await
    }

    /// Create an account (`POST /register`)
    #[tracing::instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: &RegisterRequest) -> Result<(), ClientError> {
        self.send_empty(self.request(Method::POST, "/register").json(request))
            .await
    }

    /// Fetch the profile behind a token (`GET /me`)
    pub async fn current_user(&self, token: &str) -> Result<UserProfile, ClientError> {
        self.send_json(self.authorized(Method::GET, "/me", token))
            .await
    }

    /// Send a request and decode a JSON body
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = self.send(request).await?;
        let body = response.text().await.map_err(ClientError::from_transport)?;
        serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Send a request whose success body is irrelevant
    pub async fn send_empty(&self, request: RequestBuilder) -> Result<(), ClientError> {
        self.send(request).await.map(|_| ())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!(error = %e, "API transport error");
            ClientError::from_transport(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let detail = extract_detail(&text);
        tracing::warn!(
            status = status.as_u16(),
            detail = detail.as_deref().unwrap_or(""),
            "API request rejected"
        );

        Err(ClientError::ApiError {
            status: status.as_u16(),
            detail,
        })
    }
}
