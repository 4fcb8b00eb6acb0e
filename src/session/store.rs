//! Session Store
//!
//! Single owner of the bearer token and the authenticated profile. Reading
//! components get an `Arc<SessionStore>` and go through
//! [`SessionStore::authorized_call`] for every request.

use reqwest::{Method, RequestBuilder};
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};

use super::token_store::TokenStore;
use crate::client::{ApiClient, ClientError, UserProfile};

/// Observable session state
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    /// Bearer token, present once a login or restore produced one
    pub token: Option<String>,
    /// Profile, present only while `token` has been validated by `/me`
    pub user: Option<UserProfile>,
    /// True until the startup restore attempt has finished
    pub initializing: bool,
    /// True while a login or signup pipeline is running
    pub auth_loading: bool,
    /// Last confirmation text
    pub message: Option<String>,
    /// Last failure text
    pub error: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            token: None,
            user: None,
            initializing: true,
            auth_loading: false,
            message: None,
            error: None,
        }
    }
}

/// Holds the authenticated session for one process
pub struct SessionStore {
    pub(super) client: ApiClient,
    pub(super) tokens: Arc<dyn TokenStore>,
    pub(super) state: RwLock<SessionState>,
    restored: OnceCell<()>,
}

impl SessionStore {
    pub fn new(client: ApiClient, tokens: Arc<dyn TokenStore>) -> Self {
        Self {
            client,
            tokens,
            state: RwLock::new(SessionState::default()),
            restored: OnceCell::new(),
        }
    }

    /// The underlying API client
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Copy of the whole state
    pub async fn snapshot(&self) -> SessionState {
        self.state.read().await.clone()
    }

    pub async fn token(&self) -> Option<String> {
        self.state.read().await.token.clone()
    }

    pub async fn user(&self) -> Option<UserProfile> {
        self.state.read().await.user.clone()
    }

    /// A validated user is present
    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.user.is_some()
    }

    pub async fn is_initializing(&self) -> bool {
        self.state.read().await.initializing
    }

    /// Initials of the signed-in user, empty when signed out
    pub async fn initials(&self) -> String {
        self.state
            .read()
            .await
            .user
            .as_ref()
            .map(UserProfile::initials)
            .unwrap_or_default()
    }

    pub async fn message(&self) -> Option<String> {
        self.state.read().await.message.clone()
    }

    pub async fn error(&self) -> Option<String> {
        self.state.read().await.error.clone()
    }

    pub async fn dismiss_message(&self) {
        self.state.write().await.message = None;
    }

    pub async fn dismiss_error(&self) {
        self.state.write().await.error = None;
    }

    /// Restore a session left behind by an earlier run.
    ///
    /// Runs at most once; later calls wait for the first one and return.
    pub async fn restore(&self) {
        self.restored.get_or_init(|| self.restore_once()).await;
    }

    async fn restore_once(&self) {
        let stored = match self.tokens.load().await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stored token");
                None
            }
        };

        if let Some(token) = stored {
            tracing::debug!("Restoring stored session");
            self.state.write().await.token = Some(token.clone());
            if let Err(e) = self.adopt_token(&token).await {
                tracing::info!(error = %e, "Stored session is no longer valid");
            }
        }

        self.state.write().await.initializing = false;
    }

    /// Validate `token` against `/me` and populate the user.
    ///
    /// On any failure both the stored and in-memory token are dropped.
    pub(super) async fn adopt_token(&self, token: &str) -> Result<UserProfile, ClientError> {
        match self.client.current_user(token).await {
            Ok(user) => {
                let mut state = self.state.write().await;
                // a logout or newer login may have raced this fetch
                if state.token.as_deref() == Some(token) {
                    state.user = Some(user.clone());
                }
                Ok(user)
            }
            Err(e) => {
                self.forget_token(token).await;
                Err(e)
            }
        }
    }

    /// Drop `token` from memory and storage, unless a newer token replaced it
    async fn forget_token(&self, token: &str) {
        let mut state = self.state.write().await;
        if state.token.as_deref() != Some(token) {
            return;
        }
        state.token = None;
        state.user = None;
        drop(state);

        if let Err(e) = self.tokens.clear().await {
            tracing::warn!(error = %e, "Failed to clear stored token");
        }
    }

    /// Start a request to an authorized endpoint.
    ///
    /// Fails with [`ClientError::NotAuthenticated`] when no token is held;
    /// that is a caller bug, not something to retry.
    pub async fn authorized_call(
        &self,
        method: Method,
        path: &str,
    ) -> Result<RequestBuilder, ClientError> {
        let token = self.token().await.ok_or(ClientError::NotAuthenticated)?;
        Ok(self.client.authorized(method, path, &token))
    }
}
