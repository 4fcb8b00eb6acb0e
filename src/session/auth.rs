//! Auth operations
//!
//! Login, signup and logout. Each one reports through the session's
//! message/error pair and a boolean; nothing escapes as an `Err`.

use super::store::SessionStore;
use crate::client::{ClientError, RegisterRequest, UserProfile};

pub const LOGIN_SUCCEEDED: &str = "Welcome back! You are now signed in.";
pub const LOGIN_FAILED: &str = "Login failed. Please try again.";
pub const SIGNUP_PENDING_LOGIN: &str = "Account created! Signing you in...";
pub const SIGNUP_SUCCEEDED: &str = "Account created! You are now signed in.";
pub const SIGNUP_FAILED: &str = "Sign up failed. Please try again.";
pub const AUTO_LOGIN_FAILED: &str =
    "Account created but automatic login failed. Please login manually.";
pub const LOGGED_OUT: &str = "You have been logged out successfully.";

impl SessionStore {
    /// Sign in with email and password.
    ///
    /// On failure the previous session, if any, is left as it was.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> bool {
        self.begin_auth().await;

        match self.exchange_credentials(email, password).await {
            Ok(user) => {
                tracing::info!(email = %user.email, "Signed in");
                self.finish_auth(Some(LOGIN_SUCCEEDED), None).await;
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Login failed");
                self.finish_auth(None, Some(e.message_or(LOGIN_FAILED))).await;
                false
            }
        }
    }

    /// Register a new account, then sign in with the same credentials.
    #[tracing::instrument(skip(self, password))]
    pub async fn signup(&self, full_name: &str, email: &str, password: &str) -> bool {
        self.begin_auth().await;

        let request = RegisterRequest::new(full_name, email, password);
        if let Err(e) = self.client.register(&request).await {
            tracing::warn!(error = %e, "Registration failed");
            self.finish_auth(None, Some(e.message_or(SIGNUP_FAILED))).await;
            return false;
        }

        self.state.write().await.message = Some(SIGNUP_PENDING_LOGIN.to_string());

        match self.exchange_credentials(email, password).await {
            Ok(user) => {
                tracing::info!(email = %user.email, "Account created and signed in");
                self.finish_auth(Some(SIGNUP_SUCCEEDED), None).await;
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Automatic login after registration failed");
                self.finish_auth(None, Some(AUTO_LOGIN_FAILED.to_string())).await;
                false
            }
        }
    }

    /// Forget the session locally. Never touches the network.
    pub async fn logout(&self) {
        if let Err(e) = self.tokens.clear().await {
            tracing::warn!(error = %e, "Failed to clear stored token");
        }

        let mut state = self.state.write().await;
        state.token = None;
        state.user = None;
        state.error = None;
        state.message = Some(LOGGED_OUT.to_string());
        tracing::info!("Signed out");
    }

    /// Token grant followed by profile fetch. Persists the token only after
    /// the grant succeeded; a failed profile fetch removes it again.
    async fn exchange_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserProfile, ClientError> {
        let token = self.client.login(email, password).await?.access_token;

        if let Err(e) = self.tokens.save(&token).await {
            tracing::warn!(error = %e, "Failed to persist token; session will not survive restart");
        }
        {
            let mut state = self.state.write().await;
            state.token = Some(token.clone());
            state.user = None;
        }

        self.adopt_token(&token).await
    }

    async fn begin_auth(&self) {
        let mut state = self.state.write().await;
        state.auth_loading = true;
        state.message = None;
        state.error = None;
    }

    async fn finish_auth(&self, message: Option<&str>, error: Option<String>) {
        let mut state = self.state.write().await;
        state.auth_loading = false;
        state.message = message.map(str::to_string);
        state.error = error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemoryTokenStore;
    use crate::testing::FakeBackend;
    use std::sync::Arc;

    fn session(backend: &FakeBackend) -> (SessionStore, Arc<MemoryTokenStore>) {
        let tokens = Arc::new(MemoryTokenStore::new());
        (SessionStore::new(backend.client(), tokens.clone()), tokens)
    }

    #[tokio::test]
    async fn test_login_scenario() {
        let backend = FakeBackend::spawn().await;
        backend.add_user("a@b.com", Some("A B"), "secret");
        let (session, tokens) = session(&backend);

        assert!(session.login("a@b.com", "secret").await);

        let state = session.snapshot().await;
        assert_eq!(state.token.as_deref(), Some("tok1"));
        let user = state.user.unwrap();
        assert_eq!(user.email, "a@b.com");
        assert_eq!(user.full_name.as_deref(), Some("A B"));
        assert_eq!(state.message.as_deref(), Some(LOGIN_SUCCEEDED));
        assert!(state.error.is_none());
        assert!(!state.auth_loading);
        assert_eq!(tokens.peek().as_deref(), Some("tok1"));
        assert_eq!(session.initials().await, "AB");
    }

    #[tokio::test]
    async fn test_login_sends_form_credentials() {
        let backend = FakeBackend::spawn().await;
        backend.add_user("a@b.com", None, "secret");
        let (session, _) = session(&backend);

        assert!(session.login("a@b.com", "secret").await);
        assert_eq!(
            backend.last_login_form(),
            Some(("a@b.com".to_string(), "secret".to_string()))
        );
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let backend = FakeBackend::spawn().await;
        backend.add_user("a@b.com", None, "secret");
        let (session, tokens) = session(&backend);

        assert!(!session.login("a@b.com", "wrong").await);

        let state = session.snapshot().await;
        assert!(state.user.is_none());
        assert!(state.token.is_none());
        assert_eq!(state.error.as_deref(), Some("Incorrect email or password"));
        assert!(state.message.is_none());
        assert_eq!(tokens.peek(), None);
    }

    #[tokio::test]
    async fn test_login_failure_keeps_existing_session() {
        let backend = FakeBackend::spawn().await;
        backend.add_user("a@b.com", None, "secret");
        let (session, tokens) = session(&backend);
        assert!(session.login("a@b.com", "secret").await);
        let before = session.user().await;

        assert!(!session.login("a@b.com", "wrong").await);

        assert_eq!(session.user().await, before);
        assert_eq!(tokens.peek().as_deref(), Some("tok1"));
    }

    #[tokio::test]
    async fn test_login_without_detail_uses_fallback() {
        let backend = FakeBackend::spawn().await;
        backend.set_login_status_without_detail(503);
        let (session, _) = session(&backend);

        assert!(!session.login("a@b.com", "secret").await);
        assert_eq!(session.error().await.as_deref(), Some(LOGIN_FAILED));
    }

    #[tokio::test]
    async fn test_login_profile_failure_clears_token() {
        let backend = FakeBackend::spawn().await;
        backend.add_user("a@b.com", None, "secret");
        backend.set_reject_profile(true);
        let (session, tokens) = session(&backend);

        assert!(!session.login("a@b.com", "secret").await);

        let state = session.snapshot().await;
        assert!(state.token.is_none());
        assert!(state.user.is_none());
        assert!(state.error.is_some());
        assert_eq!(tokens.peek(), None);
    }

    #[tokio::test]
    async fn test_signup_then_login() {
        let backend = FakeBackend::spawn().await;
        let (session, tokens) = session(&backend);

        assert!(session.signup("Grace Hopper", "grace@navy.mil", "cobol").await);

        let state = session.snapshot().await;
        assert_eq!(state.user.unwrap().full_name.as_deref(), Some("Grace Hopper"));
        assert_eq!(state.message.as_deref(), Some(SIGNUP_SUCCEEDED));
        assert!(tokens.peek().is_some());
        assert_eq!(backend.registered_role("grace@navy.mil").as_deref(), Some("regular"));
    }

    #[tokio::test]
    async fn test_signup_duplicate_email() {
        let backend = FakeBackend::spawn().await;
        backend.add_user("a@b.com", None, "secret");
        let (session, tokens) = session(&backend);

        assert!(!session.signup("A B", "a@b.com", "secret").await);

        assert_eq!(session.error().await.as_deref(), Some("Email already registered"));
        assert_eq!(backend.request_count("/login"), 0);
        assert_eq!(tokens.peek(), None);
    }

    #[tokio::test]
    async fn test_signup_auto_login_failure_is_distinct() {
        let backend = FakeBackend::spawn().await;
        backend.set_refuse_logins(true);
        let (session, tokens) = session(&backend);

        assert!(!session.signup("A B", "a@b.com", "secret").await);
        let signup_error = session.error().await.unwrap();
        assert_eq!(signup_error, AUTO_LOGIN_FAILED);
        assert!(session.user().await.is_none());
        assert_eq!(tokens.peek(), None);

        assert!(!session.login("a@b.com", "secret").await);
        let login_error = session.error().await.unwrap();
        assert_ne!(signup_error, login_error);
    }

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let backend = FakeBackend::spawn().await;
        backend.add_user("a@b.com", None, "secret");
        let (session, tokens) = session(&backend);
        assert!(session.login("a@b.com", "secret").await);
        let requests_before = backend.total_requests();

        session.logout().await;

        let state = session.snapshot().await;
        assert!(state.token.is_none());
        assert!(state.user.is_none());
        assert_eq!(state.message.as_deref(), Some(LOGGED_OUT));
        assert_eq!(tokens.peek(), None);
        assert_eq!(backend.total_requests(), requests_before);
    }

    #[tokio::test]
    async fn test_logout_when_signed_out() {
        let backend = FakeBackend::spawn().await;
        let (session, tokens) = session(&backend);

        session.logout().await;

        assert!(session.token().await.is_none());
        assert_eq!(tokens.peek(), None);
        assert_eq!(session.message().await.as_deref(), Some(LOGGED_OUT));
    }

    #[tokio::test]
    async fn test_dismiss_feedback() {
        let backend = FakeBackend::spawn().await;
        let (session, _) = session(&backend);
        assert!(!session.login("nobody@b.com", "x").await);

        session.dismiss_error().await;
        assert!(session.error().await.is_none());
    }
}
