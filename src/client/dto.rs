//! Request/Response DTOs for the auth endpoints

use serde::{Deserialize, Serialize};

/// Role every self-registered account gets
pub const DEFAULT_ROLE: &str = "regular";

/// Form body for `POST /login`
#[derive(Debug, Serialize)]
pub(crate) struct LoginForm<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Successful `POST /login` response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// JSON body for `POST /register`
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

impl RegisterRequest {
    pub fn new(full_name: &str, email: &str, password: &str) -> Self {
        Self {
            full_name: full_name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role: DEFAULT_ROLE.to_string(),
        }
    }
}

/// Profile returned by `GET /me`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UserProfile {
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub id: Option<i64>,
}

impl UserProfile {
    /// Up to two upper-case initials from the full name, falling back to
    /// the first two characters of the email.
    pub fn initials(&self) -> String {
        match self.full_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name
                .split_whitespace()
                .filter_map(|part| part.chars().next())
                .take(2)
                .flat_map(char::to_uppercase)
                .collect(),
            None => self.email.chars().take(2).flat_map(char::to_uppercase).collect(),
        }
    }

    /// First word of the full name, or the email when no name is set
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .and_then(|name| name.split_whitespace().next())
            .unwrap_or(&self.email)
    }
}
