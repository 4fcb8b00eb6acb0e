//! Client error types
//!
//! Every failure talking to the gluco-meter API ends up here. Callers turn
//! these into user-facing text with [`ClientError::message_or`].

use serde_json::Value;
use thiserror::Error;

/// Errors that can occur when communicating with the gluco-meter API
#[derive(Error, Debug)]
pub enum ClientError {
    /// An authorized call was attempted without a token
    #[error("Authentication required. Please login again.")]
    NotAuthenticated,

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API unavailable")]
    Unavailable,

    #[error("Request timeout")]
    Timeout,

    #[error("API error {status}: {}", .detail.as_deref().unwrap_or("no detail"))]
    ApiError { status: u16, detail: Option<String> },

    #[error("Invalid response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Map a transport error onto the coarse categories we report
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_connect() {
            ClientError::Unavailable
        } else {
            ClientError::Request(err)
        }
    }

    /// Text to show the user: the server's `detail` when it sent one,
    /// otherwise `fallback`.
    pub fn message_or(&self, fallback: &str) -> String {
        match self {
            ClientError::ApiError {
                detail: Some(detail),
                ..
            } => detail.clone(),
            ClientError::NotAuthenticated => self.to_string(),
            _ => fallback.to_string(),
        }
    }

    /// HTTP status of a rejected request, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::ApiError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Pull a human-readable message out of an error body.
///
/// The backend answers with `{"detail": "..."}`, validation failures with
/// `{"detail": [{"msg": "..."}]}`, and some proxies with a bare JSON string.
pub(crate) fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Object(map) => match map.get("detail")? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Array(items) => items
                .iter()
                .find_map(|item| item.get("msg").and_then(Value::as_str))
                .map(str::to_string),
            _ => None,
        },
        _ => None,
    }
}
