//! Authenticated session
//!
//! ## Architecture
//!
//! - **TokenStore**: durable home of the bearer token (file or memory)
//! - **SessionStore**: token + profile, restore on startup, authorized calls
//! - **Auth operations**: login, signup, logout on [`SessionStore`]
//!
//! ## Lifecycle
//!
//! 1. `restore()` validates a stored token against `/me`
//! 2. `login()` / `signup()` obtain and persist a new token
//! 3. `logout()` drops it locally

mod auth;
mod store;
mod token_store;

pub use auth::{
    AUTO_LOGIN_FAILED, LOGGED_OUT, LOGIN_FAILED, LOGIN_SUCCEEDED, SIGNUP_FAILED,
    SIGNUP_PENDING_LOGIN, SIGNUP_SUCCEEDED,
};
pub use store::{SessionState, SessionStore};
pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore, TokenStoreError};
