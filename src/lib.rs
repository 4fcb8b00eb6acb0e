//! # Gluco
//!
//! Client for the gluco-meter REST API: sign in, keep the session across
//! runs, and manage glucose readings with their lifestyle metrics.
//!
//! ## Modules
//!
//! - [`client`]: HTTP plumbing, request ids, error translation
//! - [`session`]: token persistence, session restore, login/signup/logout
//! - [`readings`]: reading model, form validation, paginated list, dashboard
//! - [`config`]: TOML + environment configuration
//! - [`logging`]: `tracing` subscriber setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gluco::{ApiClient, Config, Dashboard, FileTokenStore, SessionStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default();
//!     let client = ApiClient::new(&config.api)?;
//!     let tokens = Arc::new(FileTokenStore::new(config.session.resolved_token_path()));
//!     let session = Arc::new(SessionStore::new(client, tokens));
//!
//!     if !session.login("a@b.com", "secret").await {
//!         eprintln!("{}", session.error().await.unwrap_or_default());
//!         return Ok(());
//!     }
//!
//!     let dashboard = Dashboard::new(session, config.api.page_size);
//!     dashboard.load().await;
//!
//!     for reading in dashboard.list().snapshot().await.readings {
//!         println!("{} {} mg/dL", reading.recorded_at, reading.value);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod logging;
pub mod readings;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

// Re-export top-level types for convenience
pub use client::{ApiClient, ClientError, ClientResult, UserProfile};
pub use config::{Config, ConfigError};
pub use readings::{
    Dashboard, Feedback, FormError, FormMode, ListError, Pager, Reading, ReadingDraft,
    ReadingFilter, ReadingForm, ReadingId, ReadingList, ReadingPayload, ReadingType,
    ValidationError,
};
pub use session::{FileTokenStore, MemoryTokenStore, SessionState, SessionStore, TokenStore};
