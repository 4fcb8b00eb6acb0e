//! Gluco-meter API client
//!
//! Owns the HTTP plumbing shared by the session store and the reading
//! components: URL building, bearer attachment, error translation.

mod http;
mod dto;
mod error;

pub use http::{ApiClient, REQUEST_ID_HEADER};
pub use dto::{RegisterRequest, TokenResponse, UserProfile, DEFAULT_ROLE};
pub use error::ClientError;

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
