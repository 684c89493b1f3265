//! Authentication module
//!
//! Supports: no auth, static bearer token, service account key (JWT
//! exchange) and the instance metadata server.
//!
//! The `Authenticator` applies credentials to requests and caches
//! exchanged access tokens until shortly before they expire.

mod authenticator;
mod types;

pub use authenticator::{sign_assertion, Authenticator};
pub use types::{
    AuthConfig, CachedToken, ServiceAccountKey, BIGQUERY_SCOPE, CREDENTIALS_ENV,
    DEFAULT_METADATA_URL, DEFAULT_TOKEN_URI,
};
