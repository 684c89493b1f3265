//! Credential types
//!
//! These types describe how requests to the warehouse are authorized.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// OAuth scope for load jobs
pub const BIGQUERY_SCOPE: &str = "https://www.googleapis.com/auth/bigquery";

/// Default token endpoint for service accounts
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Default metadata-server token endpoint (GCE, GKE, Cloud Run)
pub const DEFAULT_METADATA_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Environment variable naming a service account key file
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Service account key, as downloaded from the cloud console
#[derive(Clone, Serialize, Deserialize)]
pub struct ServiceAccountKey {
    /// Key type (always "service_account")
    #[serde(rename = "type", default)]
    pub key_type: Option<String>,
    /// Project the account belongs to
    #[serde(default)]
    pub project_id: Option<String>,
    /// Key id, sent as the JWT `kid` header
    #[serde(default)]
    pub private_key_id: Option<String>,
    /// RSA private key (PEM)
    pub private_key: String,
    /// Account email, used as the JWT issuer
    pub client_email: String,
    /// Token endpoint
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    /// Parse a key from its JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        let key: Self = serde_json::from_str(json)
            .map_err(|e| Error::credentials(format!("invalid service account key: {e}")))?;
        if let Some(kind) = key.key_type.as_deref() {
            if kind != "service_account" {
                return Err(Error::credentials(format!(
                    "expected a service_account key, found '{kind}'"
                )));
            }
        }
        Ok(key)
    }

    /// Load a key from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::credentials(format!("failed to read key file {}: {e}", path.display()))
        })?;
        Self::from_json(&content)
    }
}

// The private key never goes to logs
impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Default)]
pub enum AuthConfig {
    /// No authentication (local emulators, tests)
    #[default]
    None,

    /// Static bearer token
    Bearer {
        /// The bearer token
        token: String,
    },

    /// Service account JWT exchanged for an access token
    ServiceAccount {
        /// The account key
        key: ServiceAccountKey,
        /// Requested scopes
        scopes: Vec<String>,
        /// Token lifetime in seconds
        token_lifetime_seconds: u64,
    },

    /// Token served by the instance metadata server
    MetadataServer {
        /// Token endpoint
        url: String,
    },
}

impl AuthConfig {
    /// Service account auth with the BigQuery scope
    pub fn service_account(key: ServiceAccountKey) -> Self {
        Self::ServiceAccount {
            key,
            scopes: vec![BIGQUERY_SCOPE.to_string()],
            token_lifetime_seconds: 3600,
        }
    }

    /// Resolve credentials from `GOOGLE_APPLICATION_CREDENTIALS`, falling
    /// back to the metadata server
    pub fn from_env() -> Result<Self> {
        match std::env::var(CREDENTIALS_ENV) {
            Ok(path) if !path.is_empty() => {
                Ok(Self::service_account(ServiceAccountKey::from_file(path)?))
            }
            _ => Ok(Self::MetadataServer {
                url: DEFAULT_METADATA_URL.to_string(),
            }),
        }
    }
}

/// Cached token with expiration
#[derive(Debug, Clone)]
pub struct CachedToken {
    /// The access token
    pub token: String,
    /// When the token expires
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    /// Create a new cached token
    pub fn new(token: String, expires_at: Option<DateTime<Utc>>) -> Self {
        Self { token, expires_at }
    }

    /// Create a token that expires in N seconds from now
    pub fn expires_in(token: String, seconds: i64) -> Self {
        let expires_at = Utc::now() + chrono::Duration::seconds(seconds);
        Self {
            token,
            expires_at: Some(expires_at),
        }
    }

    /// Check if the token is expired (with 30 second buffer)
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                let buffer = chrono::Duration::seconds(30);
                Utc::now() + buffer >= expires_at
            }
            None => false,
        }
    }
}
