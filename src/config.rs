//! Driver configuration
//!
//! The CLI driver reads a YAML file describing where the warehouse lives,
//! how to authenticate, transport and polling settings, and the processor
//! properties to schedule with:
//!
//! ```yaml
//! endpoint: https://bigquery.googleapis.com
//! credentials:
//!   type: service_account
//!   key_file: /etc/loader/key.json
//! http:
//!   timeout_seconds: 60
//!   max_retries: 6
//! polling:
//!   initial_ms: 500
//!   max_ms: 10000
//! upload:
//!   chunk_size_bytes: 8388608
//! variables:
//!   project: acme
//! properties:
//!   gcp.project.id: "{{ vars.project }}"
//!   bq.load.type: NEWLINE_DELIMITED_JSON
//!   bq.load.max_badrecords: 10
//! ```

use crate::auth::{AuthConfig, ServiceAccountKey, BIGQUERY_SCOPE, DEFAULT_METADATA_URL};
use crate::error::{Error, Result, ResultExt};
use crate::http::{HttpClient, HttpClientConfig};
use crate::processor::ProcessContext;
use crate::types::{BackoffType, OptionStringExt};
use crate::warehouse::{BigQueryClient, BigQueryClientConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete driver configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// REST endpoint of the warehouse
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// How requests are authorized
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// HTTP transport settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Job status polling
    #[serde(default)]
    pub polling: PollingConfig,

    /// Resumable upload settings
    #[serde(default)]
    pub upload: UploadConfig,

    /// Values templates can reference as `{{ vars.name }}`
    #[serde(default)]
    pub variables: Value,

    /// Processor properties, dynamic ones included
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

fn default_endpoint() -> String {
    "https://bigquery.googleapis.com".to_string()
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            credentials: CredentialsConfig::default(),
            http: HttpConfig::default(),
            polling: PollingConfig::default(),
            upload: UploadConfig::default(),
            variables: Value::Null,
            properties: BTreeMap::new(),
        }
    }
}

impl LoaderConfig {
    /// Parse a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        url::Url::parse(&config.endpoint)?;
        Ok(config)
    }

    /// Load from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).with_context(|| format!("loading {}", path.display()))
    }

    /// Processor properties as strings
    ///
    /// YAML scalars (`10`, `true`) are accepted and rendered as text.
    pub fn property_values(&self) -> Result<BTreeMap<String, String>> {
        self.properties
            .iter()
            .map(|(name, value)| {
                let text = match value {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    other => {
                        return Err(Error::invalid_value(
                            name,
                            format!("expected a scalar, found {other}"),
                        ))
                    }
                };
                Ok((name.clone(), text))
            })
            .collect()
    }

    /// Build the process context the processor is scheduled with
    pub fn process_context(&self) -> Result<ProcessContext> {
        Ok(ProcessContext::from_properties(self.property_values()?)
            .with_variables(self.variables.clone()))
    }

    /// Resolve credentials
    pub fn auth_config(&self) -> Result<AuthConfig> {
        self.credentials.resolve()
    }

    /// Build the HTTP transport, pointed at the endpoint
    pub fn http_client(&self) -> Result<HttpClient> {
        let http = HttpClientConfig::builder()
            .base_url(self.endpoint.clone())
            .timeout(Duration::from_secs(self.http.timeout_seconds))
            .max_retries(self.http.max_retries)
            .backoff(
                self.http.backoff.backoff_type,
                Duration::from_millis(self.http.backoff.initial_ms),
                Duration::from_millis(self.http.backoff.max_ms),
            )
            .build();
        HttpClient::with_auth(http, self.auth_config()?)
    }

    /// Client settings for polling and uploads
    pub fn client_config(&self) -> BigQueryClientConfig {
        BigQueryClientConfig {
            chunk_size: BigQueryClientConfig::aligned_chunk_size(self.upload.chunk_size_bytes),
            poll_initial: Duration::from_millis(self.polling.initial_ms),
            poll_max: Duration::from_millis(self.polling.max_ms),
        }
    }

    /// Build the warehouse client
    pub fn bigquery_client(&self) -> Result<BigQueryClient> {
        Ok(BigQueryClient::new(self.http_client()?, self.client_config()))
    }
}

// ============================================================================
// Credentials
// ============================================================================

/// Credentials section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialsConfig {
    /// Key file named by `GOOGLE_APPLICATION_CREDENTIALS`, else the
    /// metadata server
    #[default]
    ApplicationDefault,

    /// No credentials (emulators)
    None,

    /// Static access token
    Bearer {
        /// The token
        token: String,
    },

    /// Service account key file
    ServiceAccount {
        /// Path to the JSON key; falls back to the environment when unset
        #[serde(default)]
        key_file: Option<String>,
        /// Requested scopes
        #[serde(default)]
        scopes: Vec<String>,
        /// Assertion lifetime in seconds
        #[serde(default = "default_token_lifetime")]
        token_lifetime_seconds: u64,
    },

    /// Instance metadata server
    MetadataServer {
        /// Token endpoint override
        #[serde(default)]
        url: Option<String>,
    },
}

fn default_token_lifetime() -> u64 {
    3600
}

impl CredentialsConfig {
    /// Turn the section into an auth configuration
    pub fn resolve(&self) -> Result<AuthConfig> {
        match self {
            CredentialsConfig::ApplicationDefault => AuthConfig::from_env(),
            CredentialsConfig::None => Ok(AuthConfig::None),
            CredentialsConfig::Bearer { token } => {
                if token.is_empty() {
                    return Err(Error::credentials("bearer token is empty"));
                }
                Ok(AuthConfig::Bearer {
                    token: token.clone(),
                })
            }
            CredentialsConfig::ServiceAccount {
                key_file,
                scopes,
                token_lifetime_seconds,
            } => {
                let Some(path) = key_file.clone().none_if_empty() else {
                    return AuthConfig::from_env();
                };
                let key = ServiceAccountKey::from_file(path)?;
                let scopes = if scopes.is_empty() {
                    vec![BIGQUERY_SCOPE.to_string()]
                } else {
                    scopes.clone()
                };
                Ok(AuthConfig::ServiceAccount {
                    key,
                    scopes,
                    token_lifetime_seconds: *token_lifetime_seconds,
                })
            }
            CredentialsConfig::MetadataServer { url } => Ok(AuthConfig::MetadataServer {
                url: url
                    .clone()
                    .none_if_empty()
                    .unwrap_or_else(|| DEFAULT_METADATA_URL.to_string()),
            }),
        }
    }
}

// ============================================================================
// HTTP / Polling / Upload
// ============================================================================

/// HTTP transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Maximum number of retries per request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Retry backoff
    #[serde(default)]
    pub backoff: BackoffConfig,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            max_retries: default_max_retries(),
            backoff: BackoffConfig::default(),
        }
    }
}

fn default_timeout() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    6
}

/// Backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Type of backoff
    #[serde(rename = "type", default)]
    pub backoff_type: BackoffType,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_ms")]
    pub initial_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            backoff_type: BackoffType::Exponential,
            initial_ms: default_initial_ms(),
            max_ms: default_max_ms(),
        }
    }
}

fn default_initial_ms() -> u64 {
    250
}

fn default_max_ms() -> u64 {
    32_000
}

/// Job status polling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// First delay in milliseconds
    #[serde(default = "default_poll_initial_ms")]
    pub initial_ms: u64,

    /// Longest delay in milliseconds
    #[serde(default = "default_poll_max_ms")]
    pub max_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            initial_ms: default_poll_initial_ms(),
            max_ms: default_poll_max_ms(),
        }
    }
}

fn default_poll_initial_ms() -> u64 {
    500
}

fn default_poll_max_ms() -> u64 {
    10_000
}

/// Resumable upload settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Bytes per chunk, rounded up to a multiple of 256 KiB
    #[serde(default = "default_chunk_size")]
    pub chunk_size_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            chunk_size_bytes: default_chunk_size(),
        }
    }
}

fn default_chunk_size() -> usize {
    8 * 1024 * 1024
}
