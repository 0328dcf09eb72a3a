//! Client configuration: tracking URI, object store endpoint, credentials.
//!
//! Configuration is an explicit value passed to [`crate::TrackingClient`],
//! never process-wide state. Credentials are read from the environment or a
//! config file and have no built-in fallback values.

use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackError};

pub const DEFAULT_TRACKING_URI: &str = "http://127.0.0.1:3050";
pub const DEFAULT_STORE_ENDPOINT: &str = "http://127.0.0.1:9000";
pub const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const ENV_TRACKING_URI: &str = "RUNLOG_TRACKING_URI";
pub const ENV_STORE_ENDPOINT: &str = "RUNLOG_S3_ENDPOINT";
pub const ENV_ACCESS_KEY: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_SECRET_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_REGION: &str = "AWS_REGION";

/// Access-key/secret-key pair for the object store.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Object store connection settings.
///
/// `credentials` may be absent at configuration time; the first upload
/// fails with a configuration error if they are still missing then.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub endpoint: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_STORE_ENDPOINT.to_string(),
            region: default_region(),
            credentials: None,
        }
    }
}

/// Full client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    pub tracking_uri: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub store: StoreConfig,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl TrackingConfig {
    pub fn new(tracking_uri: impl Into<String>, store: StoreConfig) -> Self {
        Self {
            tracking_uri: tracking_uri.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            store,
        }
    }

    /// Build the configuration from environment variables.
    ///
    /// `RUNLOG_TRACKING_URI` and `RUNLOG_S3_ENDPOINT` fall back to local
    /// defaults. Credentials (`AWS_ACCESS_KEY_ID`/`AWS_SECRET_ACCESS_KEY`)
    /// have no fallback: setting exactly one of the two is an error, and
    /// setting neither leaves them unset until upload time.
    pub fn from_env() -> Result<Self> {
        let tracking_uri = env_or(ENV_TRACKING_URI, DEFAULT_TRACKING_URI);
        let endpoint = env_or(ENV_STORE_ENDPOINT, DEFAULT_STORE_ENDPOINT);
        let region = env_or(ENV_REGION, DEFAULT_REGION);

        let credentials = match (non_empty(ENV_ACCESS_KEY), non_empty(ENV_SECRET_KEY)) {
            (Some(access_key), Some(secret_key)) => Some(Credentials {
                access_key,
                secret_key,
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(TrackError::Config(format!(
                    "{ENV_ACCESS_KEY} is set but {ENV_SECRET_KEY} is not"
                )))
            }
            (None, Some(_)) => {
                return Err(TrackError::Config(format!(
                    "{ENV_SECRET_KEY} is set but {ENV_ACCESS_KEY} is not"
                )))
            }
        };

        Ok(Self {
            tracking_uri,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            store: StoreConfig {
                endpoint,
                region,
                credentials,
            },
        })
    }

    /// Load the configuration from a YAML file, then apply environment
    /// overrides on top.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let mut config: Self = serde_yaml::from_str(&content)?;

        if let Some(uri) = non_empty(ENV_TRACKING_URI) {
            config.tracking_uri = uri;
        }
        if let Some(endpoint) = non_empty(ENV_STORE_ENDPOINT) {
            config.store.endpoint = endpoint;
        }
        if let Some(region) = non_empty(ENV_REGION) {
            config.store.region = region;
        }
        if let (Some(access_key), Some(secret_key)) =
            (non_empty(ENV_ACCESS_KEY), non_empty(ENV_SECRET_KEY))
        {
            config.store.credentials = Some(Credentials {
                access_key,
                secret_key,
            });
        }

        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn env_or(var: &str, default: &str) -> String {
    non_empty(var).unwrap_or_else(|| default.to_string())
}

fn non_empty(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.is_empty())
}
