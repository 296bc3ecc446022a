//! Client configuration.
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `STOREPUB_PASSPHRASE` | Passphrase for the encrypted credential (required) |
//! | `STOREPUB_CREDENTIAL` | Pre-encrypted credential, used when no store file exists |
//! | `STOREPUB_STORE_PATH` | Credential file (default: `~/.storepub-publish-macaroon.enc`) |
//! | `STOREPUB_DASHBOARD_URL` | Store API base URL |
//! | `STOREPUB_LOGIN_URL` | Identity service base URL |
//! | `STOREPUB_UPLOAD_URL` | Upload server base URL |
//! | `STOREPUB_TIMEOUT` | Request timeout in seconds (default: 30) |
//! | `STOREPUB_POLL_ATTEMPTS` | Status polls before giving up (default: 60) |
//! | `STOREPUB_POLL_INTERVAL_SECS` | Seconds between status polls (default: 5) |

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cipher::Passphrase;
use crate::error::{PublishError, PublishResult};

pub const PASSPHRASE_ENV: &str = "STOREPUB_PASSPHRASE";
pub const CREDENTIAL_ENV: &str = "STOREPUB_CREDENTIAL";
pub const STORE_PATH_ENV: &str = "STOREPUB_STORE_PATH";

const STORE_FILE_NAME: &str = ".storepub-publish-macaroon.enc";

/// Credential store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub passphrase: Passphrase,

    /// Encrypted blob consulted when `store_path` does not exist.
    pub pre_encrypted_credential: Option<String>,

    pub store_path: PathBuf,
}

impl StoreConfig {
    pub fn new(passphrase: Passphrase) -> PublishResult<Self> {
        Ok(Self {
            passphrase,
            pre_encrypted_credential: None,
            store_path: default_store_path()?,
        })
    }

    /// Create config from environment variables.
    ///
    /// A missing or empty `STOREPUB_PASSPHRASE` is a configuration error.
    pub fn from_env() -> PublishResult<Self> {
        let raw = std::env::var(PASSPHRASE_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| PublishError::Config {
                message: format!("{} is not set", PASSPHRASE_ENV),
            })?;
        let passphrase = Passphrase::new(raw).map_err(|e| PublishError::Config {
            message: format!("{}: {}", PASSPHRASE_ENV, e),
        })?;

        let store_path = match std::env::var(STORE_PATH_ENV) {
            Ok(p) if !p.is_empty() => PathBuf::from(p),
            _ => default_store_path()?,
        };

        Ok(Self {
            passphrase,
            pre_encrypted_credential: std::env::var(CREDENTIAL_ENV)
                .ok()
                .filter(|v| !v.trim().is_empty()),
            store_path,
        })
    }

    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = path.into();
        self
    }

    pub fn with_pre_encrypted_credential(mut self, blob: impl Into<String>) -> Self {
        self.pre_encrypted_credential = Some(blob.into());
        self
    }
}

fn default_store_path() -> PublishResult<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| PublishError::Config {
        message: "could not determine home directory for the credential store".to_string(),
    })?;
    Ok(home.join(STORE_FILE_NAME))
}

/// Remote endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Store API base URL (token issuance, notify, release).
    #[serde(default = "default_dashboard_url")]
    pub dashboard_url: String,

    /// Identity service base URL (discharge, refresh).
    #[serde(default = "default_login_url")]
    pub login_url: String,

    /// Upload server base URL.
    #[serde(default = "default_upload_url")]
    pub upload_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Permissions requested for a new root token.
    #[serde(default = "default_permissions")]
    pub permissions: Vec<String>,
}

fn default_dashboard_url() -> String {
    "https://dashboard.snapcraft.io".to_string()
}

fn default_login_url() -> String {
    "https://login.ubuntu.com".to_string()
}

fn default_upload_url() -> String {
    "https://storage.snapcraftcontent.com".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_permissions() -> Vec<String> {
    ["package_access", "package_push", "package_update", "package_release"]
        .iter()
        .map(|p| p.to_string())
        .collect()
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            dashboard_url: default_dashboard_url(),
            login_url: default_login_url(),
            upload_url: default_upload_url(),
            timeout_secs: default_timeout(),
            permissions: default_permissions(),
        }
    }
}

impl EndpointConfig {
    pub fn from_env() -> Self {
        Self {
            dashboard_url: std::env::var("STOREPUB_DASHBOARD_URL")
                .unwrap_or_else(|_| default_dashboard_url()),
            login_url: std::env::var("STOREPUB_LOGIN_URL").unwrap_or_else(|_| default_login_url()),
            upload_url: std::env::var("STOREPUB_UPLOAD_URL")
                .unwrap_or_else(|_| default_upload_url()),
            timeout_secs: std::env::var("STOREPUB_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_timeout),
            permissions: default_permissions(),
        }
    }

    /// Point every endpoint at one base URL (single mock server in tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.dashboard_url = url.clone();
        self.login_url = url.clone();
        self.upload_url = url;
        self
    }

    pub fn with_dashboard_url(mut self, url: impl Into<String>) -> Self {
        self.dashboard_url = url.into();
        self
    }

    pub fn with_login_url(mut self, url: impl Into<String>) -> Self {
        self.login_url = url.into();
        self
    }

    pub fn with_upload_url(mut self, url: impl Into<String>) -> Self {
        self.upload_url = url.into();
        self
    }

    /// Authority named in the root token's identity caveat (host of `login_url`).
    pub fn identity_authority(&self) -> PublishResult<String> {
        let parsed = url::Url::parse(&self.login_url).map_err(|e| PublishError::Config {
            message: format!("invalid login URL {}: {}", self.login_url, e),
        })?;
        parsed
            .host_str()
            .map(String::from)
            .ok_or_else(|| PublishError::Config {
                message: format!("login URL {} has no host", self.login_url),
            })
    }
}

/// Bounded fixed-interval polling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            interval: Duration::from_secs(5),
        }
    }
}

impl PollConfig {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_attempts: std::env::var("STOREPUB_POLL_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_attempts),
            interval: std::env::var("STOREPUB_POLL_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.interval),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [PASSPHRASE_ENV, CREDENTIAL_ENV, STORE_PATH_ENV] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_store_config_requires_passphrase() {
        clear_env();
        let err = StoreConfig::from_env().unwrap_err();
        assert!(matches!(err, PublishError::Config { .. }));
        assert!(err.to_string().contains(PASSPHRASE_ENV));
    }

    #[test]
    #[serial]
    fn test_store_config_from_env() {
        clear_env();
        std::env::set_var(PASSPHRASE_ENV, "long-enough-secret");
        std::env::set_var(CREDENTIAL_ENV, "YmxvYg==");
        std::env::set_var(STORE_PATH_ENV, "/tmp/storepub-test.enc");

        let config = StoreConfig::from_env().unwrap();
        clear_env();

        assert_eq!(config.store_path, PathBuf::from("/tmp/storepub-test.enc"));
        assert_eq!(config.pre_encrypted_credential.as_deref(), Some("YmxvYg=="));
        assert!(!format!("{:?}", config).contains("long-enough-secret"));
    }

    #[test]
    #[serial]
    fn test_store_config_rejects_short_passphrase() {
        clear_env();
        std::env::set_var(PASSPHRASE_ENV, "short");
        let result = StoreConfig::from_env();
        clear_env();
        assert!(matches!(result, Err(PublishError::Config { .. })));
    }

    #[test]
    fn test_endpoint_defaults() {
        let config = EndpointConfig::default();
        assert_eq!(config.identity_authority().unwrap(), "login.ubuntu.com");
        assert_eq!(config.timeout_secs, 30);
        assert!(config.permissions.contains(&"package_push".to_string()));
    }

    #[test]
    fn test_endpoint_base_url_override() {
        let config = EndpointConfig::default().with_base_url("http://127.0.0.1:9000");
        assert_eq!(config.login_url, "http://127.0.0.1:9000");
        assert_eq!(config.upload_url, "http://127.0.0.1:9000");
        assert_eq!(config.identity_authority().unwrap(), "127.0.0.1");
    }

    #[test]
    fn test_poll_defaults() {
        let poll = PollConfig::default();
        assert_eq!(poll.max_attempts, 60);
        assert_eq!(poll.interval, Duration::from_secs(5));
    }
}
