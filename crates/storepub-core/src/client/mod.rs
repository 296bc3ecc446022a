//! Store and identity service client.
//!
//! Public API: no status code knowledge. All HTTP/status handling in http.rs.
//! The operations themselves live next to their state machines:
//! [`crate::auth`], [`crate::binder`] and [`crate::pipeline`].

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};

use crate::config::EndpointConfig;
use crate::error::{PublishError, PublishResult};

mod http;

pub(crate) use http::{HttpBackend, HttpFailure};

const USER_AGENT_VALUE: &str = concat!("storepub/", env!("CARGO_PKG_VERSION"));

/// Client for the store, the identity service and the upload server.
#[derive(Debug, Clone)]
pub struct StoreClient {
    pub(crate) http: HttpBackend,
    pub(crate) config: EndpointConfig,
}

impl StoreClient {
    pub fn new(config: EndpointConfig) -> PublishResult<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(default_headers)
            .build()
            .map_err(|e| PublishError::Config {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http: HttpBackend { client },
            config,
        })
    }

    pub fn from_env() -> PublishResult<Self> {
        Self::new(EndpointConfig::from_env())
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    pub(crate) fn dashboard_url(&self, path: &str) -> String {
        join(&self.config.dashboard_url, path)
    }

    pub(crate) fn login_url(&self, path: &str) -> String {
        join(&self.config.login_url, path)
    }

    pub(crate) fn upload_url(&self, path: &str) -> String {
        join(&self.config.upload_url, path)
    }
}

fn join(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
