//! HTTP layer: request execution, status classification, JSON decoding.
//!
//! Callers get an [`HttpFailure`] and map it to the step-specific
//! [`PublishError`](crate::error::PublishError) variant. Nothing here retries.

use std::fmt;

use reqwest::header::AUTHORIZATION;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::types::PresentableCredential;

/// Why a request did not produce a usable body.
#[derive(Debug)]
pub(crate) enum HttpFailure {
    /// Connection, TLS or timeout error.
    Transport(String),

    /// Non-2xx response.
    Status { status: StatusCode, body: String },

    /// 2xx response whose body did not match the expected shape.
    Decode(String),
}

impl HttpFailure {
    pub(crate) fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Status { status, .. } if *status == StatusCode::UNAUTHORIZED)
    }

    /// Transport errors and 5xx: the request may succeed if repeated.
    pub(crate) fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => status.is_server_error(),
            Self::Decode(_) => false,
        }
    }

    pub(crate) fn body(&self) -> Option<&str> {
        match self {
            Self::Status { body, .. } => Some(body),
            _ => None,
        }
    }
}

impl fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(message) => write!(f, "network error: {}", message),
            Self::Status { status, body } => {
                let excerpt: String = body.chars().take(200).collect();
                if excerpt.is_empty() {
                    write!(f, "HTTP {}", status.as_u16())
                } else {
                    write!(f, "HTTP {}: {}", status.as_u16(), excerpt)
                }
            }
            Self::Decode(message) => write!(f, "unexpected response body: {}", message),
        }
    }
}

impl From<reqwest::Error> for HttpFailure {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// HTTP backend (holds the reqwest client).
#[derive(Debug, Clone)]
pub(crate) struct HttpBackend {
    pub(crate) client: reqwest::Client,
}

impl HttpBackend {
    pub(crate) async fn post_json<B, T>(
        &self,
        url: &str,
        body: &B,
        auth: Option<&PresentableCredential>,
    ) -> Result<T, HttpFailure>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(url = %url, "POST");
        let request = with_auth(self.client.post(url).json(body), auth);
        execute(request).await
    }

    pub(crate) async fn get_json<T>(
        &self,
        url: &str,
        auth: Option<&PresentableCredential>,
    ) -> Result<T, HttpFailure>
    where
        T: DeserializeOwned,
    {
        debug!(url = %url, "GET");
        let request = with_auth(self.client.get(url), auth);
        execute(request).await
    }

    pub(crate) async fn post_multipart<T>(
        &self,
        url: &str,
        form: reqwest::multipart::Form,
    ) -> Result<T, HttpFailure>
    where
        T: DeserializeOwned,
    {
        debug!(url = %url, "POST multipart");
        execute(self.client.post(url).multipart(form)).await
    }
}

fn with_auth(request: RequestBuilder, auth: Option<&PresentableCredential>) -> RequestBuilder {
    match auth {
        Some(credential) => request.header(AUTHORIZATION, credential.header_value()),
        None => request,
    }
}

async fn execute<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, HttpFailure> {
    let response = request.send().await?;
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(HttpFailure::Status { status, body });
    }

    let text = response
        .text()
        .await
        .map_err(|e| HttpFailure::Transport(format!("failed to read response body: {}", e)))?;
    serde_json::from_str(&text).map_err(|e| HttpFailure::Decode(e.to_string()))
}
