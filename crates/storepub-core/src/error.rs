//! Error types for the publish client.

use std::time::Duration;

/// Publish client errors.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Required configuration (passphrase, endpoint) absent or invalid.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// A credential source exists but could not be decrypted or decoded.
    #[error("credential store {source_name} is unreadable: {message} (check STOREPUB_PASSPHRASE or run `storepub login`)")]
    CredentialStoreCorrupt {
        source_name: String,
        message: String,
    },

    /// I/O on the credential file or its lock failed.
    #[error("credential storage error: {message}")]
    Storage { message: String },

    /// Token bytes are not a well-formed macaroon.
    #[error("invalid token: {message}")]
    InvalidToken { message: String },

    /// Root token carries no third-party caveat for the identity service.
    #[error("root token has no third-party caveat for {authority}")]
    CaveatNotFound { authority: String },

    /// The store refused to issue a root token.
    #[error("token issuance failed: {message}")]
    TokenIssuance { message: String },

    /// Bad primary or second-factor credentials.
    #[error("authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// The identity service refused to refresh the discharge.
    #[error("discharge refresh failed: {message}")]
    RefreshFailed { message: String },

    /// The store rejected the presented credential.
    #[error("store rejected the credential during {step} (run `storepub login` again)")]
    CredentialRejected { step: &'static str },

    #[error("upload failed: {message}")]
    UploadFailed { message: String },

    #[error("upload registration failed: {message}")]
    NotifyFailed { message: String },

    /// Status endpoint answered with something that cannot be polled further.
    #[error("status check failed: {message}")]
    StatusCheckFailed { message: String },

    /// Server-side processing rejected the artifact.
    #[error("artifact is not releasable: {message}")]
    NotReleasable { message: String },

    /// Attempts exhausted without a terminal status.
    #[error("artifact still processing after {attempts} attempts ({elapsed:?}); try again later (last status: {last_status})")]
    PollingTimeout {
        attempts: u32,
        elapsed: Duration,
        last_status: String,
    },

    #[error("release failed: {message}")]
    ReleaseFailed { message: String },

    /// Polling was cancelled between attempts.
    #[error("cancelled while waiting for the store to process the upload")]
    Cancelled,

    /// Interactive prompt could not be read.
    #[error("prompt failed: {message}")]
    Prompt { message: String },
}

impl PublishError {
    /// Exit code for CLI. Every handled failure is 1.
    pub fn exit_code(&self) -> i32 {
        1
    }

    /// Whether the caller should fall back to a full interactive login.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(
            self,
            Self::RefreshFailed { .. } | Self::CredentialRejected { .. }
        )
    }

    /// Whether re-running later may succeed without changing anything.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::PollingTimeout { .. } | Self::Cancelled)
    }
}

/// Result type for publish operations.
pub type PublishResult<T> = Result<T, PublishError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reauthentication_classes() {
        assert!(PublishError::RefreshFailed {
            message: "expired".into()
        }
        .requires_reauthentication());
        assert!(PublishError::CredentialRejected { step: "release" }.requires_reauthentication());
        assert!(!PublishError::AuthenticationFailed {
            message: "bad password".into()
        }
        .requires_reauthentication());
    }

    #[test]
    fn test_timeout_distinct_from_rejection() {
        let timeout = PublishError::PollingTimeout {
            attempts: 3,
            elapsed: Duration::from_secs(10),
            last_status: "processed=false".into(),
        };
        let rejected = PublishError::NotReleasable {
            message: "lint failed".into(),
        };
        assert!(timeout.is_transient());
        assert!(!rejected.is_transient());
        assert!(timeout.to_string().contains("try again later"));
    }
}
