//! Token, credential and API response types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Serialized root macaroon issued by the store.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RootToken(String);

/// Serialized discharge macaroon issued by the identity service.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DischargeToken(String);

macro_rules! opaque_token {
    ($name:ident) => {
        impl $name {
            pub fn new(serialized: impl Into<String>) -> Self {
                Self(serialized.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "(<{} bytes>)"), self.0.len())
            }
        }
    };
}

opaque_token!(RootToken);
opaque_token!(DischargeToken);

/// Opaque identifier of the third-party caveat to discharge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaveatId(pub String);

impl CaveatId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Root token plus the discharge for its identity caveat.
///
/// Serialized form is the canonical plaintext of the encrypted store:
/// `{"macaroon": "...", "discharge": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    #[serde(rename = "macaroon")]
    pub root: RootToken,
    pub discharge: DischargeToken,
}

impl CredentialPair {
    pub fn new(root: RootToken, discharge: DischargeToken) -> Self {
        Self { root, discharge }
    }

    /// Same root, superseding discharge.
    pub fn with_discharge(&self, discharge: DischargeToken) -> Self {
        Self {
            root: self.root.clone(),
            discharge,
        }
    }
}

/// `Authorization` header value. Built per run, never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct PresentableCredential(String);

impl PresentableCredential {
    pub(crate) fn new(header: String) -> Self {
        Self(header)
    }

    pub fn header_value(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PresentableCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PresentableCredential(<redacted>)")
    }
}

/// Identifier returned by the upload server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadId(pub String);

/// Result of the upload step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedArtifact {
    pub upload_id: UploadId,
    pub binary_filesize: u64,
}

/// Store-assigned revision number.
pub type Revision = u64;

/// Response from the status-details URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    #[serde(default)]
    pub processed: bool,

    #[serde(default)]
    pub can_release: bool,

    #[serde(default)]
    pub revision: Option<Revision>,

    /// Processing stage reported by the store (e.g. "being_processed").
    #[serde(default)]
    pub code: Option<String>,

    #[serde(default)]
    pub errors: Vec<StoreMessage>,
}

impl UploadRecord {
    /// Short form used in logs and timeout diagnostics.
    pub fn summary(&self) -> String {
        format!(
            "processed={} can_release={} revision={} code={}",
            self.processed,
            self.can_release,
            self.revision
                .map(|r| r.to_string())
                .unwrap_or_else(|| "none".to_string()),
            self.code.as_deref().unwrap_or("none")
        )
    }

    pub(crate) fn error_text(&self) -> String {
        if self.errors.is_empty() {
            return self
                .code
                .clone()
                .unwrap_or_else(|| "rejected by store review".to_string());
        }
        self.errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Error/message entry in store responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMessage {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

/// One row of the channel map returned by a release.
///
/// `revision` presence and `info` are independent signals and are kept as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMapEntry {
    pub channel: String,

    /// "specific", "tracking", "none", ...
    #[serde(default)]
    pub info: Option<String>,

    #[serde(default)]
    pub revision: Option<Revision>,

    #[serde(default)]
    pub version: Option<String>,
}

impl ChannelMapEntry {
    pub fn is_tracking(&self) -> bool {
        self.info.as_deref() == Some("tracking")
    }
}

/// Ordered channel map.
pub type ChannelMap = Vec<ChannelMapEntry>;

/// Outcome of a full publish run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub revision: Revision,
    pub channel_map: ChannelMap,
    pub opened_channels: Vec<String>,
}

/// What to publish and where.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub name: String,
    pub series: String,
    pub channels: Vec<String>,
    pub artifact: std::path::PathBuf,
}

// Wire bodies

#[derive(Debug, Deserialize)]
pub(crate) struct IssueResponse {
    pub macaroon: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DischargeResponse {
    pub discharge_macaroon: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct IdentityErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadResponse {
    #[serde(default)]
    pub successful: bool,
    #[serde(default)]
    pub upload_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NotifyResponse {
    pub status_details_url: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReleaseResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub channel_map: ChannelMap,
    #[serde(default)]
    pub opened_channels: Vec<String>,
    #[serde(default)]
    pub errors: Vec<StoreMessage>,
}
