//! Snap store publishing client.
//!
//! This crate provides:
//!
//! - Macaroon credential lifecycle: root token issuance, identity caveat
//!   discharge (with second factor), refresh and request binding
//! - Encrypted credential persistence (file or pre-encrypted env value)
//! - Publish pipeline: upload, register, poll for a revision, release
//!
//! # Quick Start
//!
//! ```no_run
//! use storepub_core::{
//!     CredentialStore, PollConfig, PublishRequest, Publisher, ScriptedPrompt, Session,
//!     StoreClient, StoreConfig,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> storepub_core::PublishResult<()> {
//! let client = StoreClient::from_env()?;
//! let store = CredentialStore::new(StoreConfig::from_env()?);
//! let prompt = ScriptedPrompt::new(["dev@example.com", "password"]);
//!
//! let credential = Session::new(&client, &store).credential(&prompt).await?;
//! let request = PublishRequest {
//!     name: "hello".into(),
//!     series: "16".into(),
//!     channels: vec!["edge".into()],
//!     artifact: "hello_1.0_amd64.snap".into(),
//! };
//! let outcome = Publisher::new(&client, PollConfig::default())
//!     .publish(&request, &credential, &CancellationToken::new())
//!     .await?;
//! println!("released revision {}", outcome.revision);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod binder;
pub mod caveat;
pub mod cipher;
pub mod client;
pub mod config;
pub mod error;
pub mod macaroon;
pub mod pipeline;
pub mod prompt;
pub mod session;
pub mod store;
pub mod types;

pub use binder::bind;
pub use caveat::find_caveat;
pub use cipher::{CipherError, Passphrase};
pub use client::StoreClient;
pub use config::{EndpointConfig, PollConfig, StoreConfig};
pub use error::{PublishError, PublishResult};
pub use macaroon::{Caveat, Macaroon};
pub use pipeline::Publisher;
pub use prompt::{ScriptedPrompt, SecretPrompt};
pub use session::Session;
pub use store::{CredentialStore, StoreLock};
pub use types::{
    CaveatId, ChannelMap, ChannelMapEntry, CredentialPair, DischargeToken, PresentableCredential,
    PublishOutcome, PublishRequest, Revision, RootToken, UploadId, UploadRecord, UploadedArtifact,
};
