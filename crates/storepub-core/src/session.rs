//! Credential lifecycle for one run.
//!
//! ```text
//! lock ─ load ─┬─ absent ──────────────── login ─┐
//!              └─ present ─ refresh ─┬─ ok ──────┼─ bind ─ save ─ unlock
//!                                    └─ failed ─ authenticate ─┘
//! ```
//!
//! `save` only runs after a fully successful refresh or login, and only
//! for tokens that bind.

use tracing::{info, warn};

use crate::binder::bind;
use crate::caveat::find_caveat;
use crate::client::StoreClient;
use crate::error::{PublishError, PublishResult};
use crate::prompt::SecretPrompt;
use crate::store::CredentialStore;
use crate::types::{CredentialPair, PresentableCredential};

/// Ties the credential store to the store/identity client.
#[derive(Debug, Clone)]
pub struct Session<'a> {
    client: &'a StoreClient,
    store: &'a CredentialStore,
}

impl<'a> Session<'a> {
    pub fn new(client: &'a StoreClient, store: &'a CredentialStore) -> Self {
        Self { client, store }
    }

    /// Credential for this run, refreshing or logging in as needed.
    pub async fn credential(&self, prompt: &dyn SecretPrompt) -> PublishResult<PresentableCredential> {
        let _lock = self.store.lock().await?;

        let pair = match self.store.load().await? {
            None => {
                info!("no stored credential, logging in");
                self.full_login(prompt).await?
            }
            Some(stored) => match self.client.refresh(&stored.discharge).await {
                Ok(discharge) => stored.with_discharge(discharge),
                Err(e @ PublishError::RefreshFailed { .. }) => {
                    warn!(error = %e, "refresh rejected, re-authenticating");
                    self.reauthenticate(&stored, prompt).await?
                }
                Err(e) => return Err(e),
            },
        };

        let credential = bind(&pair.root, &pair.discharge)?;
        self.store.save(&pair).await?;
        Ok(credential)
    }

    /// Fresh root token and discharge, regardless of stored state.
    pub async fn login(&self, prompt: &dyn SecretPrompt) -> PublishResult<PresentableCredential> {
        let _lock = self.store.lock().await?;
        let pair = self.full_login(prompt).await?;
        let credential = bind(&pair.root, &pair.discharge)?;
        self.store.save(&pair).await?;
        info!(path = %self.store.path().display(), "saved credential");
        Ok(credential)
    }

    async fn full_login(&self, prompt: &dyn SecretPrompt) -> PublishResult<CredentialPair> {
        let root = self.client.issue_root_token().await?;
        let authority = self.client.config().identity_authority()?;
        let caveat = find_caveat(&root, &authority)?;
        let discharge = self.client.authenticate(&caveat, prompt).await?;
        Ok(CredentialPair::new(root, discharge))
    }

    /// New discharge for the stored root token's caveat.
    async fn reauthenticate(
        &self,
        stored: &CredentialPair,
        prompt: &dyn SecretPrompt,
    ) -> PublishResult<CredentialPair> {
        let authority = self.client.config().identity_authority()?;
        let caveat = find_caveat(&stored.root, &authority)?;
        let discharge = self.client.authenticate(&caveat, prompt).await?;
        Ok(stored.with_discharge(discharge))
    }
}
