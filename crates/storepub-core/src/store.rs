//! Encrypted credential store.
//!
//! # Sources
//!
//! ```text
//! 1. store file (StoreConfig::store_path)      ~/.storepub-publish-macaroon.enc
//! 2. pre-encrypted blob (STOREPUB_CREDENTIAL)   only when the file does not exist
//! ```
//!
//! A source that exists but does not decrypt is fatal; the next source is
//! never tried in that case.

use std::fs::TryLockError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::cipher;
use crate::config::{StoreConfig, CREDENTIAL_ENV};
use crate::error::{PublishError, PublishResult};
use crate::types::CredentialPair;

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Encrypted credential store.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    config: StoreConfig,
    lock_timeout: Duration,
    in_process: Arc<Mutex<()>>,
}

/// Exclusive hold on the store file.
///
/// Backed by an OS advisory lock on `<store_path>.lock`, so a holder that
/// dies without unwinding releases it too. The lock file itself stays.
#[derive(Debug)]
pub struct StoreLock {
    file: std::fs::File,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!(error = %e, "failed to release store lock");
        }
    }
}

impl CredentialStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            in_process: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.config.store_path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.config.store_path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Load the stored pair. `Ok(None)` when no source is present.
    pub async fn load(&self) -> PublishResult<Option<CredentialPair>> {
        let path = &self.config.store_path;

        match fs::read_to_string(path).await {
            Ok(blob) => {
                debug!(path = %path.display(), "loading credential from store file");
                return self.decode(&blob, &path.display().to_string()).map(Some);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(PublishError::Storage {
                    message: format!("failed to read {}: {}", path.display(), e),
                })
            }
        }

        match &self.config.pre_encrypted_credential {
            Some(blob) => {
                debug!("loading credential from {}", CREDENTIAL_ENV);
                self.decode(blob, CREDENTIAL_ENV).map(Some)
            }
            None => {
                debug!("no stored credential");
                Ok(None)
            }
        }
    }

    /// Encrypt and atomically replace the store file.
    pub async fn save(&self, pair: &CredentialPair) -> PublishResult<()> {
        let plaintext = serde_json::to_vec(pair).map_err(|e| PublishError::Storage {
            message: format!("failed to serialize credential: {}", e),
        })?;
        let blob = cipher::encrypt(&plaintext, &self.config.passphrase).map_err(|e| {
            PublishError::Storage {
                message: e.to_string(),
            }
        })?;

        let path = &self.config.store_path;
        ensure_parent(path).await?;
        write_atomic(path, &blob).await?;

        debug!(path = %path.display(), "saved credential");
        Ok(())
    }

    /// Take the store lock (in-process mutex, then `<store_path>.lock`).
    pub async fn lock(&self) -> PublishResult<StoreLock> {
        let deadline = Instant::now() + self.lock_timeout;
        let lock_path = self.lock_path();

        let guard = tokio::time::timeout(self.lock_timeout, self.in_process.clone().lock_owned())
            .await
            .map_err(|_| locked_error(&lock_path))?;

        ensure_parent(&lock_path).await?;
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .await
            .map_err(|e| PublishError::Storage {
                message: format!("failed to open {}: {}", lock_path.display(), e),
            })?
            .into_std()
            .await;

        loop {
            match file.try_lock() {
                Ok(()) => {
                    debug!(path = %lock_path.display(), "acquired store lock");
                    return Ok(StoreLock {
                        file,
                        _guard: guard,
                    });
                }
                Err(TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        return Err(locked_error(&lock_path));
                    }
                    tokio::time::sleep(LOCK_RETRY_INTERVAL).await;
                }
                Err(TryLockError::Error(e)) => {
                    return Err(PublishError::Storage {
                        message: format!("failed to lock {}: {}", lock_path.display(), e),
                    })
                }
            }
        }
    }

    fn decode(&self, blob: &str, source_name: &str) -> PublishResult<CredentialPair> {
        let corrupt = |message: String| PublishError::CredentialStoreCorrupt {
            source_name: source_name.to_string(),
            message,
        };

        let plaintext =
            cipher::decrypt(blob, &self.config.passphrase).map_err(|e| corrupt(e.to_string()))?;
        serde_json::from_slice(&plaintext)
            .map_err(|e| corrupt(format!("decrypted content is not a credential: {}", e)))
    }
}

fn locked_error(lock_path: &Path) -> PublishError {
    PublishError::Storage {
        message: format!(
            "credential store is in use by another process ({})",
            lock_path.display()
        ),
    }
}

async fn ensure_parent(path: &Path) -> PublishResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| PublishError::Storage {
                message: format!("failed to create {}: {}", parent.display(), e),
            })?;
    }
    Ok(())
}

async fn write_atomic(path: &Path, content: &str) -> PublishResult<()> {
    let temp_path = path.with_extension("tmp");

    // a leftover from an interrupted save may carry looser permissions
    let _ = fs::remove_file(&temp_path).await;

    let result = match write_restricted(&temp_path, content).await {
        Ok(()) => fs::rename(&temp_path, path)
            .await
            .map_err(|e| PublishError::Storage {
                message: format!("failed to rename temp file: {}", e),
            }),
        Err(e) => Err(e),
    };

    if result.is_err() {
        let _ = fs::remove_file(&temp_path).await;
    }
    result
}

/// Create `path` readable by the owner only, then write and flush `content`.
async fn write_restricted(path: &Path, content: &str) -> PublishResult<()> {
    let storage = |e: std::io::Error| PublishError::Storage {
        message: format!("failed to write temp file: {}", e),
    };

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await.map_err(storage)?;
    file.write_all(content.as_bytes()).await.map_err(storage)?;
    file.sync_all().await.map_err(storage)?;
    Ok(())
}
