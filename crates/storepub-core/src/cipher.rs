//! Passphrase-based authenticated encryption for the credential blob.
//!
//! # Blob layout
//!
//! ```text
//! base64( version:1 | m_cost:4 | t_cost:4 | p_cost:4 | salt:16 | nonce:12 | ciphertext+tag )
//! ```
//!
//! The key is Argon2id over the passphrase and the per-blob salt. Cost
//! parameters are big-endian and travel with the blob, so raising the
//! defaults does not strand existing credentials. The passphrase itself
//! never leaves this process: no child process, no argv.

use std::fmt;

use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

const BLOB_VERSION: u8 = 2;
const PARAMS_LEN: usize = 12;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;
const HEADER_LEN: usize = 1 + PARAMS_LEN + SALT_LEN + NONCE_LEN;

// Upper bounds accepted from a blob header.
const MAX_MEMORY_KIB: u32 = 1 << 20;
const MAX_ITERATIONS: u32 = 64;
const MAX_LANES: u32 = 16;

/// Shortest passphrase accepted for encryption.
pub const MIN_PASSPHRASE_LEN: usize = 8;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub lanes: u32,
}

impl Default for KdfParams {
    /// 19 MiB, 2 passes, 1 lane.
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            lanes: 1,
        }
    }
}

impl KdfParams {
    fn to_bytes(self) -> [u8; PARAMS_LEN] {
        let mut out = [0u8; PARAMS_LEN];
        out[0..4].copy_from_slice(&self.memory_kib.to_be_bytes());
        out[4..8].copy_from_slice(&self.iterations.to_be_bytes());
        out[8..12].copy_from_slice(&self.lanes.to_be_bytes());
        out
    }

    fn from_bytes(raw: &[u8]) -> Result<Self, CipherError> {
        let word = |i: usize| u32::from_be_bytes([raw[i], raw[i + 1], raw[i + 2], raw[i + 3]]);
        let params = Self {
            memory_kib: word(0),
            iterations: word(4),
            lanes: word(8),
        };
        if params.memory_kib > MAX_MEMORY_KIB
            || params.iterations > MAX_ITERATIONS
            || params.lanes > MAX_LANES
        {
            return Err(CipherError::DecryptionFailed {
                reason: "key derivation parameters out of range",
            });
        }
        Ok(params)
    }
}

/// Cipher errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CipherError {
    /// Wrong passphrase, truncated blob, or tampered ciphertext.
    #[error("decryption failed: {reason}")]
    DecryptionFailed { reason: &'static str },

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("key derivation failed")]
    KeyDerivation,

    #[error("passphrase must be at least 8 bytes")]
    WeakPassphrase,
}

/// Secret used to derive the blob key. Zeroized on drop, never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Passphrase(String);

impl Passphrase {
    pub fn new(secret: impl Into<String>) -> Result<Self, CipherError> {
        let secret = secret.into();
        if secret.len() < MIN_PASSPHRASE_LEN {
            return Err(CipherError::WeakPassphrase);
        }
        Ok(Self(secret))
    }

    fn derive_key(&self, salt: &[u8], params: KdfParams) -> Result<Key, CipherError> {
        let params = Params::new(
            params.memory_kib,
            params.iterations,
            params.lanes,
            Some(KEY_LEN),
        )
        .map_err(|_| CipherError::KeyDerivation)?;

        let mut okm = Zeroizing::new([0u8; KEY_LEN]);
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
            .hash_password_into(self.0.as_bytes(), salt, &mut okm[..])
            .map_err(|_| CipherError::KeyDerivation)?;
        Ok(*Key::from_slice(&okm[..]))
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(<redacted>)")
    }
}

/// Encrypt `plaintext` into a single-line base64 blob with default KDF cost.
pub fn encrypt(plaintext: &[u8], passphrase: &Passphrase) -> Result<String, CipherError> {
    encrypt_with_params(plaintext, passphrase, KdfParams::default())
}

pub fn encrypt_with_params(
    plaintext: &[u8],
    passphrase: &Passphrase,
    params: KdfParams,
) -> Result<String, CipherError> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    rand::thread_rng().fill_bytes(&mut nonce_bytes);

    let cipher = ChaCha20Poly1305::new(&passphrase.derive_key(&salt, params)?);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| CipherError::EncryptionFailed)?;

    let mut payload = Vec::with_capacity(HEADER_LEN + ciphertext.len());
    payload.push(BLOB_VERSION);
    payload.extend_from_slice(&params.to_bytes());
    payload.extend_from_slice(&salt);
    payload.extend_from_slice(&nonce_bytes);
    payload.extend_from_slice(&ciphertext);

    Ok(BASE64.encode(payload))
}

/// Decrypt a blob produced by [`encrypt`].
///
/// Surrounding whitespace (a trailing newline in a file or env value) is ignored.
pub fn decrypt(blob: &str, passphrase: &Passphrase) -> Result<Vec<u8>, CipherError> {
    let payload = BASE64
        .decode(blob.trim())
        .map_err(|_| CipherError::DecryptionFailed {
            reason: "not valid base64",
        })?;

    if payload.len() < HEADER_LEN + TAG_LEN {
        return Err(CipherError::DecryptionFailed {
            reason: "blob too short",
        });
    }
    if payload[0] != BLOB_VERSION {
        return Err(CipherError::DecryptionFailed {
            reason: "unknown blob version",
        });
    }

    let (params, rest) = payload[1..].split_at(PARAMS_LEN);
    let (salt, rest) = rest.split_at(SALT_LEN);
    let (nonce_bytes, ciphertext) = rest.split_at(NONCE_LEN);

    let params = KdfParams::from_bytes(params)?;
    let key = passphrase
        .derive_key(salt, params)
        .map_err(|_| CipherError::DecryptionFailed {
            reason: "invalid key derivation parameters",
        })?;
    ChaCha20Poly1305::new(&key)
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| CipherError::DecryptionFailed {
            reason: "wrong passphrase or corrupted data",
        })
}
