//! Symmetric encryption of backend secrets at rest.
//!
//! Stored values are `base64(IV ‖ AES-256-CBC(plaintext))` with PKCS#7
//! padding and a fresh random 16-byte IV per call. The key is injected
//! through [`KeySource`] rather than embedded in the binary.

use std::fmt;

use aes::Aes256;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use rand::{RngCore, rngs::OsRng};
use thiserror::Error;

type Encryptor = cbc::Encryptor<Aes256>;
type Decryptor = cbc::Decryptor<Aes256>;

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;
/// CBC initialisation vector length in bytes.
pub const IV_LEN: usize = 16;
/// Environment variable holding the base64-encoded vault key.
pub const VAULT_KEY_ENV: &str = "GEOSURVEY_VAULT_KEY";

const BLOCK_LEN: usize = 16;

/// Errors constructing a [`VaultKey`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    /// The decoded key had the wrong length.
    #[error("vault key must be {KEY_LEN} bytes, got {actual}")]
    KeyLength {
        /// Decoded length.
        actual: usize,
    },
    /// The key was not valid base64.
    #[error("vault key is not valid base64: {message}")]
    KeyEncoding {
        /// Decoder message.
        message: String,
    },
    /// The key variable was unset or not Unicode.
    #[error("environment variable {name} is not set")]
    MissingKey {
        /// Variable that was read.
        name: String,
    },
}

/// A 256-bit vault key. `Debug` never prints the key material.
#[derive(Clone, PartialEq, Eq)]
pub struct VaultKey([u8; KEY_LEN]);

impl fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VaultKey(<redacted>)")
    }
}

impl VaultKey {
    /// Build a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::KeyLength`] unless `bytes` is 32 bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VaultError> {
        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|_| VaultError::KeyLength {
            actual: bytes.len(),
        })?;
        Ok(Self(key))
    }

    /// Build a key from its standard base64 encoding.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::KeyEncoding`] or [`VaultError::KeyLength`].
    pub fn from_base64(encoded: &str) -> Result<Self, VaultError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|err| VaultError::KeyEncoding {
                message: err.to_string(),
            })?;
        Self::from_bytes(&bytes)
    }

    /// Generate a random key from the operating system RNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut key = [0_u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self(key)
    }

    /// Standard base64 encoding of the key, as read by [`VaultKey::from_base64`].
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }
}

/// Supplies the vault key to the process.
pub trait KeySource {
    /// Produce the key.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError`] when no valid key is available.
    fn vault_key(&self) -> Result<VaultKey, VaultError>;
}

impl KeySource for VaultKey {
    fn vault_key(&self) -> Result<VaultKey, VaultError> {
        Ok(self.clone())
    }
}

/// Reads a base64 key from an environment variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvKeySource {
    variable: String,
}

impl Default for EnvKeySource {
    fn default() -> Self {
        Self::new(VAULT_KEY_ENV)
    }
}

impl EnvKeySource {
    /// Read from `variable` instead of [`VAULT_KEY_ENV`].
    #[must_use]
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
        }
    }
}

impl KeySource for EnvKeySource {
    fn vault_key(&self) -> Result<VaultKey, VaultError> {
        let value = std::env::var(&self.variable).map_err(|_| VaultError::MissingKey {
            name: self.variable.clone(),
        })?;
        VaultKey::from_base64(&value)
    }
}

/// Encrypts and decrypts credential fields.
///
/// # Examples
///
/// ```
/// use geosurvey_data::{CredentialVault, VaultKey};
///
/// let vault = CredentialVault::new(VaultKey::generate());
/// let stored = vault.encrypt("s3cret");
/// assert_ne!(stored, "s3cret");
/// assert_eq!(vault.decrypt(&stored), "s3cret");
/// assert_eq!(vault.decrypt("not a ciphertext"), "");
/// ```
#[derive(Debug, Clone)]
pub struct CredentialVault {
    key: VaultKey,
}

impl CredentialVault {
    /// Vault using `key`.
    #[must_use]
    pub const fn new(key: VaultKey) -> Self {
        Self { key }
    }

    /// Vault using the key supplied by `source`.
    ///
    /// # Errors
    ///
    /// Propagates the source's [`VaultError`].
    pub fn from_source(source: &impl KeySource) -> Result<Self, VaultError> {
        source.vault_key().map(Self::new)
    }

    /// Encrypt `plaintext`; the empty string stays empty.
    #[must_use]
    pub fn encrypt(&self, plaintext: &str) -> String {
        if plaintext.is_empty() {
            return String::new();
        }
        let mut iv = [0_u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);
        let ciphertext = Encryptor::new(&self.key.0.into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
        let mut blob = Vec::with_capacity(IV_LEN + ciphertext.len());
        blob.extend_from_slice(&iv);
        blob.extend_from_slice(&ciphertext);
        STANDARD.encode(blob)
    }

    /// Decrypt a stored value.
    ///
    /// Never fails: malformed, truncated, or foreign ciphertexts yield the
    /// empty string and a warning, so callers continue degraded.
    #[must_use]
    pub fn decrypt(&self, stored: &str) -> String {
        match self.try_decrypt(stored) {
            Ok(plaintext) => plaintext,
            Err(reason) => {
                log::warn!("stored credential could not be decrypted: {reason}");
                String::new()
            }
        }
    }

    fn try_decrypt(&self, stored: &str) -> Result<String, &'static str> {
        let stored = stored.trim();
        if stored.is_empty() {
            return Ok(String::new());
        }
        let blob = STANDARD.decode(stored).map_err(|_| "not base64")?;
        if blob.len() < IV_LEN + BLOCK_LEN || (blob.len() - IV_LEN) % BLOCK_LEN != 0 {
            return Err("truncated ciphertext");
        }
        let (iv, ciphertext) = blob.split_at(IV_LEN);
        let iv: [u8; IV_LEN] = iv.try_into().map_err(|_| "truncated IV")?;
        let plaintext = Decryptor::new(&self.key.0.into(), &iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| "bad padding")?;
        String::from_utf8(plaintext).map_err(|_| "plaintext is not UTF-8")
    }
}
