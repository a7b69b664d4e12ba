//! Security domain entities
//!
//! Master key handling and AES-256-GCM sealing of individual secret values.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, OsRng, Payload},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use rand_chacha::rand_core::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Error, Result};

/// Size of AES-256 key in bytes
pub const AES_KEY_SIZE: usize = 32;

/// Size of AES-GCM nonce in bytes
const NONCE_SIZE: usize = 12;

/// A master encryption key that is securely zeroed on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    bytes: [u8; AES_KEY_SIZE],
}

impl MasterKey {
    /// Generate a new random master key
    pub fn generate() -> Self {
        let mut bytes = [0u8; AES_KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Create a master key from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != AES_KEY_SIZE {
            return Err(Error::MasterKeyUnavailable(format!(
                "invalid key length: expected {}, got {}",
                AES_KEY_SIZE,
                bytes.len()
            )));
        }
        let mut key_bytes = [0u8; AES_KEY_SIZE];
        key_bytes.copy_from_slice(bytes);
        Ok(Self { bytes: key_bytes })
    }

    /// Create a master key from hex-encoded string
    pub fn from_hex(hex: &str) -> Result<Self> {
        let mut bytes = hex::decode(hex.trim())
            .map_err(|e| Error::MasterKeyUnavailable(format!("invalid hex key: {}", e)))?;
        let key = Self::from_bytes(&bytes);
        bytes.zeroize();
        key
    }

    /// Create a master key from base64-encoded string
    pub fn from_base64(b64: &str) -> Result<Self> {
        let mut bytes = STANDARD
            .decode(b64.trim())
            .map_err(|e| Error::MasterKeyUnavailable(format!("invalid base64 key: {}", e)))?;
        let key = Self::from_bytes(&bytes);
        bytes.zeroize();
        key
    }

    /// Export key as hex string (for storage in keyring)
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Export key as base64 string
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.bytes)
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        Aes256Gcm::new_from_slice(&self.bytes).map_err(|e| Error::Encryption(e.to_string()))
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A single secret value sealed with AES-256-GCM
///
/// Both parts are base64 encoded so they can live in TEXT columns. The
/// associated data passed to [`SealedSecret::seal`] is not stored; the same
/// bytes must be supplied again to [`SealedSecret::open`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedSecret {
    /// The encrypted value (base64 encoded)
    pub ciphertext: String,

    /// The nonce used for encryption (base64 encoded)
    pub nonce: String,
}

impl SealedSecret {
    /// Encrypt `plaintext` under `master_key`, authenticating `aad` alongside it
    pub fn seal(plaintext: &str, master_key: &MasterKey, aad: &[u8]) -> Result<Self> {
        // Fresh nonce for every encryption
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = master_key
            .cipher()?
            .encrypt(
                nonce,
                Payload {
                    msg: plaintext.as_bytes(),
                    aad,
                },
            )
            .map_err(|e| Error::Encryption(e.to_string()))?;

        Ok(Self {
            ciphertext: STANDARD.encode(&ciphertext),
            nonce: STANDARD.encode(nonce_bytes),
        })
    }

    /// Decrypt the value, returning a string that is zeroized on drop
    pub fn open(&self, master_key: &MasterKey, aad: &[u8]) -> Result<SecureString> {
        let ciphertext = STANDARD
            .decode(&self.ciphertext)
            .map_err(|e| Error::Decryption(format!("Invalid ciphertext: {}", e)))?;

        let nonce_bytes = STANDARD
            .decode(&self.nonce)
            .map_err(|e| Error::Decryption(format!("Invalid nonce: {}", e)))?;

        if nonce_bytes.len() != NONCE_SIZE {
            return Err(Error::Decryption(format!(
                "Invalid nonce length: expected {}, got {}",
                NONCE_SIZE,
                nonce_bytes.len()
            )));
        }

        let nonce = Nonce::from_slice(&nonce_bytes);

        let plaintext = master_key
            .cipher()
            .map_err(|e| Error::Decryption(e.to_string()))?
            .decrypt(
                nonce,
                Payload {
                    msg: ciphertext.as_ref(),
                    aad,
                },
            )
            .map_err(|_| {
                Error::Decryption("invalid key or corrupted data".to_string())
            })?;

        let decrypted = String::from_utf8(plaintext)
            .map_err(|e| Error::Decryption(format!("Invalid UTF-8: {}", e)))?;

        Ok(SecureString::new(decrypted))
    }
}

/// A string that is securely zeroed when dropped
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct SecureString {
    inner: String,
}

impl SecureString {
    /// Create a new secure string
    pub fn new(s: String) -> Self {
        Self { inner: s }
    }

    /// Get the string value
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Returns true when the wrapped value is empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Copy the value out. The returned String is NOT zeroized.
    pub fn expose(&self) -> String {
        self.inner.clone()
    }
}

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureString")
            .field("inner", &"[REDACTED]")
            .finish()
    }
}

impl AsRef<str> for SecureString {
    fn as_ref(&self) -> &str {
        &self.inner
    }
}
