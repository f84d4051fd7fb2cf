//! Content encryption using ChaCha20-Poly1305
//!
//! Every artifact is encrypted under its own [`SymmetricKey`]. The key is
//! never stored in the clear; it only leaves memory wrapped inside a
//! [`KeyEnvelope`](super::KeyEnvelope) addressed to a principal.

use std::fmt;

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::keys::random_bytes;

/// Size of ChaCha20-Poly1305 nonce in bytes
pub const NONCE_SIZE: usize = 12;
/// Size of ChaCha20-Poly1305 key in bytes (256 bits)
pub const SECRET_SIZE: usize = 32;
/// Size of the Poly1305 authentication tag in bytes
pub const TAG_SIZE: usize = 16;

/// Errors that can occur during encryption/decryption
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    /// Wrong-size key or nonce, or a ciphertext too short to hold a tag
    #[error("malformed secret material: {0}")]
    Format(String),
    /// Tag mismatch: wrong key, or the nonce or ciphertext was modified
    #[error("authentication failed")]
    Authentication,
}

/// A 256-bit symmetric encryption key for a single artifact
///
/// The key bytes are wiped when the value is dropped, and `Debug` never
/// prints them.
///
/// # Examples
///
/// ```ignore
/// let key = SymmetricKey::generate();
/// let sealed = key.encrypt(b"sensitive data")?;
/// let recovered = key.open(&sealed)?;
/// assert_eq!(recovered, b"sensitive data");
/// ```
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; SECRET_SIZE]);

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

impl From<[u8; SECRET_SIZE]> for SymmetricKey {
    fn from(bytes: [u8; SECRET_SIZE]) -> Self {
        SymmetricKey(bytes)
    }
}

/// Output of a single encryption: the nonce drawn for it and the ciphertext
/// with the authentication tag appended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sealed {
    pub nonce: [u8; NONCE_SIZE],
    pub ciphertext: Vec<u8>,
}

pub(crate) fn nonce_from_slice(nonce: &[u8]) -> Result<[u8; NONCE_SIZE], SecretError> {
    nonce.try_into().map_err(|_| {
        SecretError::Format(format!(
            "invalid nonce size, expected {}, got {}",
            NONCE_SIZE,
            nonce.len()
        ))
    })
}

impl SymmetricKey {
    /// Generate a new random key using a cryptographically secure RNG
    pub fn generate() -> Self {
        Self(random_bytes::<SECRET_SIZE>())
    }

    /// Create a key from a byte slice
    ///
    /// # Errors
    ///
    /// Returns [`SecretError::Format`] if the slice is not exactly
    /// `SECRET_SIZE` bytes.
    pub fn from_slice(data: &[u8]) -> Result<Self, SecretError> {
        if data.len() != SECRET_SIZE {
            return Err(SecretError::Format(format!(
                "invalid secret size, expected {}, got {}",
                SECRET_SIZE,
                data.len()
            )));
        }
        let mut buff = [0; SECRET_SIZE];
        buff.copy_from_slice(data);
        Ok(buff.into())
    }

    /// Get a reference to the key bytes
    pub fn bytes(&self) -> &[u8] {
        self.0.as_ref()
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(self.bytes()))
    }

    /// Encrypt data under a freshly drawn random nonce
    pub fn encrypt(&self, data: &[u8]) -> Result<Sealed, SecretError> {
        let nonce = random_bytes::<NONCE_SIZE>();
        let ciphertext = self
            .cipher()
            .encrypt(Nonce::from_slice(&nonce), data)
            .map_err(|_| SecretError::Format("plaintext too large to encrypt".into()))?;
        Ok(Sealed { nonce, ciphertext })
    }

    /// Decrypt and authenticate `ciphertext` under `nonce`.
    ///
    /// Either the full plaintext is returned or nothing is.
    pub fn decrypt(&self, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, SecretError> {
        let nonce = nonce_from_slice(nonce)?;
        if ciphertext.len() < TAG_SIZE {
            return Err(SecretError::Format(format!(
                "ciphertext shorter than the {} byte tag",
                TAG_SIZE
            )));
        }
        self.cipher()
            .decrypt(Nonce::from_slice(&nonce), ciphertext)
            .map_err(|_| SecretError::Authentication)
    }

    pub fn open(&self, sealed: &Sealed) -> Result<Vec<u8>, SecretError> {
        self.decrypt(&sealed.nonce, &sealed.ciphertext)
    }
}
