//! Key wrapping for a single recipient (ECIES over X25519)
//!
//! # Protocol
//!
//! To wrap `secret` for a recipient public key `R`:
//! 1. **Ephemeral keypair**: draw a fresh X25519 keypair `(e, E)`
//! 2. **Agreement**: `shared = X25519(e, R)`
//! 3. **Derive**: `kek = HKDF-SHA256(ikm = shared, info = LABEL || E || R)`
//! 4. **Encrypt**: ChaCha20-Poly1305 under `kek` with a random nonce
//! 5. **Package**: `KeyEnvelope { E, nonce, ciphertext_with_tag }`
//!
//! The recipient recomputes `shared = X25519(r, E)` and reverses the steps.
//! Binding both public keys into the HKDF info ties the derived key to this
//! exact pair. The ephemeral private key lives only for the duration of
//! [`wrap`].
//!
//! # Wire formats
//!
//! - binary: bincode record of `(ephemeral DER, nonce, ciphertext)`
//! - text: [`EnvelopeRecord`], each field standard base64

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::keys::{KeyEncoding, KeyError, WrapPrivateKey, WrapPublicKey};
use super::secret::{nonce_from_slice, SecretError, SymmetricKey, NONCE_SIZE, SECRET_SIZE, TAG_SIZE};

/// Domain separation label mixed into every envelope key derivation
pub const ENVELOPE_INFO_LABEL: &[u8] = b"custody/key-envelope/v1";

/// Errors that can occur while wrapping or unwrapping
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// The envelope (or a key inside it) is not well formed
    #[error("malformed envelope: {0}")]
    KeyFormat(String),
    /// Wrong recipient key, or the envelope was modified
    #[error("envelope authentication failed")]
    Authentication,
}

impl From<KeyError> for EnvelopeError {
    fn from(err: KeyError) -> Self {
        match err {
            KeyError::Format(msg) => EnvelopeError::KeyFormat(msg),
        }
    }
}

impl From<SecretError> for EnvelopeError {
    fn from(err: SecretError) -> Self {
        match err {
            SecretError::Authentication => EnvelopeError::Authentication,
            SecretError::Format(msg) => EnvelopeError::KeyFormat(msg),
        }
    }
}

/// A secret wrapped for exactly one recipient
///
/// Serializes through [`EnvelopeRecord`] so JSON documents carry base64
/// strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "EnvelopeRecord", try_from = "EnvelopeRecord")]
pub struct KeyEnvelope {
    pub ephemeral_public_key: WrapPublicKey,
    pub nonce: [u8; NONCE_SIZE],
    pub ciphertext: Vec<u8>,
}

/// Text form of a [`KeyEnvelope`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeRecord {
    /// base64 of the SubjectPublicKeyInfo DER
    pub ephemeral_public_key: String,
    pub nonce: String,
    pub ciphertext: String,
}

#[derive(Serialize, Deserialize)]
struct EnvelopeWire {
    ephemeral_public_key: Vec<u8>,
    nonce: Vec<u8>,
    ciphertext: Vec<u8>,
}

fn derive_kek(
    private: &WrapPrivateKey,
    peer: &WrapPublicKey,
    ephemeral_public: &WrapPublicKey,
    recipient_public: &WrapPublicKey,
) -> Result<SymmetricKey, EnvelopeError> {
    let shared = private.diffie_hellman(peer)?;

    let mut info = Vec::with_capacity(ENVELOPE_INFO_LABEL.len() + 64);
    info.extend_from_slice(ENVELOPE_INFO_LABEL);
    info.extend_from_slice(ephemeral_public.as_bytes());
    info.extend_from_slice(recipient_public.as_bytes());

    let hk = Hkdf::<Sha256>::new(None, &shared[..]);
    let mut okm = Zeroizing::new([0u8; SECRET_SIZE]);
    hk.expand(&info, &mut okm[..])
        .map_err(|_| EnvelopeError::KeyFormat("invalid HKDF output length".into()))?;
    Ok(SymmetricKey::from(*okm))
}

/// Wrap `secret` so that only the holder of the private half of `recipient`
/// can recover it
pub fn wrap(recipient: &WrapPublicKey, secret: &[u8]) -> Result<KeyEnvelope, EnvelopeError> {
    let ephemeral = WrapPrivateKey::generate();
    let ephemeral_public = ephemeral.public();

    let kek = derive_kek(&ephemeral, recipient, &ephemeral_public, recipient)?;
    let sealed = kek.encrypt(secret)?;

    Ok(KeyEnvelope {
        ephemeral_public_key: ephemeral_public,
        nonce: sealed.nonce,
        ciphertext: sealed.ciphertext,
    })
}

/// Recover the secret wrapped in `envelope`
pub fn unwrap(
    recipient: &WrapPrivateKey,
    envelope: &KeyEnvelope,
) -> Result<Zeroizing<Vec<u8>>, EnvelopeError> {
    if envelope.ciphertext.len() < TAG_SIZE {
        return Err(EnvelopeError::KeyFormat(format!(
            "envelope ciphertext shorter than the {} byte tag",
            TAG_SIZE
        )));
    }
    let recipient_public = recipient.public();
    let kek = derive_kek(
        recipient,
        &envelope.ephemeral_public_key,
        &envelope.ephemeral_public_key,
        &recipient_public,
    )?;
    let secret = kek.decrypt(&envelope.nonce, &envelope.ciphertext)?;
    Ok(Zeroizing::new(secret))
}

impl KeyEnvelope {
    /// Wrap an artifact key for `recipient`
    pub fn seal_key(key: &SymmetricKey, recipient: &WrapPublicKey) -> Result<Self, EnvelopeError> {
        wrap(recipient, key.bytes())
    }

    /// Unwrap this envelope as an artifact key
    pub fn open_key(&self, recipient: &WrapPrivateKey) -> Result<SymmetricKey, EnvelopeError> {
        let secret = unwrap(recipient, self)?;
        Ok(SymmetricKey::from_slice(&secret)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        let wire = EnvelopeWire {
            ephemeral_public_key: self.ephemeral_public_key.to_der(),
            nonce: self.nonce.to_vec(),
            ciphertext: self.ciphertext.clone(),
        };
        bincode::serialize(&wire)
            .map_err(|e| EnvelopeError::KeyFormat(format!("envelope encode error: {}", e)))
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, EnvelopeError> {
        let wire: EnvelopeWire = bincode::deserialize(data)
            .map_err(|e| EnvelopeError::KeyFormat(format!("envelope decode error: {}", e)))?;
        Self::from_parts(&wire.ephemeral_public_key, &wire.nonce, wire.ciphertext)
    }

    pub fn to_record(&self) -> EnvelopeRecord {
        EnvelopeRecord {
            ephemeral_public_key: self.ephemeral_public_key.to_base64(),
            nonce: BASE64.encode(self.nonce),
            ciphertext: BASE64.encode(&self.ciphertext),
        }
    }

    pub fn from_record(record: &EnvelopeRecord) -> Result<Self, EnvelopeError> {
        let ephemeral = WrapPublicKey::from_base64(&record.ephemeral_public_key)?;
        let nonce = decode_field("nonce", &record.nonce)?;
        let ciphertext = decode_field("ciphertext", &record.ciphertext)?;
        Self::from_parts(&ephemeral.to_der(), &nonce, ciphertext)
    }

    fn from_parts(
        ephemeral_der: &[u8],
        nonce: &[u8],
        ciphertext: Vec<u8>,
    ) -> Result<Self, EnvelopeError> {
        let ephemeral_public_key = WrapPublicKey::from_der(ephemeral_der)?;
        let nonce = nonce_from_slice(nonce)?;
        if ciphertext.len() < TAG_SIZE {
            return Err(EnvelopeError::KeyFormat(format!(
                "envelope ciphertext shorter than the {} byte tag",
                TAG_SIZE
            )));
        }
        Ok(Self {
            ephemeral_public_key,
            nonce,
            ciphertext,
        })
    }
}

fn decode_field(field: &str, text: &str) -> Result<Vec<u8>, EnvelopeError> {
    BASE64
        .decode(text.trim())
        .map_err(|e| EnvelopeError::KeyFormat(format!("{} base64 decode error: {}", field, e)))
}

impl From<KeyEnvelope> for EnvelopeRecord {
    fn from(envelope: KeyEnvelope) -> Self {
        envelope.to_record()
    }
}

impl TryFrom<EnvelopeRecord> for KeyEnvelope {
    type Error = EnvelopeError;

    fn try_from(record: EnvelopeRecord) -> Result<Self, Self::Error> {
        KeyEnvelope::from_record(&record)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::keys::generate_wrap_keypair;

    #[test]
    fn test_wrap_unwrap_roundtrip() {
        let (private, public) = generate_wrap_keypair();
        let messages: [&[u8]; 4] = [b"", b"k", &[0xAB; 32], &[0x11; 4096]];
        for message in messages {
            let envelope = wrap(&public, message).unwrap();
            let recovered = unwrap(&private, &envelope).unwrap();
            assert_eq!(recovered.as_slice(), message);
        }
    }

    #[test]
    fn test_seal_and_open_key() {
        let (private, public) = generate_wrap_keypair();
        let key = SymmetricKey::generate();

        let envelope = KeyEnvelope::seal_key(&key, &public).unwrap();
        let recovered = envelope.open_key(&private).unwrap();
        assert_eq!(key, recovered);
    }

    #[test]
    fn test_wrong_recipient_fails() {
        let (_, public) = generate_wrap_keypair();
        let (eve, _) = generate_wrap_keypair();

        let envelope = wrap(&public, b"secret").unwrap();
        assert!(matches!(
            unwrap(&eve, &envelope),
            Err(EnvelopeError::Authentication)
        ));
    }

    #[test]
    fn test_each_wrap_uses_fresh_ephemeral_key() {
        let (_, public) = generate_wrap_keypair();
        let a = wrap(&public, b"same").unwrap();
        let b = wrap(&public, b"same").unwrap();
        assert_ne!(a.ephemeral_public_key, b.ephemeral_public_key);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_truncated_ciphertext_is_format_error() {
        let (private, public) = generate_wrap_keypair();
        let mut envelope = wrap(&public, b"secret").unwrap();
        envelope.ciphertext.truncate(TAG_SIZE - 1);
        assert!(matches!(
            unwrap(&private, &envelope),
            Err(EnvelopeError::KeyFormat(_))
        ));
    }

    #[test]
    fn test_low_order_ephemeral_is_format_error() {
        let (private, public) = generate_wrap_keypair();
        let mut envelope = wrap(&public, b"secret").unwrap();
        envelope.ephemeral_public_key = WrapPublicKey::from_raw([0u8; 32]).unwrap();
        assert!(matches!(
            unwrap(&private, &envelope),
            Err(EnvelopeError::KeyFormat(_))
        ));
    }

    #[test]
    fn test_binary_encoding() {
        let (private, public) = generate_wrap_keypair();
        let envelope = wrap(&public, b"binary").unwrap();

        let bytes = envelope.to_bytes().unwrap();
        let decoded = KeyEnvelope::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, envelope);
        assert_eq!(unwrap(&private, &decoded).unwrap().as_slice(), b"binary");

        assert!(matches!(
            KeyEnvelope::from_bytes(&bytes[..bytes.len() / 2]),
            Err(EnvelopeError::KeyFormat(_))
        ));
    }

    #[test]
    fn test_text_encoding() {
        let (_, public) = generate_wrap_keypair();
        let envelope = wrap(&public, b"text").unwrap();

        let json = serde_json::to_string(&envelope).unwrap();
        let decoded: KeyEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, envelope);

        let mut record = envelope.to_record();
        record.nonce = BASE64.encode([0u8; 8]);
        assert!(matches!(
            KeyEnvelope::from_record(&record),
            Err(EnvelopeError::KeyFormat(_))
        ));

        let mut record = envelope.to_record();
        record.ephemeral_public_key = "%%%".to_string();
        assert!(KeyEnvelope::try_from(record).is_err());
    }
}
