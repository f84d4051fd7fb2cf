use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::Zeroizing;

/// Size of an X25519 / Ed25519 private key in bytes
pub const PRIVATE_KEY_SIZE: usize = 32;
/// Size of an X25519 / Ed25519 public key in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;

// RFC 8410 encodings. Every key we handle is a fixed 32 byte string behind a
//  fixed header, so the DER is a constant prefix followed by the raw key.
const X25519_SPKI_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x6e, 0x03, 0x21, 0x00,
];
const X25519_PKCS8_PREFIX: [u8; 16] = [
    0x30, 0x2e, 0x02, 0x01, 0x00, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x6e, 0x04, 0x22, 0x04, 0x20,
];
const ED25519_SPKI_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];
const ED25519_PKCS8_PREFIX: [u8; 16] = [
    0x30, 0x2e, 0x02, 0x01, 0x00, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x04, 0x22, 0x04, 0x20,
];

const PUBLIC_PEM_TAG: &str = "PUBLIC KEY";
const PRIVATE_PEM_TAG: &str = "PRIVATE KEY";

/// Errors that can occur during key operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// Malformed or wrong-length key material, or material for the wrong key role
    #[error("malformed key material: {0}")]
    Format(String),
}

impl KeyError {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        KeyError::Format(msg.into())
    }
}

/// Fill a fixed size buffer from the operating system CSPRNG
pub(crate) fn random_bytes<const N: usize>() -> [u8; N] {
    let mut buff = [0u8; N];
    getrandom::getrandom(&mut buff).expect("failed to generate random bytes");
    buff
}

/// Shared serialization for every key type in the protocol.
///
/// Implementors only describe their raw 32 byte form plus the DER header
/// and PEM tag for their role; DER, base64 and PEM are derived from that.
/// Decoding checks the header, so a signing key can never be loaded where a
/// wrapping key is expected (and vice versa).
pub trait KeyEncoding: Sized {
    /// Human readable name used in error messages
    const KIND: &'static str;
    /// DER bytes that precede the raw key
    const DER_PREFIX: &'static [u8];
    /// PEM label
    const PEM_TAG: &'static str;

    fn to_raw(&self) -> [u8; 32];

    fn from_raw(bytes: [u8; 32]) -> Result<Self, KeyError>;

    /// Encode as DER (SubjectPublicKeyInfo or PKCS#8)
    fn to_der(&self) -> Vec<u8> {
        let mut der = Vec::with_capacity(Self::DER_PREFIX.len() + 32);
        der.extend_from_slice(Self::DER_PREFIX);
        der.extend_from_slice(&self.to_raw());
        der
    }

    fn from_der(der: &[u8]) -> Result<Self, KeyError> {
        let expected = Self::DER_PREFIX.len() + 32;
        if der.len() != expected {
            return Err(KeyError::format(format!(
                "invalid {} DER size, expected {}, got {}",
                Self::KIND,
                expected,
                der.len()
            )));
        }
        let (prefix, raw) = der.split_at(Self::DER_PREFIX.len());
        if prefix != Self::DER_PREFIX {
            return Err(KeyError::format(format!(
                "DER header does not describe a {}",
                Self::KIND
            )));
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(raw);
        Self::from_raw(bytes)
    }

    /// Standard base64 of the DER encoding, for text based transports
    fn to_base64(&self) -> String {
        BASE64.encode(self.to_der())
    }

    fn from_base64(text: &str) -> Result<Self, KeyError> {
        let der = BASE64
            .decode(text.trim())
            .map_err(|e| KeyError::format(format!("{} base64 decode error: {}", Self::KIND, e)))?;
        Self::from_der(&der)
    }

    fn to_pem(&self) -> String {
        pem::encode(&pem::Pem::new(Self::PEM_TAG, self.to_der()))
    }

    fn from_pem(pem_str: &str) -> Result<Self, KeyError> {
        let pem = pem::parse(pem_str)
            .map_err(|e| KeyError::format(format!("failed to parse PEM: {}", e)))?;
        if pem.tag() != Self::PEM_TAG {
            return Err(KeyError::format(format!(
                "invalid PEM tag, expected {}, got {}",
                Self::PEM_TAG,
                pem.tag()
            )));
        }
        Self::from_der(pem.contents())
    }
}

/// Public half of a principal's key-agreement (wrapping) keypair.
///
/// Envelopes are addressed to this key. Publishing it is safe; the server
/// only ever stores keys of this kind and [`SignPublicKey`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct WrapPublicKey(X25519PublicKey);

impl WrapPublicKey {
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        self.0.as_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    pub(crate) fn inner(&self) -> &X25519PublicKey {
        &self.0
    }
}

impl KeyEncoding for WrapPublicKey {
    const KIND: &'static str = "X25519 public key";
    const DER_PREFIX: &'static [u8] = &X25519_SPKI_PREFIX;
    const PEM_TAG: &'static str = PUBLIC_PEM_TAG;

    fn to_raw(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    fn from_raw(bytes: [u8; 32]) -> Result<Self, KeyError> {
        Ok(Self(X25519PublicKey::from(bytes)))
    }
}

impl fmt::Debug for WrapPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WrapPublicKey({})", self.to_hex())
    }
}

/// Private half of a principal's key-agreement (wrapping) keypair.
///
/// Never leaves the principal's custody boundary. The inner scalar is
/// zeroized on drop.
#[derive(Clone)]
pub struct WrapPrivateKey(StaticSecret);

impl WrapPrivateKey {
    /// Generate a new random key using a cryptographically secure RNG
    pub fn generate() -> Self {
        Self(StaticSecret::from(random_bytes::<PRIVATE_KEY_SIZE>()))
    }

    /// Derive the public key from this private key
    pub fn public(&self) -> WrapPublicKey {
        WrapPublicKey(X25519PublicKey::from(&self.0))
    }

    /// X25519 agreement with `public`.
    ///
    /// Fails when the peer key is a low-order point, since the output would
    /// then be independent of our private key.
    pub(crate) fn diffie_hellman(
        &self,
        public: &WrapPublicKey,
    ) -> Result<Zeroizing<[u8; 32]>, KeyError> {
        let shared = self.0.diffie_hellman(public.inner());
        if !shared.was_contributory() {
            return Err(KeyError::format(
                "non-contributory key agreement (low-order public key)",
            ));
        }
        Ok(Zeroizing::new(*shared.as_bytes()))
    }
}

impl KeyEncoding for WrapPrivateKey {
    const KIND: &'static str = "X25519 private key";
    const DER_PREFIX: &'static [u8] = &X25519_PKCS8_PREFIX;
    const PEM_TAG: &'static str = PRIVATE_PEM_TAG;

    fn to_raw(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    fn from_raw(bytes: [u8; 32]) -> Result<Self, KeyError> {
        Ok(Self(StaticSecret::from(bytes)))
    }
}

impl fmt::Debug for WrapPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WrapPrivateKey(public: {})", self.public().to_hex())
    }
}

/// Public half of a principal's signing keypair (Ed25519).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignPublicKey(VerifyingKey);

impl SignPublicKey {
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        self.0.as_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    /// Verify an Ed25519 signature on a message.
    ///
    /// Uses strict verification, rejecting malleable and small-order
    /// signatures.
    pub fn verify(
        &self,
        msg: &[u8],
        signature: &ed25519_dalek::Signature,
    ) -> Result<(), ed25519_dalek::SignatureError> {
        self.0.verify_strict(msg, signature)
    }
}

impl KeyEncoding for SignPublicKey {
    const KIND: &'static str = "Ed25519 public key";
    const DER_PREFIX: &'static [u8] = &ED25519_SPKI_PREFIX;
    const PEM_TAG: &'static str = PUBLIC_PEM_TAG;

    fn to_raw(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    fn from_raw(bytes: [u8; 32]) -> Result<Self, KeyError> {
        VerifyingKey::from_bytes(&bytes)
            .map(Self)
            .map_err(|_| KeyError::format("Ed25519 public key is not a valid curve point"))
    }
}

impl fmt::Debug for SignPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignPublicKey({})", self.to_hex())
    }
}

/// Private half of a principal's signing keypair (Ed25519).
#[derive(Clone)]
pub struct SignPrivateKey(SigningKey);

impl SignPrivateKey {
    /// Generate a new random key using a cryptographically secure RNG
    pub fn generate() -> Self {
        Self(SigningKey::from_bytes(&random_bytes::<PRIVATE_KEY_SIZE>()))
    }

    pub fn public(&self) -> SignPublicKey {
        SignPublicKey(self.0.verifying_key())
    }

    /// Sign a message, returning a detached signature
    pub fn sign(&self, msg: &[u8]) -> ed25519_dalek::Signature {
        self.0.sign(msg)
    }
}

impl KeyEncoding for SignPrivateKey {
    const KIND: &'static str = "Ed25519 private key";
    const DER_PREFIX: &'static [u8] = &ED25519_PKCS8_PREFIX;
    const PEM_TAG: &'static str = PRIVATE_PEM_TAG;

    fn to_raw(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    fn from_raw(bytes: [u8; 32]) -> Result<Self, KeyError> {
        Ok(Self(SigningKey::from_bytes(&bytes)))
    }
}

impl fmt::Debug for SignPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SignPrivateKey(public: {})", self.public().to_hex())
    }
}

/// Generate a fresh key-agreement keypair
pub fn generate_wrap_keypair() -> (WrapPrivateKey, WrapPublicKey) {
    let private = WrapPrivateKey::generate();
    let public = private.public();
    (private, public)
}

/// Generate a fresh signing keypair
pub fn generate_sign_keypair() -> (SignPrivateKey, SignPublicKey) {
    let private = SignPrivateKey::generate();
    let public = private.public();
    (private, public)
}

/// Both private keys held by a principal.
///
/// The two keypairs are generated independently of each other; nothing in
/// the protocol ever derives one from the other.
#[derive(Debug, Clone)]
pub struct PrincipalKeys {
    pub wrap: WrapPrivateKey,
    pub sign: SignPrivateKey,
}

impl PrincipalKeys {
    pub fn generate() -> Self {
        Self {
            wrap: WrapPrivateKey::generate(),
            sign: SignPrivateKey::generate(),
        }
    }

    pub fn public(&self) -> PublicIdentity {
        PublicIdentity {
            wrap: self.wrap.public(),
            sign: self.sign.public(),
        }
    }
}

/// The published half of [`PrincipalKeys`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicIdentity {
    pub wrap: WrapPublicKey,
    pub sign: SignPublicKey,
}

// Public keys travel as base64 DER in every serde format we use, so a JSON
//  document and a bincode record carry byte-identical key material.
macro_rules! serde_as_base64_der {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                serializer.serialize_str(&self.to_base64())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let text = String::deserialize(deserializer)?;
                <$ty>::from_base64(&text).map_err(serde::de::Error::custom)
            }
        }
    };
}

serde_as_base64_der!(WrapPublicKey);
serde_as_base64_der!(SignPublicKey);
