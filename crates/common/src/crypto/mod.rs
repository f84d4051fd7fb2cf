//! Cryptographic primitives for the custody protocol
//!
//! - **Identity**: every principal holds two independent keypairs, X25519
//!   for receiving wrapped keys and Ed25519 for signing
//! - **Encryption**: ChaCha20-Poly1305 with a fresh [`SymmetricKey`] per
//!   artifact
//! - **Key wrapping**: ECIES style [`KeyEnvelope`]s (X25519 + HKDF-SHA256 +
//!   ChaCha20-Poly1305) addressed to a single recipient
//! - **Authenticity**: Ed25519 signatures over SHA-256 content digests
//!
//! # Custody model
//!
//! An owner encrypts an artifact under a new `SymmetricKey` and wraps that
//! key to its own wrapping key. Granting access means unwrapping the
//! self-envelope locally and wrapping the same key again for the
//! requester. The server only ever handles public keys and envelopes.

mod envelope;
mod keys;
mod secret;
mod signature;

pub use envelope::{unwrap, wrap, EnvelopeError, EnvelopeRecord, KeyEnvelope, ENVELOPE_INFO_LABEL};
pub use keys::{
    generate_sign_keypair, generate_wrap_keypair, KeyEncoding, KeyError, PrincipalKeys,
    PublicIdentity, SignPrivateKey, SignPublicKey, WrapPrivateKey, WrapPublicKey,
    PRIVATE_KEY_SIZE, PUBLIC_KEY_SIZE,
};
pub use secret::{Sealed, SecretError, SymmetricKey, NONCE_SIZE, SECRET_SIZE, TAG_SIZE};
pub use signature::{sign, verify, ContentDigest, Signature, DIGEST_SIZE, SIGNATURE_SIZE};
