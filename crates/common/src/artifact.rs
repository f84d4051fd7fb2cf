//! Encrypted artifacts and their integrity proofs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::{
    sign, verify, ContentDigest, Sealed, SecretError, SignPrivateKey, SignPublicKey, Signature,
    SymmetricKey, DIGEST_SIZE, NONCE_SIZE,
};

/// Prefix of every signed proof statement
const PROOF_CONTEXT: &[u8] = b"custody/integrity-proof/v1";

/// A file encrypted at rest under its own [`SymmetricKey`].
///
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedArtifact {
    pub id: Uuid,
    pub owner: Uuid,
    pub name: String,
    pub nonce: [u8; NONCE_SIZE],
    /// Ciphertext with the authentication tag appended
    pub ciphertext: Vec<u8>,
}

impl EncryptedArtifact {
    pub fn seal(
        id: Uuid,
        owner: Uuid,
        name: impl Into<String>,
        key: &SymmetricKey,
        plaintext: &[u8],
    ) -> Result<Self, SecretError> {
        let sealed = key.encrypt(plaintext)?;
        Ok(Self::from_sealed(id, owner, name, sealed))
    }

    pub fn from_sealed(id: Uuid, owner: Uuid, name: impl Into<String>, sealed: Sealed) -> Self {
        Self {
            id,
            owner,
            name: name.into(),
            nonce: sealed.nonce,
            ciphertext: sealed.ciphertext,
        }
    }

    pub fn sealed(&self) -> Sealed {
        Sealed {
            nonce: self.nonce,
            ciphertext: self.ciphertext.clone(),
        }
    }

    pub fn open(&self, key: &SymmetricKey) -> Result<Vec<u8>, SecretError> {
        key.decrypt(&self.nonce, &self.ciphertext)
    }
}

/// The owner's signed statement of what an artifact's plaintext hashes to.
///
/// The signature covers the artifact id and signer as well as the digest,
/// so a proof cannot be moved to another artifact or reattributed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityProof {
    pub artifact_id: Uuid,
    pub signer: Uuid,
    pub digest: ContentDigest,
    pub signature: Signature,
}

/// The digest that is actually signed. Every field has a fixed width, so
/// the concatenation is unambiguous.
fn statement(artifact_id: Uuid, signer: Uuid, digest: &ContentDigest) -> ContentDigest {
    let mut message = Vec::with_capacity(PROOF_CONTEXT.len() + 16 + 16 + DIGEST_SIZE);
    message.extend_from_slice(PROOF_CONTEXT);
    message.extend_from_slice(artifact_id.as_bytes());
    message.extend_from_slice(signer.as_bytes());
    message.extend_from_slice(digest.as_bytes());
    ContentDigest::of(&message)
}

impl IntegrityProof {
    pub fn create(
        artifact_id: Uuid,
        signer: Uuid,
        key: &SignPrivateKey,
        plaintext: &[u8],
    ) -> Self {
        let digest = ContentDigest::of(plaintext);
        let signature = sign(key, &statement(artifact_id, signer, &digest));
        Self {
            artifact_id,
            signer,
            digest,
            signature,
        }
    }

    /// Check the signature over the recorded artifact id, signer and digest
    pub fn verify(&self, signer: &SignPublicKey) -> bool {
        let statement = statement(self.artifact_id, self.signer, &self.digest);
        verify(signer, &statement, &self.signature)
    }

    /// Check that `plaintext` hashes to the recorded digest and that the
    /// signature over it holds
    pub fn verify_plaintext(&self, signer: &SignPublicKey, plaintext: &[u8]) -> bool {
        ContentDigest::of(plaintext) == self.digest && self.verify(signer)
    }
}
