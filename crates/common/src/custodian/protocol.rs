//! Client side protocol steps
//!
//! Everything here runs inside a principal's custody boundary: these are
//! the only functions that touch private keys or plaintext artifact keys.

use uuid::Uuid;

use crate::artifact::{EncryptedArtifact, IntegrityProof};
use crate::crypto::{
    EnvelopeError, KeyEnvelope, PrincipalKeys, SecretError, SignPublicKey, SymmetricKey,
    WrapPrivateKey, WrapPublicKey,
};

#[derive(thiserror::Error, Debug)]
pub enum ProtocolError {
    #[error("secret error: {0}")]
    Secret(#[from] SecretError),
    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),
    /// Decryption succeeded but the plaintext does not match the owner's
    /// signed digest
    #[error("artifact does not match its integrity proof")]
    IntegrityMismatch,
}

/// Everything produced by encrypting a file for upload
#[derive(Debug)]
pub struct SealedUpload {
    pub artifact: EncryptedArtifact,
    /// The artifact key wrapped for the owner
    pub self_envelope: KeyEnvelope,
    pub proof: IntegrityProof,
    /// The artifact key itself; never leaves the client
    pub key: SymmetricKey,
}

/// Encrypt `plaintext` under a fresh key, wrap that key for the owner and
/// sign the plaintext digest
pub fn seal_upload(
    owner_id: Uuid,
    keys: &PrincipalKeys,
    name: impl Into<String>,
    plaintext: &[u8],
) -> Result<SealedUpload, ProtocolError> {
    let artifact_id = Uuid::new_v4();
    let key = SymmetricKey::generate();

    let artifact = EncryptedArtifact::seal(artifact_id, owner_id, name, &key, plaintext)?;
    let self_envelope = KeyEnvelope::seal_key(&key, &keys.wrap.public())?;
    let proof = IntegrityProof::create(artifact_id, owner_id, &keys.sign, plaintext);

    Ok(SealedUpload {
        artifact,
        self_envelope,
        proof,
        key,
    })
}

/// Re-wrap the artifact key held in the owner's self-envelope for a
/// requester.
///
/// The key exists in the clear only inside this call.
pub fn grant_access(
    owner_wrap: &WrapPrivateKey,
    self_envelope: &KeyEnvelope,
    requester: &WrapPublicKey,
) -> Result<KeyEnvelope, EnvelopeError> {
    let key = self_envelope.open_key(owner_wrap)?;
    KeyEnvelope::seal_key(&key, requester)
}

/// Unwrap the artifact key from `envelope` and decrypt
pub fn open_artifact(
    wrap: &WrapPrivateKey,
    envelope: &KeyEnvelope,
    artifact: &EncryptedArtifact,
) -> Result<Vec<u8>, ProtocolError> {
    let key = envelope.open_key(wrap)?;
    Ok(artifact.open(&key)?)
}

/// [`open_artifact`], then check the owner's integrity proof against the
/// recovered plaintext
pub fn open_and_verify(
    wrap: &WrapPrivateKey,
    envelope: &KeyEnvelope,
    artifact: &EncryptedArtifact,
    proof: &IntegrityProof,
    signer: &SignPublicKey,
) -> Result<Vec<u8>, ProtocolError> {
    let plaintext = open_artifact(wrap, envelope, artifact)?;
    if proof.artifact_id != artifact.id || !proof.verify_plaintext(signer, &plaintext) {
        return Err(ProtocolError::IntegrityMismatch);
    }
    Ok(plaintext)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_owner_round_trip() {
        let keys = PrincipalKeys::generate();
        let owner = Uuid::new_v4();
        let upload = seal_upload(owner, &keys, "f.bin", b"payload").unwrap();

        assert_eq!(upload.artifact.owner, owner);
        assert_eq!(upload.proof.artifact_id, upload.artifact.id);
        assert_eq!(upload.self_envelope.open_key(&keys.wrap).unwrap(), upload.key);

        let plaintext = open_and_verify(
            &keys.wrap,
            &upload.self_envelope,
            &upload.artifact,
            &upload.proof,
            &keys.sign.public(),
        )
        .unwrap();
        assert_eq!(plaintext, b"payload");
    }

    #[test]
    fn test_grant_requires_owner_key() {
        let owner = PrincipalKeys::generate();
        let other = PrincipalKeys::generate();
        let upload = seal_upload(Uuid::new_v4(), &owner, "f.bin", b"payload").unwrap();

        let result = grant_access(
            &other.wrap,
            &upload.self_envelope,
            &other.wrap.public(),
        );
        assert!(matches!(result, Err(EnvelopeError::Authentication)));
    }

    #[test]
    fn test_wrong_signer_is_integrity_mismatch() {
        let keys = PrincipalKeys::generate();
        let impostor = PrincipalKeys::generate();
        let upload = seal_upload(Uuid::new_v4(), &keys, "f.bin", b"payload").unwrap();

        let result = open_and_verify(
            &keys.wrap,
            &upload.self_envelope,
            &upload.artifact,
            &upload.proof,
            &impostor.sign.public(),
        );
        assert!(matches!(result, Err(ProtocolError::IntegrityMismatch)));
    }

    #[test]
    fn test_proof_for_other_artifact_is_integrity_mismatch() {
        let keys = PrincipalKeys::generate();
        let first = seal_upload(Uuid::new_v4(), &keys, "a", b"same bytes").unwrap();
        let second = seal_upload(Uuid::new_v4(), &keys, "b", b"same bytes").unwrap();

        let result = open_and_verify(
            &keys.wrap,
            &first.self_envelope,
            &first.artifact,
            &second.proof,
            &keys.sign.public(),
        );
        assert!(matches!(result, Err(ProtocolError::IntegrityMismatch)));
    }
}
