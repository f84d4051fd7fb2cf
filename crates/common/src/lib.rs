/**
 * Encrypted artifacts and the signed proofs
 *  that vouch for their plaintext.
 */
pub mod artifact;
/**
 * Append-only, hash-chained record of every
 *  protocol step.
 */
pub mod audit;
/**
 * Orchestration: custody transitions paired with
 *  audit events, plus the client side steps that
 *  hold private keys.
 */
pub mod custodian;
/**
 * Request/approve/reject state machine and the
 *  store it persists through.
 */
pub mod custody;
/**
 * Cryptographic types and operations.
 *  - Wrapping and signing keypairs
 *  - Symmetric artifact encryption
 *  - Key envelopes for a single recipient
 *  - Content digests and signatures
 */
pub mod crypto;
pub mod principal;

pub mod prelude {
    pub use crate::artifact::{EncryptedArtifact, IntegrityProof};
    pub use crate::audit::{AuditAction, AuditEvent, AuditFilter, AuditLog, AuditLogError};
    pub use crate::custodian::{Custodian, CustodianError, Receipt};
    pub use crate::custody::{
        CustodyRequest, CustodyStatus, CustodyStore, CustodyStoreError, Decision, WorkflowError,
    };
    pub use crate::crypto::{
        ContentDigest, EnvelopeError, KeyEncoding, KeyEnvelope, KeyError, PrincipalKeys,
        PublicIdentity, SecretError, SignPrivateKey, SignPublicKey, Signature, SymmetricKey,
        WrapPrivateKey, WrapPublicKey,
    };
    pub use crate::principal::Principal;
}
