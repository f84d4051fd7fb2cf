//! Orchestration of the custody protocol
//!
//! [`Custodian`] ties the custody store and the audit log together so that
//! every state change is followed by exactly one audit event. The
//! [`protocol`] module holds the client side steps, the ones that need a
//! principal's private keys.

pub mod protocol;

use serde_json::json;
use uuid::Uuid;

use crate::artifact::{EncryptedArtifact, IntegrityProof};
use crate::audit::{AuditAction, AuditEvent, AuditLog, NewAuditEvent};
use crate::crypto::KeyEnvelope;
use crate::custody::{CustodyRequest, CustodyStore, CustodyStoreError, Decision};
use crate::principal::Principal;

#[derive(thiserror::Error, Debug)]
pub enum CustodianError<T> {
    #[error(transparent)]
    Store(#[from] CustodyStoreError<T>),
    /// The proof does not belong to this artifact or does not verify under
    /// the uploader's signing key
    #[error("integrity proof does not verify for this artifact and owner")]
    InvalidProof,
    /// Owners hold their own artifact key already
    #[error("owners already hold the key to their own artifacts")]
    OwnArtifact,
}

/// Outcome of a state change plus the audit event that recorded it.
///
/// `audit` is `None` when the event could not be written; the state change
/// itself stands regardless.
#[derive(Debug, Clone)]
pub struct Receipt<T> {
    pub value: T,
    pub audit: Option<AuditEvent>,
}

/// Server side of the protocol, over injected store and log handles
#[derive(Debug, Clone)]
pub struct Custodian<S, A> {
    store: S,
    audit: A,
}

impl<S, A> Custodian<S, A>
where
    S: CustodyStore,
    A: AuditLog,
{
    pub fn new(store: S, audit: A) -> Self {
        Self { store, audit }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn audit_log(&self) -> &A {
        &self.audit
    }

    async fn record(&self, event: NewAuditEvent) -> Option<AuditEvent> {
        let action = event.action;
        match self.audit.append(event).await {
            Ok(committed) => {
                tracing::debug!("audit: {} recorded at seq {}", action, committed.seq);
                Some(committed)
            }
            Err(e) => {
                tracing::error!("failed to append {} audit event: {}", action, e);
                None
            }
        }
    }

    /// Check an upload's proof against its owner and record it
    pub async fn record_upload(
        &self,
        owner: &Principal,
        artifact: &EncryptedArtifact,
        proof: &IntegrityProof,
    ) -> Result<Receipt<()>, CustodianError<S::Error>> {
        if artifact.owner != owner.id
            || proof.artifact_id != artifact.id
            || proof.signer != owner.id
            || !proof.verify(owner.sign_key())
        {
            tracing::warn!(
                "rejecting upload of {} by {}: proof does not verify",
                artifact.id,
                owner.id
            );
            return Err(CustodianError::InvalidProof);
        }

        let audit = self
            .record(NewAuditEvent {
                action: AuditAction::Upload,
                actor: owner.id,
                actor_name: owner.name.clone(),
                subject: artifact.id,
                payload: json!({
                    "name": artifact.name,
                    "digest": proof.digest.to_hex(),
                    "size": artifact.ciphertext.len(),
                }),
            })
            .await;
        Ok(Receipt { value: (), audit })
    }

    /// Open a pending request from `requester` for `owner_id`'s artifact.
    ///
    /// The custodian does not see artifact metadata, so `owner_id` must be
    /// the owner recorded for `artifact_id`; callers look it up. The owner
    /// cannot request their own artifact, and a requester has at most one
    /// pending request per artifact.
    pub async fn submit_request(
        &self,
        requester: &Principal,
        owner_id: Uuid,
        artifact_id: Uuid,
    ) -> Result<Receipt<CustodyRequest>, CustodianError<S::Error>> {
        if requester.id == owner_id {
            return Err(CustodianError::OwnArtifact);
        }
        let request = CustodyRequest::new(artifact_id, requester.id, owner_id);
        self.store.insert(request.clone()).await?;
        tracing::info!(
            "request {} submitted by {} for artifact {}",
            request.id,
            requester.id,
            artifact_id
        );

        let audit = self
            .record(NewAuditEvent {
                action: AuditAction::RequestSubmit,
                actor: requester.id,
                actor_name: requester.name.clone(),
                subject: artifact_id,
                payload: json!({
                    "request_id": request.id,
                    "owner": owner_id,
                }),
            })
            .await;
        Ok(Receipt {
            value: request,
            audit,
        })
    }

    /// Apply `actor`'s decision to a pending request
    pub async fn decide(
        &self,
        actor: &Principal,
        request_id: Uuid,
        decision: Decision,
        envelope: Option<KeyEnvelope>,
    ) -> Result<Receipt<CustodyRequest>, CustodianError<S::Error>> {
        let request = self
            .store
            .decide(request_id, actor.id, decision, envelope)
            .await?;
        tracing::info!("request {} {} by {}", request.id, request.status, actor.id);

        let action = match decision {
            Decision::Approved => AuditAction::RequestApprove,
            Decision::Rejected => AuditAction::RequestReject,
        };
        let audit = self
            .record(NewAuditEvent {
                action,
                actor: actor.id,
                actor_name: actor.name.clone(),
                subject: request.artifact_id,
                payload: json!({
                    "request_id": request.id,
                    "requester": request.requester,
                }),
            })
            .await;
        Ok(Receipt {
            value: request,
            audit,
        })
    }
}
