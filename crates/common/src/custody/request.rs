use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::crypto::KeyEnvelope;

/// Lifecycle state of a [`CustodyRequest`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustodyStatus {
    Pending,
    Approved,
    Rejected,
}

impl CustodyStatus {
    /// Approved and rejected requests never change again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CustodyStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CustodyStatus::Pending => "pending",
            CustodyStatus::Approved => "approved",
            CustodyStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for CustodyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown custody status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for CustodyStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CustodyStatus::Pending),
            "approved" => Ok(CustodyStatus::Approved),
            "rejected" => Ok(CustodyStatus::Rejected),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// An owner's answer to a pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub fn status(&self) -> CustodyStatus {
        match self {
            Decision::Approved => CustodyStatus::Approved,
            Decision::Rejected => CustodyStatus::Rejected,
        }
    }
}

/// Ways a decision can be refused by the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("request has already been decided")]
    AlreadyDecided,
    #[error("approval requires a key envelope for the requester")]
    MissingEnvelope,
    #[error("a rejection must not carry a key envelope")]
    UnexpectedEnvelope,
    #[error("only the artifact owner may decide this request")]
    NotOwner,
}

/// A requester's ask for access to someone else's artifact
///
/// Created `Pending` by the requester; only the owner moves it to a
/// terminal state, and the envelope is attached in the same step as the
/// approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyRequest {
    pub id: Uuid,
    pub artifact_id: Uuid,
    pub requester: Uuid,
    pub owner: Uuid,
    pub status: CustodyStatus,
    pub envelope: Option<KeyEnvelope>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl CustodyRequest {
    pub fn new(artifact_id: Uuid, requester: Uuid, owner: Uuid) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            artifact_id,
            requester,
            owner,
            status: CustodyStatus::Pending,
            envelope: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply an owner's decision.
    ///
    /// Checks run in a fixed order: ownership, terminality, then the
    /// envelope shape. On error the request is left untouched.
    pub fn decide(
        &mut self,
        actor: Uuid,
        decision: Decision,
        envelope: Option<KeyEnvelope>,
    ) -> Result<(), WorkflowError> {
        if actor != self.owner {
            return Err(WorkflowError::NotOwner);
        }
        if self.status.is_terminal() {
            return Err(WorkflowError::AlreadyDecided);
        }
        match (decision, envelope.is_some()) {
            (Decision::Approved, false) => return Err(WorkflowError::MissingEnvelope),
            (Decision::Rejected, true) => return Err(WorkflowError::UnexpectedEnvelope),
            _ => {}
        }

        self.status = decision.status();
        self.envelope = envelope;
        self.updated_at = OffsetDateTime::now_utc().max(self.created_at);
        Ok(())
    }
}
