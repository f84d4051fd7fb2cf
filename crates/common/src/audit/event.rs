use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

/// Size of a chain hash in bytes
pub const CHAIN_HASH_SIZE: usize = 32;

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Upload,
    RequestSubmit,
    RequestApprove,
    RequestReject,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Upload => "upload",
            AuditAction::RequestSubmit => "request_submit",
            AuditAction::RequestApprove => "request_approve",
            AuditAction::RequestReject => "request_reject",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown audit action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for AuditAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload" => Ok(AuditAction::Upload),
            "request_submit" => Ok(AuditAction::RequestSubmit),
            "request_approve" => Ok(AuditAction::RequestApprove),
            "request_reject" => Ok(AuditAction::RequestReject),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

/// SHA-256 link in the audit chain
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChainHash([u8; CHAIN_HASH_SIZE]);

impl ChainHash {
    /// `prev_hash` of the first event
    pub const GENESIS: ChainHash = ChainHash([0u8; CHAIN_HASH_SIZE]);

    pub fn as_bytes(&self) -> &[u8; CHAIN_HASH_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, ChainHashError> {
        let bytes = hex::decode(hex_str).map_err(|e| ChainHashError(e.to_string()))?;
        let bytes: [u8; CHAIN_HASH_SIZE] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| ChainHashError(format!("expected 32 bytes, got {}", v.len())))?;
        Ok(Self(bytes))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid chain hash: {0}")]
pub struct ChainHashError(String);

impl fmt::Display for ChainHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ChainHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainHash({})", self.to_hex())
    }
}

impl Serialize for ChainHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ChainHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        ChainHash::from_hex(&text).map_err(serde::de::Error::custom)
    }
}

/// An event as submitted by the caller, before the log assigns its position
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEvent {
    pub action: AuditAction,
    pub actor: Uuid,
    pub actor_name: String,
    /// The artifact the event is about
    pub subject: Uuid,
    pub payload: serde_json::Value,
}

/// A committed entry of the audit log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// 1-based append position, the source of truth for ordering
    pub seq: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub action: AuditAction,
    pub actor: Uuid,
    pub actor_name: String,
    pub subject: Uuid,
    pub payload: serde_json::Value,
    pub prev_hash: ChainHash,
    pub hash: ChainHash,
}

fn put_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

#[allow(clippy::too_many_arguments)]
fn chain_hash(
    prev_hash: &ChainHash,
    seq: u64,
    timestamp: OffsetDateTime,
    action: AuditAction,
    actor: &Uuid,
    actor_name: &str,
    subject: &Uuid,
    payload: &serde_json::Value,
) -> ChainHash {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(seq.to_be_bytes());
    hasher.update(timestamp.unix_timestamp_nanos().to_be_bytes());
    // Variable length fields are length prefixed so no two events share an encoding
    put_field(&mut hasher, action.as_str().as_bytes());
    hasher.update(actor.as_bytes());
    put_field(&mut hasher, actor_name.as_bytes());
    hasher.update(subject.as_bytes());
    put_field(&mut hasher, payload.to_string().as_bytes());
    ChainHash(hasher.finalize().into())
}

impl AuditEvent {
    /// Place `event` after `prev_hash` at position `seq`
    pub fn chain(
        prev_hash: ChainHash,
        seq: u64,
        timestamp: OffsetDateTime,
        event: NewAuditEvent,
    ) -> Self {
        let hash = chain_hash(
            &prev_hash,
            seq,
            timestamp,
            event.action,
            &event.actor,
            &event.actor_name,
            &event.subject,
            &event.payload,
        );
        Self {
            seq,
            timestamp,
            action: event.action,
            actor: event.actor,
            actor_name: event.actor_name,
            subject: event.subject,
            payload: event.payload,
            prev_hash,
            hash,
        }
    }

    /// Recompute this event's hash from its contents
    pub fn expected_hash(&self) -> ChainHash {
        chain_hash(
            &self.prev_hash,
            self.seq,
            self.timestamp,
            self.action,
            &self.actor,
            &self.actor_name,
            &self.subject,
            &self.payload,
        )
    }
}

/// Where and why a chain stopped verifying
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("audit chain broken at seq {seq}: {reason}")]
pub struct BrokenChain {
    pub seq: u64,
    pub reason: &'static str,
}

/// Verify a complete log, oldest first.
///
/// Checks that sequence numbers run 1, 2, 3.. without gaps, that every
/// event points at its predecessor's hash (the first at
/// [`ChainHash::GENESIS`]) and that every hash matches the event contents.
pub fn verify_chain(events: &[AuditEvent]) -> Result<(), BrokenChain> {
    let mut prev = ChainHash::GENESIS;
    for (i, event) in events.iter().enumerate() {
        let expected_seq = i as u64 + 1;
        if event.seq != expected_seq {
            return Err(BrokenChain {
                seq: expected_seq,
                reason: "sequence gap or reordering",
            });
        }
        if event.prev_hash != prev {
            return Err(BrokenChain {
                seq: event.seq,
                reason: "prev_hash does not match the preceding event",
            });
        }
        if event.expected_hash() != event.hash {
            return Err(BrokenChain {
                seq: event.seq,
                reason: "hash does not match event contents",
            });
        }
        prev = event.hash;
    }
    Ok(())
}
