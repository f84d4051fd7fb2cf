//! # Principals
//!
//! A principal is an identity that can own artifacts, request access to
//! them and decide on requests. The server only ever knows its
//! [`PublicIdentity`]; the matching [`PrincipalKeys`](crate::crypto::PrincipalKeys)
//! stay with the principal's client.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::{PublicIdentity, SignPublicKey, WrapPublicKey};

/// A registered principal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub name: String,
    pub keys: PublicIdentity,
}

impl Principal {
    pub fn new(name: impl Into<String>, keys: PublicIdentity) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            keys,
        }
    }

    /// Key that envelopes for this principal are addressed to
    pub fn wrap_key(&self) -> &WrapPublicKey {
        &self.keys.wrap
    }

    /// Key that verifies this principal's integrity proofs
    pub fn sign_key(&self) -> &SignPublicKey {
        &self.keys.sign
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}
