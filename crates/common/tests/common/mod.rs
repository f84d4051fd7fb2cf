//! Shared test utilities for custody integration tests
#![allow(dead_code)]

use ::common::audit::MemoryAuditLog;
use ::common::crypto::PrincipalKeys;
use ::common::custodian::Custodian;
use ::common::custody::MemoryCustodyStore;
use ::common::principal::Principal;

pub type MemoryCustodian = Custodian<MemoryCustodyStore, MemoryAuditLog>;

/// A registered principal together with the private keys its client holds
pub struct Actor {
    pub principal: Principal,
    pub keys: PrincipalKeys,
}

impl Actor {
    pub fn new(name: &str) -> Self {
        let keys = PrincipalKeys::generate();
        Self {
            principal: Principal::new(name, keys.public()),
            keys,
        }
    }
}

/// Set up a custodian over in-memory providers with an owner and a requester
pub fn setup_test_env() -> (MemoryCustodian, Actor, Actor) {
    let custodian = Custodian::new(MemoryCustodyStore::new(), MemoryAuditLog::new());
    (custodian, Actor::new("alice"), Actor::new("bob"))
}

/// `len` bytes of deterministic, non-repeating looking content
pub fn content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}
