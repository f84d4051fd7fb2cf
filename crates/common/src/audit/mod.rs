//! Append-only audit log
//!
//! Every state change of the protocol (uploads, request submissions and
//! decisions) leaves exactly one [`AuditEvent`]. Events are hash chained:
//!
//! ```text
//! hash = SHA-256(prev_hash || seq || timestamp_nanos || action || actor
//!                || actor_name || subject || payload_json)
//! ```
//!
//! with the first event pointing at 32 zero bytes. Editing, dropping or
//! reordering a committed event breaks the chain and is reported by
//! [`verify_chain`].

mod event;
mod filter;
mod log;
mod memory;

pub use event::{
    verify_chain, AuditAction, AuditEvent, BrokenChain, ChainHash, ChainHashError,
    NewAuditEvent, UnknownAction, CHAIN_HASH_SIZE,
};
pub use filter::AuditFilter;
pub use log::{AuditLog, AuditLogError};
pub use memory::{MemoryAuditLog, MemoryAuditLogError};
