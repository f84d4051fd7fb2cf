//! Custody workflow
//!
//! A requester asks for access to an artifact; the owner approves (handing
//! over a [`KeyEnvelope`](crate::crypto::KeyEnvelope) wrapped for the
//! requester) or rejects. The pure state machine lives on
//! [`CustodyRequest`]; [`CustodyStore`] is the persistence boundary that
//! makes each decision atomic.

mod memory;
mod request;
mod store;

pub use memory::{MemoryCustodyStore, MemoryCustodyStoreError};
pub use request::{CustodyRequest, CustodyStatus, Decision, UnknownStatus, WorkflowError};
pub use store::{CustodyStore, CustodyStoreError};
