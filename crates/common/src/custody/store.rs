use std::fmt::{Debug, Display};

use async_trait::async_trait;
use uuid::Uuid;

use super::request::{CustodyRequest, Decision, WorkflowError};
use crate::crypto::KeyEnvelope;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CustodyStoreError<T> {
    #[error("unhandled custody store provider error: {0}")]
    Provider(#[from] T),
    #[error("custody request not found")]
    NotFound,
    /// The requester already has a pending request for this artifact
    #[error("a pending request for this artifact already exists")]
    DuplicatePending,
    /// The state machine refused the transition
    #[error("{0}")]
    Workflow(WorkflowError),
}

/// Persistence boundary for custody requests.
///
/// Implementations must make [`decide`](CustodyStore::decide) atomic per
/// request: when two decisions race on the same pending request exactly one
/// of them is applied and the other observes
/// [`WorkflowError::AlreadyDecided`].
#[async_trait]
pub trait CustodyStore: Send + Sync + Debug + Clone + 'static {
    type Error: Display + Debug + Send;

    /// Store a newly created request. At most one request per
    /// (artifact, requester) may be pending; a second is refused with
    /// [`CustodyStoreError::DuplicatePending`].
    async fn insert(&self, request: CustodyRequest) -> Result<(), CustodyStoreError<Self::Error>>;

    async fn get(&self, id: Uuid) -> Result<CustodyRequest, CustodyStoreError<Self::Error>>;

    /// Run [`CustodyRequest::decide`] against the stored request and persist
    /// the result
    ///
    /// # Returns
    /// * `Ok(CustodyRequest)` - The request in its new terminal state
    /// * `Err(CustodyStoreError::Workflow(_))` - The transition was refused; nothing was written
    async fn decide(
        &self,
        id: Uuid,
        actor: Uuid,
        decision: Decision,
        envelope: Option<KeyEnvelope>,
    ) -> Result<CustodyRequest, CustodyStoreError<Self::Error>>;

    /// Requests made by `requester`, oldest first
    async fn list_by_requester(
        &self,
        requester: Uuid,
    ) -> Result<Vec<CustodyRequest>, CustodyStoreError<Self::Error>>;

    /// Pending requests awaiting a decision from `owner`, oldest first
    async fn list_pending_for_owner(
        &self,
        owner: Uuid,
    ) -> Result<Vec<CustodyRequest>, CustodyStoreError<Self::Error>>;
}
