use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use super::request::{CustodyRequest, CustodyStatus, Decision};
use super::store::{CustodyStore, CustodyStoreError};
use crate::crypto::KeyEnvelope;

/// In-memory custody store
///
/// Every decision runs under the write lock, which is what makes the
/// check-and-set on a request's status atomic.
#[derive(Debug, Clone)]
pub struct MemoryCustodyStore {
    inner: Arc<RwLock<MemoryCustodyStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryCustodyStoreInner {
    requests: HashMap<Uuid, CustodyRequest>,
    /// Insertion order, for stable listings
    order: Vec<Uuid>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryCustodyStoreError {
    #[error("memory store error: {0}")]
    Internal(String),
    #[error("request {0} already exists")]
    Duplicate(Uuid),
}

impl MemoryCustodyStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MemoryCustodyStoreInner::default())),
        }
    }

    fn read(
        &self,
    ) -> Result<
        std::sync::RwLockReadGuard<'_, MemoryCustodyStoreInner>,
        CustodyStoreError<MemoryCustodyStoreError>,
    > {
        self.inner.read().map_err(|e| {
            CustodyStoreError::Provider(MemoryCustodyStoreError::Internal(format!(
                "failed to acquire read lock: {}",
                e
            )))
        })
    }

    fn write(
        &self,
    ) -> Result<
        std::sync::RwLockWriteGuard<'_, MemoryCustodyStoreInner>,
        CustodyStoreError<MemoryCustodyStoreError>,
    > {
        self.inner.write().map_err(|e| {
            CustodyStoreError::Provider(MemoryCustodyStoreError::Internal(format!(
                "failed to acquire write lock: {}",
                e
            )))
        })
    }
}

impl Default for MemoryCustodyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CustodyStore for MemoryCustodyStore {
    type Error = MemoryCustodyStoreError;

    async fn insert(&self, request: CustodyRequest) -> Result<(), CustodyStoreError<Self::Error>> {
        let mut inner = self.write()?;
        if inner.requests.contains_key(&request.id) {
            return Err(MemoryCustodyStoreError::Duplicate(request.id).into());
        }
        if inner.requests.values().any(|r| {
            r.status == CustodyStatus::Pending
                && r.artifact_id == request.artifact_id
                && r.requester == request.requester
        }) {
            return Err(CustodyStoreError::DuplicatePending);
        }
        inner.order.push(request.id);
        inner.requests.insert(request.id, request);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<CustodyRequest, CustodyStoreError<Self::Error>> {
        let inner = self.read()?;
        inner
            .requests
            .get(&id)
            .cloned()
            .ok_or(CustodyStoreError::NotFound)
    }

    async fn decide(
        &self,
        id: Uuid,
        actor: Uuid,
        decision: Decision,
        envelope: Option<KeyEnvelope>,
    ) -> Result<CustodyRequest, CustodyStoreError<Self::Error>> {
        let mut inner = self.write()?;
        let stored = inner
            .requests
            .get_mut(&id)
            .ok_or(CustodyStoreError::NotFound)?;

        // Work on a copy so a refused transition leaves the stored request intact
        let mut request = stored.clone();
        request
            .decide(actor, decision, envelope)
            .map_err(CustodyStoreError::Workflow)?;
        *stored = request.clone();
        Ok(request)
    }

    async fn list_by_requester(
        &self,
        requester: Uuid,
    ) -> Result<Vec<CustodyRequest>, CustodyStoreError<Self::Error>> {
        let inner = self.read()?;
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.requests.get(id))
            .filter(|r| r.requester == requester)
            .cloned()
            .collect())
    }

    async fn list_pending_for_owner(
        &self,
        owner: Uuid,
    ) -> Result<Vec<CustodyRequest>, CustodyStoreError<Self::Error>> {
        let inner = self.read()?;
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.requests.get(id))
            .filter(|r| r.owner == owner && r.status == CustodyStatus::Pending)
            .cloned()
            .collect())
    }
}
