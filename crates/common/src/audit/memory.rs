use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use time::OffsetDateTime;

use super::event::{AuditEvent, ChainHash, NewAuditEvent};
use super::filter::AuditFilter;
use super::log::{AuditLog, AuditLogError};

/// In-memory audit log
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditLog {
    inner: Arc<RwLock<Vec<AuditEvent>>>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryAuditLogError {
    #[error("memory audit log error: {0}")]
    Internal(String),
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct access to the stored events, for simulating tampering
    #[cfg(test)]
    pub(crate) fn events_mut(&self) -> std::sync::RwLockWriteGuard<'_, Vec<AuditEvent>> {
        self.inner.write().unwrap()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    type Error = MemoryAuditLogError;

    async fn append(&self, event: NewAuditEvent) -> Result<AuditEvent, AuditLogError<Self::Error>> {
        let mut events = self.inner.write().map_err(|e| {
            AuditLogError::Provider(MemoryAuditLogError::Internal(format!(
                "failed to acquire write lock: {}",
                e
            )))
        })?;

        let (prev_hash, seq) = match events.last() {
            Some(last) => (last.hash, last.seq + 1),
            None => (ChainHash::GENESIS, 1),
        };
        // Keep timestamps monotone in seq order even if the wall clock steps back
        let now = OffsetDateTime::now_utc();
        let timestamp = events.last().map_or(now, |last| now.max(last.timestamp));

        let committed = AuditEvent::chain(prev_hash, seq, timestamp, event);
        events.push(committed.clone());
        Ok(committed)
    }

    async fn query(
        &self,
        filter: &AuditFilter,
    ) -> Result<Vec<AuditEvent>, AuditLogError<Self::Error>> {
        let events = self.inner.read().map_err(|e| {
            AuditLogError::Provider(MemoryAuditLogError::Internal(format!(
                "failed to acquire read lock: {}",
                e
            )))
        })?;
        Ok(filter.apply(events.iter()))
    }
}
