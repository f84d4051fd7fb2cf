use std::fmt::{Debug, Display};

use async_trait::async_trait;

use super::event::{verify_chain, AuditEvent, BrokenChain, NewAuditEvent};
use super::filter::AuditFilter;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AuditLogError<T> {
    #[error("unhandled audit log provider error: {0}")]
    Provider(#[from] T),
    #[error("{0}")]
    BrokenChain(BrokenChain),
}

/// Append-only, hash-chained record of every protocol step.
///
/// Implementations assign `seq` and `prev_hash` themselves and must
/// serialize appends, so the chain never forks and no position is ever
/// written twice.
#[async_trait]
pub trait AuditLog: Send + Sync + Debug + Clone + 'static {
    type Error: Display + Debug + Send;

    /// Commit an event at the end of the log
    ///
    /// # Returns
    /// * `Ok(AuditEvent)` - The committed event with its `seq` and hashes
    async fn append(&self, event: NewAuditEvent) -> Result<AuditEvent, AuditLogError<Self::Error>>;

    async fn query(
        &self,
        filter: &AuditFilter,
    ) -> Result<Vec<AuditEvent>, AuditLogError<Self::Error>>;

    /// The whole log in append order
    async fn all(&self) -> Result<Vec<AuditEvent>, AuditLogError<Self::Error>> {
        self.query(&AuditFilter::default()).await
    }

    /// Verify the chain over the whole log
    ///
    /// # Returns
    /// * `Ok(u64)` - The number of events checked
    /// * `Err(AuditLogError::BrokenChain(_))` - The first inconsistency found
    async fn verify(&self) -> Result<u64, AuditLogError<Self::Error>> {
        let events = self.all().await?;
        verify_chain(&events).map_err(AuditLogError::BrokenChain)?;
        Ok(events.len() as u64)
    }
}
