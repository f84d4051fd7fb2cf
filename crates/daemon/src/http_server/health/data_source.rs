use std::fmt::Debug;
use std::ops::Deref;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use http::request::Parts;

use crate::blobs::ArtifactBlobs;
use crate::database::Database;
use crate::ServiceState;

#[async_trait]
pub trait DataSource {
    /// Check every dependency a request could touch
    async fn is_ready(&self) -> Result<(), DataSourceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DataSourceError {
    #[error("database unavailable: {0}")]
    Database(String),

    #[error("artifact store unavailable: {0}")]
    ArtifactStore(String),
}

pub type DynDataSource = Arc<dyn DataSource + Send + Sync>;

pub struct StateDataSource(DynDataSource);

impl Debug for StateDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateDataSource").finish()
    }
}

impl StateDataSource {
    #[cfg(test)]
    pub fn new(dds: DynDataSource) -> Self {
        Self(dds)
    }
}

impl Deref for StateDataSource {
    type Target = DynDataSource;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRef<ServiceState> for Database {
    fn from_ref(state: &ServiceState) -> Self {
        state.database().clone()
    }
}

impl FromRef<ServiceState> for ArtifactBlobs {
    fn from_ref(state: &ServiceState) -> Self {
        state.blobs().clone()
    }
}

/// Readiness of the live service: a database round trip and a write to the
/// artifact store
struct ServiceSource {
    db: Database,
    blobs: ArtifactBlobs,
}

#[async_trait]
impl DataSource for ServiceSource {
    async fn is_ready(&self) -> Result<(), DataSourceError> {
        self.db
            .ping()
            .await
            .map_err(|e| DataSourceError::Database(e.to_string()))?;
        self.blobs
            .check()
            .await
            .map_err(|e| DataSourceError::ArtifactStore(e.to_string()))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for StateDataSource
where
    Database: FromRef<S>,
    ArtifactBlobs: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ();

    async fn from_request_parts(_parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(StateDataSource(Arc::new(ServiceSource {
            db: Database::from_ref(state),
            blobs: ArtifactBlobs::from_ref(state),
        })))
    }
}
