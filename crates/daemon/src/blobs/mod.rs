//! Ciphertext storage for uploaded artifacts.
//!
//! Each artifact's ciphertext is one object at `artifacts/<id>`. Objects are
//! written with [`PutMode::Create`], so an existing artifact is never
//! overwritten.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutMode, PutOptions, PutPayload};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where artifact ciphertexts live
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlobStoreConfig {
    /// Lost on restart; for tests and throwaway instances
    #[default]
    Memory,
    /// A directory on local disk
    Local { path: PathBuf },
}

#[derive(Debug, thiserror::Error)]
pub enum BlobsSetupError {
    #[error("failed to create artifact directory {0}: {1}")]
    CreateDir(PathBuf, io::Error),
    #[error("invalid blob store configuration: {0}")]
    InvalidConfig(object_store::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("artifact {0} is already stored")]
    AlreadyExists(Uuid),
    #[error("object store error: {0}")]
    Store(#[from] object_store::Error),
}

#[derive(Debug, Clone)]
pub struct ArtifactBlobs {
    inner: Arc<dyn ObjectStore>,
}

impl ArtifactBlobs {
    pub async fn new(config: &BlobStoreConfig) -> Result<Self, BlobsSetupError> {
        let inner: Arc<dyn ObjectStore> = match config {
            BlobStoreConfig::Memory => {
                tracing::info!("Using in-memory artifact store");
                Arc::new(InMemory::new())
            }
            BlobStoreConfig::Local { path } => {
                tokio::fs::create_dir_all(path)
                    .await
                    .map_err(|e| BlobsSetupError::CreateDir(path.clone(), e))?;
                tracing::info!(path = %path.display(), "Using local filesystem artifact store");
                Arc::new(
                    LocalFileSystem::new_with_prefix(path)
                        .map_err(BlobsSetupError::InvalidConfig)?,
                )
            }
        };
        Ok(Self { inner })
    }

    fn path(id: Uuid) -> ObjectPath {
        ObjectPath::from(format!("artifacts/{}", id))
    }

    /// Store a ciphertext; fails with [`BlobError::AlreadyExists`] if `id` is taken
    pub async fn put(&self, id: Uuid, ciphertext: &[u8]) -> Result<(), BlobError> {
        let options = PutOptions {
            mode: PutMode::Create,
            ..Default::default()
        };
        match self
            .inner
            .put_opts(&Self::path(id), PutPayload::from(ciphertext.to_vec()), options)
            .await
        {
            Ok(_) => Ok(()),
            Err(object_store::Error::AlreadyExists { .. }) => Err(BlobError::AlreadyExists(id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Read an artifact's ciphertext, `None` if it was never stored
    pub async fn get(&self, id: Uuid) -> Result<Option<Vec<u8>>, BlobError> {
        match self.inner.get(&Self::path(id)).await {
            Ok(result) => Ok(Some(result.bytes().await?.to_vec())),
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a stored ciphertext; used to roll back a failed upload
    pub async fn remove(&self, id: Uuid) -> Result<(), BlobError> {
        match self.inner.delete(&Self::path(id)).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write and delete a marker object, used by the readiness check
    pub async fn check(&self) -> Result<(), BlobError> {
        let marker = ObjectPath::from("readiness");
        self.inner
            .put(&marker, PutPayload::from_static(b"ok"))
            .await?;
        self.inner.delete(&marker).await?;
        Ok(())
    }
}
