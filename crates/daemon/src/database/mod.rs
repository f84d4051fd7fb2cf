mod artifact_queries;
pub mod audit_log;
pub mod custody_store;
mod principal_queries;
mod sqlite;
pub mod types;

use std::ops::Deref;
use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::Mutex;

pub use artifact_queries::ArtifactRecord;

#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
    // Audit appends read the tip and write the next position; only one may
    //  be in flight per process.
    audit_lock: Arc<Mutex<()>>,
}

impl Database {
    pub async fn connect(database_url: &url::Url) -> Result<Self, DatabaseSetupError> {
        if database_url.scheme() == "sqlite" {
            let db = sqlite::connect_sqlite(database_url).await?;
            sqlite::migrate_sqlite(&db).await?;
            return Ok(Database::new(db));
        }

        Err(DatabaseSetupError::UnknownDbType(
            database_url.scheme().to_string(),
        ))
    }

    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            audit_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Round trip to the database, used by the readiness check
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

impl Deref for Database {
    type Target = SqlitePool;

    fn deref(&self) -> &Self::Target {
        &self.pool
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DatabaseSetupError {
    #[error("error occurred while attempting database migration: {0}")]
    MigrationFailed(sqlx::migrate::MigrateError),

    #[error("unable to perform initial connection and check of the database: {0}")]
    Unavailable(sqlx::Error),

    #[error("requested database type was not recognized: {0}")]
    UnknownDbType(String),
}

/// Wrap a domain decoding failure as a sqlx column decode error
pub(crate) fn decode_error<E>(err: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::Decode(Box::new(err))
}
