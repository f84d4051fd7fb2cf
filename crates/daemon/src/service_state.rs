use url::Url;

use common::custodian::Custodian;

use crate::blobs::{ArtifactBlobs, BlobsSetupError};
use crate::database::{Database, DatabaseSetupError};
use crate::service_config::Config;

/// The custodian as the daemon runs it: requests and audit trail both in sqlite
pub type DatabaseCustodian = Custodian<Database, Database>;

/// Main service state, shared by every request handler
#[derive(Clone)]
pub struct State {
    database: Database,
    blobs: ArtifactBlobs,
    custodian: DatabaseCustodian,
}

impl State {
    pub async fn from_config(config: &Config) -> Result<Self, StateSetupError> {
        // 1. Setup database
        let sqlite_database_url = match config.sqlite_path {
            Some(ref path) => {
                // check that the path exists
                if !path.exists() {
                    return Err(StateSetupError::DatabasePathDoesNotExist);
                }
                // parse the path into a URL
                Url::parse(&format!("sqlite://{}", path.display()))
                    .map_err(|_| StateSetupError::InvalidDatabaseUrl)
            }
            // otherwise just set up an in-memory database
            None => Url::parse("sqlite::memory:").map_err(|_| StateSetupError::InvalidDatabaseUrl),
        }?;
        tracing::info!("Database URL: {:?}", sqlite_database_url);
        let database = Database::connect(&sqlite_database_url).await?;

        // 2. Setup ciphertext storage
        let blobs = ArtifactBlobs::new(&config.blob_store).await?;

        // 3. The custodian shares the pool for both of its providers
        let custodian = Custodian::new(database.clone(), database.clone());

        Ok(Self {
            database,
            blobs,
            custodian,
        })
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn blobs(&self) -> &ArtifactBlobs {
        &self.blobs
    }

    pub fn custodian(&self) -> &DatabaseCustodian {
        &self.custodian
    }
}

impl AsRef<Database> for State {
    fn as_ref(&self) -> &Database {
        self.database()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("Database path does not exist")]
    DatabasePathDoesNotExist,
    #[error("Database setup error")]
    DatabaseSetupError(#[from] DatabaseSetupError),
    #[error("Invalid database URL")]
    InvalidDatabaseUrl,
    #[error("Blobs store error: {0}")]
    BlobsSetupError(#[from] BlobsSetupError),
}
