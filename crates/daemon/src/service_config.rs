use std::path::PathBuf;

use crate::blobs::BlobStoreConfig;

/// Default cap on request bodies; uploads carry base64 ciphertext in JSON
pub const DEFAULT_MAX_UPLOAD_SIZE: usize = 100 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    // http server configuration
    /// Port for the API HTTP server
    pub api_port: u16,
    /// Largest request body the API accepts, in bytes
    pub max_upload_size: usize,

    // data store configuration
    /// a path to a sqlite database, if not set then an
    ///  in-memory database will be used
    pub sqlite_path: Option<PathBuf>,
    /// Backend holding artifact ciphertexts
    pub blob_store: BlobStoreConfig,

    // logging
    pub log_level: tracing::Level,
    /// Directory for log files (optional, logs to stdout only if not set)
    pub log_dir: Option<PathBuf>,
}

impl Config {
    /// A config over an in-memory database and an in-memory blob store
    pub fn ephemeral() -> Self {
        Self {
            api_port: 0,
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            sqlite_path: None,
            blob_store: BlobStoreConfig::Memory,
            log_level: tracing::Level::INFO,
            log_dir: None,
        }
    }
}
