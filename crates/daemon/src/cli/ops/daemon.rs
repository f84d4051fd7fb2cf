use std::str::FromStr;

use clap::Args;

use custody_daemon::blobs::BlobStoreConfig;
use custody_daemon::service_config::DEFAULT_MAX_UPLOAD_SIZE;
use custody_daemon::state::{AppState, StateError};
use custody_daemon::{spawn_service, ServiceConfig};

#[derive(Args, Debug, Clone)]
pub struct Daemon {
    /// Override API server port (default from config)
    #[arg(long)]
    pub api_port: Option<u16>,

    /// Directory for log files (default from config, stdout only if unset)
    #[arg(long)]
    pub log_dir: Option<std::path::PathBuf>,

    /// Largest accepted request body in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_SIZE)]
    pub max_upload_size: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("state error: {0}")]
    StateError(#[from] StateError),

    #[error("invalid log level: {0}")]
    InvalidLogLevel(String),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Daemon {
    type Error = DaemonError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = AppState::load(ctx.config_path.clone())?;

        let log_level = tracing::Level::from_str(&state.config.log_level)
            .map_err(|_| DaemonError::InvalidLogLevel(state.config.log_level.clone()))?;

        let config = ServiceConfig {
            api_port: self.api_port.unwrap_or(state.config.api_port),
            max_upload_size: self.max_upload_size,
            sqlite_path: Some(state.db_path),
            blob_store: state
                .config
                .blob_store
                .clone()
                .unwrap_or(BlobStoreConfig::Local {
                    path: state.artifacts_path,
                }),
            log_level,
            log_dir: self.log_dir.clone().or(state.config.log_dir),
        };

        spawn_service(&config).await;
        Ok("daemon ended".to_string())
    }
}
