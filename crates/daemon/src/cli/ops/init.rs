use clap::Args;

use custody_daemon::state::{AppConfig, AppState, StateError};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Name this principal registers under
    #[arg(long)]
    pub name: String,

    /// API server port for the daemon
    #[arg(long)]
    pub api_port: Option<u16>,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("state error: {0}")]
    StateError(#[from] StateError),

    #[error("invalid name: {0}")]
    InvalidName(String),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(InitError::InvalidName("name cannot be empty".into()));
        }

        let mut config = AppConfig::new(name);
        if let Some(port) = self.api_port {
            config.api_port = port;
        }
        let state = AppState::init(ctx.config_path.clone(), config)?;

        Ok(format!(
            "Initialized custody directory at {}\n  principal: {} ({})\n  keys:      {}, {}\n\nRun 'custody keys' to print the registration request",
            state.custody_dir.display(),
            state.config.name,
            state.config.principal_id,
            state.wrap_key_path.display(),
            state.sign_key_path.display(),
        ))
    }
}
