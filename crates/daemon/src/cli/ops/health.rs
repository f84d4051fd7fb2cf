use clap::Args;

use custody_daemon::state::{
    AppState, ARTIFACTS_DIR_NAME, DB_FILE_NAME, SIGN_KEY_FILE_NAME, WRAP_KEY_FILE_NAME,
};

/// Check the local custody directory
#[derive(Args, Debug, Clone)]
pub struct Health;

#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error("Health check failed: {0}")]
    Failed(String),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Health {
    type Error = HealthError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut lines = Vec::new();

        lines.push("Config:".to_string());
        let state = match AppState::load(ctx.config_path.clone()) {
            Ok(state) => state,
            Err(e) => {
                lines.push(format!("  error: {}", e));
                return Err(HealthError::Failed(lines.join("\n")));
            }
        };

        lines.push(format!("  directory:   {}", state.custody_dir.display()));
        lines.push("  config.toml: OK".to_string());
        lines.push(format!("  {}:   OK", DB_FILE_NAME));
        lines.push(format!("  {}/:  OK", ARTIFACTS_DIR_NAME));
        lines.push(format!(
            "  principal:   {} ({})",
            state.config.name, state.config.principal_id
        ));
        lines.push(format!("  api_port:    {}", state.config.api_port));

        lines.push(String::new());
        lines.push("Keys:".to_string());
        match state.load_keys() {
            Ok(keys) => {
                let public = keys.public();
                lines.push(format!("  {}:    OK ({})", WRAP_KEY_FILE_NAME, public.wrap.to_hex()));
                lines.push(format!("  {}:    OK ({})", SIGN_KEY_FILE_NAME, public.sign.to_hex()));
            }
            Err(e) => {
                lines.push(format!("  error: {}", e));
                return Err(HealthError::Failed(lines.join("\n")));
            }
        }

        Ok(lines.join("\n"))
    }
}
