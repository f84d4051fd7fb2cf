use clap::Args;

use common::crypto::KeyEncoding;
use custody_daemon::http_server::api::v0::principals::RegisterRequest;
use custody_daemon::state::StateError;

/// Print this principal's registration request (public keys only)
#[derive(Args, Debug, Clone)]
pub struct Keys;

#[derive(Debug, thiserror::Error)]
pub enum KeysError {
    #[error("state error: {0}")]
    StateError(#[from] StateError),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Keys {
    type Error = KeysError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.state()?;
        let public = state.load_keys()?.public();

        let request = RegisterRequest {
            id: Some(state.config.principal_id),
            name: state.config.name.clone(),
            wrap_public_key: public.wrap.to_base64(),
            sign_public_key: public.sign.to_base64(),
        };
        Ok(serde_json::to_string_pretty(&request)?)
    }
}
