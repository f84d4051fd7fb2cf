use std::path::PathBuf;

use clap::Args;

use common::crypto::{EnvelopeError, KeyEncoding, KeyEnvelope, KeyError, WrapPublicKey};
use common::custodian::protocol::grant_access;
use common::custody::Decision;
use custody_daemon::http_server::api::v0::requests::DecisionRequest;
use custody_daemon::state::StateError;

/// Re-wrap an artifact key for a requester and emit the approval
#[derive(Args, Debug, Clone)]
pub struct Grant {
    /// Your own envelope for the artifact, as served by /api/v0/artifacts/<id>/envelope
    #[arg(long)]
    pub envelope: PathBuf,

    /// The requester's base64 wrapping public key
    #[arg(long)]
    pub recipient: String,

    /// Where to write the decision body (printed when not set)
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum GrantError {
    #[error("state error: {0}")]
    StateError(#[from] StateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid recipient key: {0}")]
    Recipient(#[from] KeyError),

    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Grant {
    type Error = GrantError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.state()?;
        let keys = state.load_keys()?;

        let recipient = WrapPublicKey::from_base64(&self.recipient)?;
        let own: KeyEnvelope =
            serde_json::from_slice(&tokio::fs::read(&self.envelope).await?)?;
        let envelope = grant_access(&keys.wrap, &own, &recipient)?;

        let body = serde_json::to_string_pretty(&DecisionRequest {
            decision: Decision::Approved,
            envelope: Some(envelope.to_record()),
        })?;

        match &self.out {
            Some(out) => {
                tokio::fs::write(out, &body).await?;
                Ok(format!(
                    "Wrapped the artifact key for {}\n  wrote: {}",
                    recipient.to_hex(),
                    out.display()
                ))
            }
            None => Ok(body),
        }
    }
}
