use std::path::PathBuf;

use clap::Args;

use common::custodian::protocol::{seal_upload, ProtocolError};
use custody_daemon::http_server::api::v0::artifacts::UploadRequest;
use custody_daemon::http_server::PRINCIPAL_HEADER;
use custody_daemon::state::StateError;

/// Encrypt a file for upload
#[derive(Args, Debug, Clone)]
pub struct Seal {
    /// File to encrypt
    pub path: PathBuf,

    /// Name to upload under (defaults to the file name)
    #[arg(long)]
    pub name: Option<String>,

    /// Where to write the upload request (defaults to <path>.custody.json)
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum SealError {
    #[error("state error: {0}")]
    StateError(#[from] StateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot derive a name from {0}, pass --name")]
    NoName(PathBuf),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Seal {
    type Error = SealError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.state()?;
        let keys = state.load_keys()?;

        let name = match &self.name {
            Some(name) => name.clone(),
            None => self
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| SealError::NoName(self.path.clone()))?,
        };
        let plaintext = tokio::fs::read(&self.path).await?;

        let upload = seal_upload(state.config.principal_id, &keys, name, &plaintext)?;
        let request = UploadRequest::from_sealed(&upload);

        let out = self.out.clone().unwrap_or_else(|| {
            let mut name = self.path.clone().into_os_string();
            name.push(".custody.json");
            PathBuf::from(name)
        });
        tokio::fs::write(&out, serde_json::to_vec_pretty(&request)?).await?;

        Ok(format!(
            "Sealed {} as artifact {}\n  digest: {}\n  wrote:  {}\n\nPOST it to /api/v0/artifacts with {}: {}",
            self.path.display(),
            upload.artifact.id,
            upload.proof.digest,
            out.display(),
            PRINCIPAL_HEADER,
            state.config.principal_id,
        ))
    }
}
