use std::path::PathBuf;

use clap::Args;
use serde::Deserialize;
use uuid::Uuid;

use common::artifact::{EncryptedArtifact, IntegrityProof};
use common::crypto::{KeyEncoding, KeyEnvelope, KeyError, SignPublicKey};
use common::custodian::protocol::{open_and_verify, open_artifact, ProtocolError};
use custody_daemon::http_server::api::v0::artifacts::{
    ArtifactResponse, ContentResponse, UploadRequest,
};
use custody_daemon::state::StateError;

/// Decrypt an artifact with an envelope addressed to this principal
#[derive(Args, Debug, Clone)]
pub struct Open {
    /// Artifact file: a download from /api/v0/artifacts/<id>/content or a
    /// local seal output
    pub path: PathBuf,

    /// Envelope for this principal (defaults to the one inside a seal output)
    #[arg(long)]
    pub envelope: Option<PathBuf>,

    /// Integrity proof, or the artifact metadata from /api/v0/artifacts/<id>
    #[arg(long)]
    pub proof: Option<PathBuf>,

    /// The owner's base64 signing public key (defaults to your own)
    #[arg(long)]
    pub signer: Option<String>,

    /// Where to write the plaintext
    #[arg(long)]
    pub out: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("state error: {0}")]
    StateError(#[from] StateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid signer key: {0}")]
    Signer(#[from] KeyError),

    #[error("invalid artifact file: {0}")]
    InvalidFile(String),

    #[error("no envelope given; pass --envelope")]
    MissingEnvelope,

    #[error("{0}")]
    Protocol(#[from] ProtocolError),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ArtifactFile {
    Upload(UploadRequest),
    Content(ContentResponse),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ProofFile {
    Metadata(ArtifactResponse),
    Proof(IntegrityProof),
}

async fn read_json<T: for<'de> Deserialize<'de>>(path: &PathBuf) -> Result<T, OpenError> {
    Ok(serde_json::from_slice(&tokio::fs::read(path).await?)?)
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Open {
    type Error = OpenError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.state()?;
        let keys = state.load_keys()?;

        // A seal output carries its own envelope and proof
        let (artifact, embedded): (EncryptedArtifact, Option<(IntegrityProof, KeyEnvelope)>) =
            match read_json::<ArtifactFile>(&self.path).await? {
                ArtifactFile::Upload(upload) => {
                    let id = upload.id.unwrap_or_else(Uuid::nil);
                    let (artifact, proof, envelope) = upload
                        .decode(id, state.config.principal_id)
                        .map_err(|e| OpenError::InvalidFile(e.to_string()))?;
                    (artifact, Some((proof, envelope)))
                }
                ArtifactFile::Content(content) => {
                    let artifact = content
                        .into_artifact()
                        .map_err(|e| OpenError::InvalidFile(e.to_string()))?;
                    (artifact, None)
                }
            };
        let (embedded_proof, embedded_envelope) = embedded.unzip();

        let envelope = match &self.envelope {
            Some(path) => read_json::<KeyEnvelope>(path).await?,
            None => embedded_envelope.ok_or(OpenError::MissingEnvelope)?,
        };
        let proof = match &self.proof {
            Some(path) => Some(match read_json::<ProofFile>(path).await? {
                ProofFile::Metadata(metadata) => metadata.proof,
                ProofFile::Proof(proof) => proof,
            }),
            None => embedded_proof,
        };
        let signer = match &self.signer {
            Some(key) => SignPublicKey::from_base64(key)?,
            None => keys.sign.public(),
        };

        let plaintext = match &proof {
            Some(proof) => open_and_verify(&keys.wrap, &envelope, &artifact, proof, &signer)?,
            None => open_artifact(&keys.wrap, &envelope, &artifact)?,
        };
        tokio::fs::write(&self.out, &plaintext).await?;

        Ok(format!(
            "Opened artifact {} '{}' ({} bytes{})\n  wrote: {}",
            artifact.id,
            artifact.name,
            plaintext.len(),
            if proof.is_some() { ", integrity verified" } else { ", integrity NOT checked" },
            self.out.display()
        ))
    }
}
