use axum::extract::{Json, Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use common::artifact::{EncryptedArtifact, IntegrityProof};
use common::crypto::{
    ContentDigest, EnvelopeRecord, KeyEnvelope, Signature, NONCE_SIZE, TAG_SIZE,
};
use common::custodian::protocol::SealedUpload;

use super::{ApiError, Caller};
use crate::database::ArtifactRecord;
use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/", get(list_handler).post(upload_handler))
        .route("/:id", get(get_handler))
        .route("/:id/content", get(content_handler))
        .route("/:id/envelope", get(envelope_handler))
        .with_state(state)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRequest {
    /// Client chosen id, as signed into the proof; assigned when absent
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    /// base64, 12 bytes
    pub nonce: String,
    /// base64 ciphertext with the tag appended
    pub ciphertext: String,
    /// The artifact key wrapped for the uploader
    pub envelope: EnvelopeRecord,
    /// hex SHA-256 of the plaintext
    pub digest: String,
    /// base64 Ed25519 signature over the digest
    pub signature: String,
}

impl UploadRequest {
    /// The request a client sends for a freshly sealed upload
    pub fn from_sealed(upload: &SealedUpload) -> Self {
        Self {
            id: Some(upload.artifact.id),
            name: upload.artifact.name.clone(),
            nonce: BASE64.encode(upload.artifact.nonce),
            ciphertext: BASE64.encode(&upload.artifact.ciphertext),
            envelope: upload.self_envelope.to_record(),
            digest: upload.proof.digest.to_hex(),
            signature: upload.proof.signature.to_base64(),
        }
    }

    /// Decode into the artifact, its proof and the owner's envelope, with
    /// `id` and `owner` filled in by the receiver
    pub fn decode(
        &self,
        id: Uuid,
        owner: Uuid,
    ) -> Result<(EncryptedArtifact, IntegrityProof, KeyEnvelope), ApiError> {
        let nonce = decode_nonce(&self.nonce)?;
        let ciphertext = decode_base64("ciphertext", &self.ciphertext)?;
        if ciphertext.len() < TAG_SIZE {
            return Err(ApiError::BadRequest(format!(
                "ciphertext must be at least {} bytes",
                TAG_SIZE
            )));
        }
        let envelope = KeyEnvelope::from_record(&self.envelope)?;
        let digest = ContentDigest::from_hex(self.digest.trim())?;
        let signature = Signature::from_base64(&self.signature)?;

        let artifact = EncryptedArtifact {
            id,
            owner,
            name: self.name.trim().to_string(),
            nonce,
            ciphertext,
        };
        let proof = IntegrityProof {
            artifact_id: id,
            signer: owner,
            digest,
            signature,
        };
        Ok((artifact, proof, envelope))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactResponse {
    pub id: Uuid,
    pub owner: Uuid,
    pub name: String,
    pub size: u64,
    pub proof: IntegrityProof,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<ArtifactRecord> for ArtifactResponse {
    fn from(record: ArtifactRecord) -> Self {
        Self {
            id: record.id,
            owner: record.owner,
            name: record.name,
            size: record.size,
            proof: record.proof,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentResponse {
    pub id: Uuid,
    pub owner: Uuid,
    pub name: String,
    pub nonce: String,
    pub ciphertext: String,
}

impl ContentResponse {
    /// Rebuild the artifact this response describes
    pub fn into_artifact(self) -> Result<EncryptedArtifact, ApiError> {
        Ok(EncryptedArtifact {
            id: self.id,
            owner: self.owner,
            name: self.name,
            nonce: decode_nonce(&self.nonce)?,
            ciphertext: decode_base64("ciphertext", &self.ciphertext)?,
        })
    }
}

fn decode_base64(field: &str, text: &str) -> Result<Vec<u8>, ApiError> {
    BASE64
        .decode(text.trim())
        .map_err(|e| ApiError::BadRequest(format!("{} is not valid base64: {}", field, e)))
}

fn decode_nonce(text: &str) -> Result<[u8; NONCE_SIZE], ApiError> {
    let bytes = decode_base64("nonce", text)?;
    <[u8; NONCE_SIZE]>::try_from(bytes.as_slice()).map_err(|_| {
        ApiError::BadRequest(format!(
            "nonce must be {} bytes, got {}",
            NONCE_SIZE,
            bytes.len()
        ))
    })
}

pub async fn upload_handler(
    State(state): State<ServiceState>,
    Caller(owner): Caller,
    Json(req): Json<UploadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("name cannot be empty".into()));
    }

    let id = req.id.unwrap_or_else(Uuid::new_v4);
    let (artifact, proof, envelope) = req.decode(id, owner.id)?;
    if state.database().get_artifact(id).await?.is_some() {
        return Err(ApiError::Conflict(format!("artifact {} already exists", id)));
    }

    // Nothing is stored for a proof the owner's key does not vouch for
    if !proof.verify(owner.sign_key()) {
        return Err(ApiError::Unprocessable(
            "integrity proof does not verify under the uploader's signing key".into(),
        ));
    }

    state
        .blobs()
        .put(id, &artifact.ciphertext)
        .await?;
    if let Err(e) = state
        .database()
        .insert_artifact(&artifact, &proof, &envelope)
        .await
    {
        if let Err(cleanup) = state.blobs().remove(id).await {
            tracing::warn!("failed to remove ciphertext of {}: {}", id, cleanup);
        }
        return Err(e.into());
    }

    state
        .custodian()
        .record_upload(&owner, &artifact, &proof)
        .await?;
    tracing::info!(
        "artifact {} '{}' uploaded by {} ({} bytes)",
        id,
        artifact.name,
        owner,
        artifact.ciphertext.len()
    );

    let record = state
        .database()
        .get_artifact(id)
        .await?
        .ok_or_else(|| ApiError::Internal(format!("artifact {} vanished after upload", id)))?;
    Ok((
        http::StatusCode::CREATED,
        Json(ArtifactResponse::from(record)),
    )
        .into_response())
}

pub async fn list_handler(
    State(state): State<ServiceState>,
    _caller: Caller,
) -> Result<Response, ApiError> {
    let artifacts: Vec<ArtifactResponse> = state
        .database()
        .list_artifacts()
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok((http::StatusCode::OK, Json(artifacts)).into_response())
}

async fn load_artifact(state: &ServiceState, id: Uuid) -> Result<ArtifactRecord, ApiError> {
    state
        .database()
        .get_artifact(id)
        .await?
        .ok_or_else(|| ApiError::not_found("artifact", id))
}

pub async fn get_handler(
    State(state): State<ServiceState>,
    _caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let record = load_artifact(&state, id).await?;
    Ok((http::StatusCode::OK, Json(ArtifactResponse::from(record))).into_response())
}

/// Ciphertext download, limited to principals holding an envelope for it
pub async fn content_handler(
    State(state): State<ServiceState>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let record = load_artifact(&state, id).await?;
    if state.database().get_envelope(id, caller.id).await?.is_none() {
        return Err(ApiError::Forbidden(format!(
            "{} has not been granted access to artifact {}",
            caller.name, id
        )));
    }

    let ciphertext = state
        .blobs()
        .get(id)
        .await?
        .ok_or_else(|| ApiError::Internal(format!("ciphertext of artifact {} is missing", id)))?;

    Ok((
        http::StatusCode::OK,
        Json(ContentResponse {
            id,
            owner: record.owner,
            name: record.name,
            nonce: BASE64.encode(record.nonce),
            ciphertext: BASE64.encode(&ciphertext),
        }),
    )
        .into_response())
}

/// The caller's own envelope for an artifact
pub async fn envelope_handler(
    State(state): State<ServiceState>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    load_artifact(&state, id).await?;
    let envelope = state
        .database()
        .get_envelope(id, caller.id)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("no envelope for {} on artifact {}", caller.name, id))
        })?;
    Ok((http::StatusCode::OK, Json(envelope)).into_response())
}
