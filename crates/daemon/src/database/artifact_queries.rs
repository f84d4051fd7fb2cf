use common::artifact::{EncryptedArtifact, IntegrityProof};
use common::crypto::{ContentDigest, KeyEnvelope, Signature, NONCE_SIZE};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use super::types::{DText, DTime};
use super::{decode_error, Database};

/// Stored metadata of an uploaded artifact. The ciphertext itself lives in
/// the blob directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRecord {
    pub id: Uuid,
    pub owner: Uuid,
    pub name: String,
    pub nonce: [u8; NONCE_SIZE],
    /// Ciphertext length in bytes
    pub size: u64,
    pub created_at: OffsetDateTime,
    pub proof: IntegrityProof,
}

const ARTIFACT_SELECT: &str = r#"
    SELECT a.id, a.owner_id, a.name, a.nonce, a.size, a.created_at,
           p.signer_id, p.digest, p.signature
    FROM artifacts a
    JOIN proofs p ON p.artifact_id = a.id
"#;

fn artifact_from_row(row: &SqliteRow) -> Result<ArtifactRecord, sqlx::Error> {
    let id: DText<Uuid> = row.try_get("id")?;
    let owner: DText<Uuid> = row.try_get("owner_id")?;
    let signer: DText<Uuid> = row.try_get("signer_id")?;
    let digest: DText<ContentDigest> = row.try_get("digest")?;
    let signature: String = row.try_get("signature")?;
    let nonce: Vec<u8> = row.try_get("nonce")?;
    let size: i64 = row.try_get("size")?;
    let created_at: DTime = row.try_get("created_at")?;

    Ok(ArtifactRecord {
        id: id.0,
        owner: owner.0,
        name: row.try_get("name")?,
        nonce: <[u8; NONCE_SIZE]>::try_from(nonce.as_slice()).map_err(decode_error)?,
        size: size as u64,
        created_at: created_at.0,
        proof: IntegrityProof {
            artifact_id: id.0,
            signer: signer.0,
            digest: digest.0,
            signature: Signature::from_base64(&signature).map_err(decode_error)?,
        },
    })
}

fn envelope_bytes(envelope: &KeyEnvelope) -> Result<Vec<u8>, sqlx::Error> {
    envelope
        .to_bytes()
        .map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

/// Store the envelope that gives `recipient` the artifact key, replacing
/// any earlier one. Takes an executor so a decision can write it inside its
/// own transaction.
pub(crate) async fn upsert_envelope<'e, E>(
    executor: E,
    artifact_id: Uuid,
    recipient: Uuid,
    envelope: &KeyEnvelope,
) -> Result<(), sqlx::Error>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO envelopes (artifact_id, recipient_id, envelope, created_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (artifact_id, recipient_id)
        DO UPDATE SET envelope = excluded.envelope, created_at = excluded.created_at
        "#,
    )
    .bind(DText(artifact_id))
    .bind(DText(recipient))
    .bind(envelope_bytes(envelope)?)
    .bind(DTime(OffsetDateTime::now_utc()))
    .execute(executor)
    .await?;
    Ok(())
}

impl Database {
    /// Record an artifact's metadata, its proof and the owner's own
    /// envelope in one transaction
    pub async fn insert_artifact(
        &self,
        artifact: &EncryptedArtifact,
        proof: &IntegrityProof,
        owner_envelope: &KeyEnvelope,
    ) -> Result<(), sqlx::Error> {
        let now = DTime(OffsetDateTime::now_utc());
        let envelope = envelope_bytes(owner_envelope)?;
        let mut tx = self.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO artifacts (id, owner_id, name, nonce, size, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(DText(artifact.id))
        .bind(DText(artifact.owner))
        .bind(&artifact.name)
        .bind(artifact.nonce.to_vec())
        .bind(artifact.ciphertext.len() as i64)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO proofs (artifact_id, signer_id, digest, signature)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(DText(proof.artifact_id))
        .bind(DText(proof.signer))
        .bind(DText(proof.digest))
        .bind(proof.signature.to_base64())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO envelopes (artifact_id, recipient_id, envelope, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(DText(artifact.id))
        .bind(DText(artifact.owner))
        .bind(envelope)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await
    }

    pub async fn get_artifact(&self, id: Uuid) -> Result<Option<ArtifactRecord>, sqlx::Error> {
        let row = sqlx::query(&format!("{} WHERE a.id = $1", ARTIFACT_SELECT))
            .bind(DText(id))
            .fetch_optional(&**self)
            .await?;

        row.as_ref().map(artifact_from_row).transpose()
    }

    /// All artifacts in upload order
    pub async fn list_artifacts(&self) -> Result<Vec<ArtifactRecord>, sqlx::Error> {
        let rows = sqlx::query(&format!("{} ORDER BY a.rowid ASC", ARTIFACT_SELECT))
            .fetch_all(&**self)
            .await?;

        rows.iter().map(artifact_from_row).collect()
    }

    pub async fn get_envelope(
        &self,
        artifact_id: Uuid,
        recipient: Uuid,
    ) -> Result<Option<KeyEnvelope>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT envelope FROM envelopes WHERE artifact_id = $1 AND recipient_id = $2",
        )
        .bind(DText(artifact_id))
        .bind(DText(recipient))
        .fetch_optional(&**self)
        .await?;

        match row {
            Some(row) => {
                let bytes: Vec<u8> = row.try_get("envelope")?;
                KeyEnvelope::from_bytes(&bytes)
                    .map(Some)
                    .map_err(decode_error)
            }
            None => Ok(None),
        }
    }
}
