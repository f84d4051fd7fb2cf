use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use common::crypto::KeyEnvelope;
use common::custody::{
    CustodyRequest, CustodyStatus, CustodyStore, CustodyStoreError, Decision, WorkflowError,
};

use super::artifact_queries::upsert_envelope;
use crate::database::types::{DText, DTime};
use crate::database::{decode_error, Database};

const REQUEST_SELECT: &str = r#"
    SELECT id, artifact_id, requester_id, owner_id, status, envelope, created_at, updated_at
    FROM custody_requests
"#;

fn request_from_row(row: &SqliteRow) -> Result<CustodyRequest, sqlx::Error> {
    let id: DText<Uuid> = row.try_get("id")?;
    let artifact_id: DText<Uuid> = row.try_get("artifact_id")?;
    let requester: DText<Uuid> = row.try_get("requester_id")?;
    let owner: DText<Uuid> = row.try_get("owner_id")?;
    let status: DText<CustodyStatus> = row.try_get("status")?;
    let envelope: Option<Vec<u8>> = row.try_get("envelope")?;
    let created_at: DTime = row.try_get("created_at")?;
    let updated_at: DTime = row.try_get("updated_at")?;

    let envelope = envelope
        .map(|bytes| KeyEnvelope::from_bytes(&bytes))
        .transpose()
        .map_err(decode_error)?;

    Ok(CustodyRequest {
        id: id.0,
        artifact_id: artifact_id.0,
        requester: requester.0,
        owner: owner.0,
        status: status.0,
        envelope,
        created_at: created_at.0,
        updated_at: updated_at.0,
    })
}

/// Whether `err` came from the one-pending-request-per-requester index
fn is_duplicate_pending(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.is_unique_violation() && db.message().contains("custody_requests.requester_id")
        }
        _ => false,
    }
}

fn envelope_column(envelope: &Option<KeyEnvelope>) -> Result<Option<Vec<u8>>, sqlx::Error> {
    envelope
        .as_ref()
        .map(|e| e.to_bytes())
        .transpose()
        .map_err(|e| sqlx::Error::Encode(Box::new(e)))
}

#[async_trait]
impl CustodyStore for Database {
    type Error = sqlx::Error;

    async fn insert(&self, request: CustodyRequest) -> Result<(), CustodyStoreError<Self::Error>> {
        let result = sqlx::query(
            r#"
            INSERT INTO custody_requests
                (id, artifact_id, requester_id, owner_id, status, envelope, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(DText(request.id))
        .bind(DText(request.artifact_id))
        .bind(DText(request.requester))
        .bind(DText(request.owner))
        .bind(DText(request.status))
        .bind(envelope_column(&request.envelope)?)
        .bind(DTime(request.created_at))
        .bind(DTime(request.updated_at))
        .execute(&**self)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_pending(&e) => Err(CustodyStoreError::DuplicatePending),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, id: Uuid) -> Result<CustodyRequest, CustodyStoreError<Self::Error>> {
        let row = sqlx::query(&format!("{} WHERE id = $1", REQUEST_SELECT))
            .bind(DText(id))
            .fetch_optional(&**self)
            .await?
            .ok_or(CustodyStoreError::NotFound)?;

        Ok(request_from_row(&row)?)
    }

    async fn decide(
        &self,
        id: Uuid,
        actor: Uuid,
        decision: Decision,
        envelope: Option<KeyEnvelope>,
    ) -> Result<CustodyRequest, CustodyStoreError<Self::Error>> {
        let mut request = self.get(id).await?;
        request
            .decide(actor, decision, envelope)
            .map_err(CustodyStoreError::Workflow)?;

        // The status guard makes this a compare-and-set: of two racing
        //  decisions only the first to commit still sees 'pending'. The
        //  UPDATE must be the first statement so the transaction holds no
        //  stale read snapshot when it takes the write lock.
        let mut tx = self.begin().await?;
        let result = sqlx::query(
            r#"
            UPDATE custody_requests
            SET status = $1, envelope = $2, updated_at = $3
            WHERE id = $4 AND status = 'pending'
            "#,
        )
        .bind(DText(request.status))
        .bind(envelope_column(&request.envelope)?)
        .bind(DTime(request.updated_at))
        .bind(DText(id))
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!("request {} was decided concurrently", id);
            return Err(CustodyStoreError::Workflow(WorkflowError::AlreadyDecided));
        }

        // An approval and the requester's key grant commit together
        if let Some(envelope) = &request.envelope {
            upsert_envelope(&mut *tx, request.artifact_id, request.requester, envelope).await?;
        }
        tx.commit().await?;
        Ok(request)
    }

    async fn list_by_requester(
        &self,
        requester: Uuid,
    ) -> Result<Vec<CustodyRequest>, CustodyStoreError<Self::Error>> {
        let rows = sqlx::query(&format!(
            "{} WHERE requester_id = $1 ORDER BY rowid ASC",
            REQUEST_SELECT
        ))
        .bind(DText(requester))
        .fetch_all(&**self)
        .await?;

        Ok(rows
            .iter()
            .map(request_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn list_pending_for_owner(
        &self,
        owner: Uuid,
    ) -> Result<Vec<CustodyRequest>, CustodyStoreError<Self::Error>> {
        let rows = sqlx::query(&format!(
            "{} WHERE owner_id = $1 AND status = $2 ORDER BY rowid ASC",
            REQUEST_SELECT
        ))
        .bind(DText(owner))
        .bind(DText(CustodyStatus::Pending))
        .fetch_all(&**self)
        .await?;

        Ok(rows
            .iter()
            .map(request_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }
}
