use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};
use time::OffsetDateTime;
use uuid::Uuid;

use common::audit::{
    AuditAction, AuditEvent, AuditFilter, AuditLog, AuditLogError, ChainHash, NewAuditEvent,
};

use crate::database::types::DText;
use crate::database::{decode_error, Database};

const AUDIT_COLUMNS: &str =
    "seq, timestamp_nanos, action, actor_id, actor_name, subject, payload, prev_hash, hash";

fn timestamp_nanos(timestamp: OffsetDateTime) -> i64 {
    timestamp.unix_timestamp_nanos() as i64
}

fn event_from_row(row: &SqliteRow) -> Result<AuditEvent, sqlx::Error> {
    let seq: i64 = row.try_get("seq")?;
    let nanos: i64 = row.try_get("timestamp_nanos")?;
    let action: DText<AuditAction> = row.try_get("action")?;
    let actor: DText<Uuid> = row.try_get("actor_id")?;
    let subject: DText<Uuid> = row.try_get("subject")?;
    let payload: String = row.try_get("payload")?;
    let prev_hash: String = row.try_get("prev_hash")?;
    let hash: String = row.try_get("hash")?;

    Ok(AuditEvent {
        seq: seq as u64,
        timestamp: OffsetDateTime::from_unix_timestamp_nanos(nanos as i128)
            .map_err(decode_error)?,
        action: action.0,
        actor: actor.0,
        actor_name: row.try_get("actor_name")?,
        subject: subject.0,
        payload: serde_json::from_str(&payload).map_err(decode_error)?,
        prev_hash: ChainHash::from_hex(&prev_hash).map_err(decode_error)?,
        hash: ChainHash::from_hex(&hash).map_err(decode_error)?,
    })
}

#[async_trait]
impl AuditLog for Database {
    type Error = sqlx::Error;

    async fn append(&self, event: NewAuditEvent) -> Result<AuditEvent, AuditLogError<Self::Error>> {
        let _guard = self.audit_lock.lock().await;
        let mut tx = self.begin().await?;

        let tip = sqlx::query(
            "SELECT seq, timestamp_nanos, hash FROM audit_log ORDER BY seq DESC LIMIT 1",
        )
        .fetch_optional(&mut *tx)
        .await?;

        let (seq, prev_hash, floor) = match tip {
            Some(row) => {
                let seq: i64 = row.try_get("seq")?;
                let nanos: i64 = row.try_get("timestamp_nanos")?;
                let hash: String = row.try_get("hash")?;
                let hash = ChainHash::from_hex(&hash).map_err(decode_error)?;
                (seq as u64 + 1, hash, nanos)
            }
            None => (1, ChainHash::GENESIS, i64::MIN),
        };

        // Timestamps never run backwards along the chain, even if the clock does
        let now = timestamp_nanos(OffsetDateTime::now_utc()).max(floor);
        let timestamp = OffsetDateTime::from_unix_timestamp_nanos(now as i128)
            .map_err(|e| AuditLogError::Provider(decode_error(e)))?;
        let committed = AuditEvent::chain(prev_hash, seq, timestamp, event);

        sqlx::query(
            r#"
            INSERT INTO audit_log
                (seq, timestamp_nanos, action, actor_id, actor_name, subject, payload, prev_hash, hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(committed.seq as i64)
        .bind(now)
        .bind(DText(committed.action))
        .bind(DText(committed.actor))
        .bind(&committed.actor_name)
        .bind(DText(committed.subject))
        .bind(committed.payload.to_string())
        .bind(committed.prev_hash.to_hex())
        .bind(committed.hash.to_hex())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(committed)
    }

    async fn query(
        &self,
        filter: &AuditFilter,
    ) -> Result<Vec<AuditEvent>, AuditLogError<Self::Error>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM audit_log WHERE 1 = 1", AUDIT_COLUMNS));

        if let Some(name) = &filter.actor_name {
            qb.push(" AND instr(lower(actor_name), ")
                .push_bind(name.to_lowercase())
                .push(") > 0");
        }
        if let Some(action) = filter.action {
            qb.push(" AND action = ").push_bind(DText(action));
        }
        if let Some(subject) = filter.subject {
            qb.push(" AND subject = ").push_bind(DText(subject));
        }
        if let Some(hash) = &filter.hash {
            qb.push(" AND instr(hash, ")
                .push_bind(hash.to_lowercase())
                .push(") > 0");
        }
        if let Some(since) = filter.since {
            qb.push(" AND timestamp_nanos >= ")
                .push_bind(timestamp_nanos(since));
        }
        if let Some(until) = filter.until {
            qb.push(" AND timestamp_nanos <= ")
                .push_bind(timestamp_nanos(until));
        }

        qb.push(if filter.descending {
            " ORDER BY seq DESC"
        } else {
            " ORDER BY seq ASC"
        });
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = qb.build().fetch_all(&**self).await?;
        Ok(rows
            .iter()
            .map(event_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }
}
