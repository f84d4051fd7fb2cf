use common::crypto::{KeyEncoding, PublicIdentity, SignPublicKey, WrapPublicKey};
use common::principal::Principal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use super::types::{DText, DTime};
use super::{decode_error, Database};

const PRINCIPAL_COLUMNS: &str = "id, name, wrap_public_key, sign_public_key";

fn principal_from_row(row: &SqliteRow) -> Result<Principal, sqlx::Error> {
    let id: DText<Uuid> = row.try_get("id")?;
    let wrap: Vec<u8> = row.try_get("wrap_public_key")?;
    let sign: Vec<u8> = row.try_get("sign_public_key")?;
    Ok(Principal {
        id: id.into_inner(),
        name: row.try_get("name")?,
        keys: PublicIdentity {
            wrap: WrapPublicKey::from_der(&wrap).map_err(decode_error)?,
            sign: SignPublicKey::from_der(&sign).map_err(decode_error)?,
        },
    })
}

impl Database {
    /// Register a principal. Names are unique; a clash surfaces as a
    /// unique violation from the database.
    pub async fn insert_principal(&self, principal: &Principal) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO principals (id, name, wrap_public_key, sign_public_key, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(DText(principal.id))
        .bind(&principal.name)
        .bind(principal.keys.wrap.to_der())
        .bind(principal.keys.sign.to_der())
        .bind(DTime(OffsetDateTime::now_utc()))
        .execute(&**self)
        .await?;
        Ok(())
    }

    pub async fn get_principal(&self, id: Uuid) -> Result<Option<Principal>, sqlx::Error> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM principals WHERE id = $1",
            PRINCIPAL_COLUMNS
        ))
        .bind(DText(id))
        .fetch_optional(&**self)
        .await?;

        row.as_ref().map(principal_from_row).transpose()
    }

    /// Every registered principal in registration order
    pub async fn list_principals(&self) -> Result<Vec<Principal>, sqlx::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM principals ORDER BY rowid ASC",
            PRINCIPAL_COLUMNS
        ))
        .fetch_all(&**self)
        .await?;

        rows.iter().map(principal_from_row).collect()
    }
}

#[cfg(test)]
mod test {
    use common::crypto::PrincipalKeys;

    use super::*;
    use crate::database::test_utils::memory_database;

    #[tokio::test]
    async fn test_principal_roundtrip() {
        let db = memory_database().await;
        let principal = Principal::new("alice", PrincipalKeys::generate().public());
        db.insert_principal(&principal).await.unwrap();

        let loaded = db.get_principal(principal.id).await.unwrap().unwrap();
        assert_eq!(loaded, principal);
        assert!(db.get_principal(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_name_is_unique_violation() {
        let db = memory_database().await;
        let first = Principal::new("alice", PrincipalKeys::generate().public());
        let second = Principal::new("alice", PrincipalKeys::generate().public());
        db.insert_principal(&first).await.unwrap();

        let err = db.insert_principal(&second).await.unwrap_err();
        match err {
            sqlx::Error::Database(e) => assert!(e.is_unique_violation()),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(db.list_principals().await.unwrap(), vec![first]);
    }
}
