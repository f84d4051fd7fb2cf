use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use uuid::Uuid;

use common::audit::AuditLogError;
use common::crypto::{EnvelopeError, KeyError};
use common::custodian::CustodianError;
use common::custody::{CustodyStoreError, WorkflowError};

use crate::blobs::BlobError;

/// Error returned by every v0 handler.
///
/// The body is always `{"msg": ...}`, matching the not found fallback.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("missing x-principal-id header")]
    MissingCaller,
    #[error("unknown principal {0}")]
    UnknownCaller(Uuid),
    /// Malformed input: bad encodings, wrong sizes, an envelope where none belongs
    #[error("{0}")]
    BadRequest(String),
    /// Well formed input that fails cryptographic checks
    #[error("{0}")]
    Unprocessable(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("storage error: {0}")]
    Storage(BlobError),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingCaller | ApiError::UnknownCaller(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Database(_) | ApiError::Storage(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn not_found(what: &str, id: Uuid) -> Self {
        ApiError::NotFound(format!("{} {} not found", what, id))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let msg = if status.is_server_error() {
            tracing::error!("API ERROR: {:?}", self);
            // Internal details stay in the log
            "internal server error".to_string()
        } else {
            tracing::warn!("API ERROR ({}): {}", status, self);
            self.to_string()
        };
        (status, Json(serde_json::json!({ "msg": msg }))).into_response()
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::NotOwner => ApiError::Forbidden(err.to_string()),
            WorkflowError::AlreadyDecided => ApiError::Conflict(err.to_string()),
            WorkflowError::MissingEnvelope | WorkflowError::UnexpectedEnvelope => {
                ApiError::BadRequest(err.to_string())
            }
        }
    }
}

impl From<CustodyStoreError<sqlx::Error>> for ApiError {
    fn from(err: CustodyStoreError<sqlx::Error>) -> Self {
        match err {
            CustodyStoreError::Provider(e) => ApiError::Database(e),
            CustodyStoreError::NotFound => ApiError::NotFound("custody request not found".into()),
            CustodyStoreError::DuplicatePending => ApiError::Conflict(err.to_string()),
            CustodyStoreError::Workflow(e) => e.into(),
        }
    }
}

impl From<CustodianError<sqlx::Error>> for ApiError {
    fn from(err: CustodianError<sqlx::Error>) -> Self {
        match err {
            CustodianError::Store(e) => e.into(),
            CustodianError::InvalidProof => ApiError::Unprocessable(err.to_string()),
            CustodianError::OwnArtifact => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl From<AuditLogError<sqlx::Error>> for ApiError {
    fn from(err: AuditLogError<sqlx::Error>) -> Self {
        match err {
            AuditLogError::Provider(e) => ApiError::Database(e),
            AuditLogError::BrokenChain(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<BlobError> for ApiError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::AlreadyExists(id) => {
                ApiError::Conflict(format!("artifact {} already exists", id))
            }
            e => ApiError::Storage(e),
        }
    }
}

impl From<KeyError> for ApiError {
    fn from(err: KeyError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<EnvelopeError> for ApiError {
    fn from(err: EnvelopeError) -> Self {
        match err {
            EnvelopeError::KeyFormat(_) => ApiError::BadRequest(err.to_string()),
            EnvelopeError::Authentication => ApiError::Unprocessable(err.to_string()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_workflow_status_codes() {
        let cases = [
            (WorkflowError::NotOwner, StatusCode::FORBIDDEN),
            (WorkflowError::AlreadyDecided, StatusCode::CONFLICT),
            (WorkflowError::MissingEnvelope, StatusCode::BAD_REQUEST),
            (WorkflowError::UnexpectedEnvelope, StatusCode::BAD_REQUEST),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn test_custodian_status_codes() {
        let not_found: ApiError = CustodianError::Store(CustodyStoreError::NotFound).into();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let invalid: ApiError = CustodianError::<sqlx::Error>::InvalidProof.into();
        assert_eq!(invalid.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let own: ApiError = CustodianError::<sqlx::Error>::OwnArtifact.into();
        assert_eq!(own.status(), StatusCode::BAD_REQUEST);

        let duplicate: ApiError =
            CustodianError::Store(CustodyStoreError::<sqlx::Error>::DuplicatePending).into();
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);

        let db: ApiError = CustodianError::Store(CustodyStoreError::Provider(
            sqlx::Error::PoolClosed,
        ))
        .into();
        assert_eq!(db.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_envelope_status_codes() {
        assert_eq!(
            ApiError::from(EnvelopeError::Authentication).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::from(EnvelopeError::KeyFormat("short".into())).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
