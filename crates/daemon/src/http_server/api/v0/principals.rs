use axum::extract::{Json, Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common::crypto::{KeyEncoding, PublicIdentity, SignPublicKey, WrapPublicKey};
use common::principal::Principal;

use super::ApiError;
use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/", get(list_handler).post(register_handler))
        .route("/:id", get(get_handler))
        .with_state(state)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// Client chosen id; one is assigned when absent
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    /// base64 SubjectPublicKeyInfo DER of the X25519 wrapping key
    pub wrap_public_key: String,
    /// base64 SubjectPublicKeyInfo DER of the Ed25519 signing key
    pub sign_public_key: String,
}

pub async fn register_handler(
    State(state): State<ServiceState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("name cannot be empty".into()));
    }

    let keys = PublicIdentity {
        wrap: WrapPublicKey::from_base64(&req.wrap_public_key)?,
        sign: SignPublicKey::from_base64(&req.sign_public_key)?,
    };
    let mut principal = Principal::new(name, keys);
    if let Some(id) = req.id {
        principal.id = id;
    }

    state
        .database()
        .insert_principal(&principal)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => ApiError::Conflict(
                format!("principal '{}' or id {} already registered", name, principal.id),
            ),
            e => ApiError::Database(e),
        })?;
    tracing::info!("registered principal {}", principal);

    Ok((http::StatusCode::CREATED, Json(principal)).into_response())
}

pub async fn list_handler(State(state): State<ServiceState>) -> Result<Response, ApiError> {
    let principals = state.database().list_principals().await?;
    Ok((http::StatusCode::OK, Json(principals)).into_response())
}

pub async fn get_handler(
    State(state): State<ServiceState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let principal = state
        .database()
        .get_principal(id)
        .await?
        .ok_or_else(|| ApiError::not_found("principal", id))?;
    Ok((http::StatusCode::OK, Json(principal)).into_response())
}
