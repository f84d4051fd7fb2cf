use axum::extract::{Json, Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common::crypto::{EnvelopeRecord, KeyEnvelope};
use common::custody::{CustodyStore, Decision};

use super::{ApiError, Caller};
use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/", post(submit_handler))
        .route("/mine", get(mine_handler))
        .route("/pending", get(pending_handler))
        .route("/:id", get(get_handler))
        .route("/:id/decision", post(decide_handler))
        .with_state(state)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub artifact_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub decision: Decision,
    /// The artifact key wrapped for the requester; required to approve
    #[serde(default)]
    pub envelope: Option<EnvelopeRecord>,
}

pub async fn submit_handler(
    State(state): State<ServiceState>,
    Caller(requester): Caller,
    Json(req): Json<SubmitRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let artifact = state
        .database()
        .get_artifact(req.artifact_id)
        .await?
        .ok_or_else(|| ApiError::not_found("artifact", req.artifact_id))?;

    let receipt = state
        .custodian()
        .submit_request(&requester, artifact.owner, artifact.id)
        .await?;
    Ok((http::StatusCode::CREATED, Json(receipt.value)).into_response())
}

pub async fn mine_handler(
    State(state): State<ServiceState>,
    Caller(caller): Caller,
) -> Result<Response, ApiError> {
    let requests = state.database().list_by_requester(caller.id).await?;
    Ok((http::StatusCode::OK, Json(requests)).into_response())
}

pub async fn pending_handler(
    State(state): State<ServiceState>,
    Caller(caller): Caller,
) -> Result<Response, ApiError> {
    let requests = state.database().list_pending_for_owner(caller.id).await?;
    Ok((http::StatusCode::OK, Json(requests)).into_response())
}

/// A single request, visible to its requester and the artifact owner
pub async fn get_handler(
    State(state): State<ServiceState>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let request = state.database().get(id).await?;
    if caller.id != request.requester && caller.id != request.owner {
        return Err(ApiError::not_found("custody request", id));
    }
    Ok((http::StatusCode::OK, Json(request)).into_response())
}

pub async fn decide_handler(
    State(state): State<ServiceState>,
    Caller(owner): Caller,
    Path(id): Path<Uuid>,
    Json(req): Json<DecisionRequest>,
) -> Result<Response, ApiError> {
    let envelope = req
        .envelope
        .as_ref()
        .map(KeyEnvelope::from_record)
        .transpose()?;

    let receipt = state
        .custodian()
        .decide(&owner, id, req.decision, envelope)
        .await?;
    Ok((http::StatusCode::OK, Json(receipt.value)).into_response())
}
