use axum::extract::{Json, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};

use common::audit::{AuditFilter, AuditLog, AuditLogError};

use super::{ApiError, Caller};
use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .route("/", get(query_handler))
        .route("/verify", get(verify_handler))
        .with_state(state)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    /// Events checked; on failure, the events before the break
    pub events: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broken_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

pub async fn query_handler(
    State(state): State<ServiceState>,
    _caller: Caller,
    Query(filter): Query<AuditFilter>,
) -> Result<Response, ApiError> {
    let events = state.database().query(&filter).await?;
    Ok((http::StatusCode::OK, Json(events)).into_response())
}

pub async fn verify_handler(
    State(state): State<ServiceState>,
    _caller: Caller,
) -> Result<impl IntoResponse, ApiError> {
    let response = match state.database().verify().await {
        Ok(events) => VerifyResponse {
            valid: true,
            events,
            broken_at: None,
            reason: None,
        },
        Err(AuditLogError::BrokenChain(broken)) => {
            tracing::error!("audit chain verification failed: {}", broken);
            VerifyResponse {
                valid: false,
                events: broken.seq.saturating_sub(1),
                broken_at: Some(broken.seq),
                reason: Some(broken.reason.to_string()),
            }
        }
        Err(e) => return Err(e.into()),
    };
    Ok((http::StatusCode::OK, Json(response)).into_response())
}
