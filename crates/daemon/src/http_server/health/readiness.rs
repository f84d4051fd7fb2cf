use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tokio::time::timeout;

use super::data_source::StateDataSource;

const READINESS_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct Readiness {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

#[tracing::instrument(skip(data_src))]
pub async fn handler(data_src: StateDataSource) -> Response {
    let failure = match timeout(READINESS_TIMEOUT, data_src.is_ready()).await {
        Ok(Ok(())) => {
            let ready = Readiness {
                status: "ok",
                message: None,
            };
            return (StatusCode::OK, Json(ready)).into_response();
        }
        Ok(Err(e)) => e.to_string(),
        Err(_) => "readiness check timed out".to_string(),
    };

    tracing::warn!("not ready: {}", failure);
    let not_ready = Readiness {
        status: "failure",
        message: Some(failure),
    };
    (StatusCode::SERVICE_UNAVAILABLE, Json(not_ready)).into_response()
}
