use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Fallback for unrouted paths, shaped like API errors for JSON clients
pub async fn not_found_handler(uri: Uri, headers: HeaderMap) -> Response {
    let msg = format!("no route for {}", uri.path());
    tracing::debug!("{}", msg);

    let wants_json = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("application/json"));

    if wants_json {
        (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "msg": msg })),
        )
            .into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "text/plain")],
            msg,
        )
            .into_response()
    }
}
