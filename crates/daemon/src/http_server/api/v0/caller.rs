use axum::async_trait;
use axum::extract::FromRequestParts;
use http::request::Parts;
use uuid::Uuid;

use common::principal::Principal;

use super::ApiError;
use crate::ServiceState;

/// Header naming the principal a request acts for
pub const PRINCIPAL_HEADER: &str = "x-principal-id";

/// The registered principal named by the [`PRINCIPAL_HEADER`] header
#[derive(Debug, Clone)]
pub struct Caller(pub Principal);

#[async_trait]
impl FromRequestParts<ServiceState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServiceState,
    ) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(PRINCIPAL_HEADER)
            .ok_or(ApiError::MissingCaller)?;
        let id = value
            .to_str()
            .ok()
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .ok_or_else(|| {
                ApiError::BadRequest(format!("{} is not a principal id", PRINCIPAL_HEADER))
            })?;

        let principal = state
            .database()
            .get_principal(id)
            .await?
            .ok_or(ApiError::UnknownCaller(id))?;
        Ok(Caller(principal))
    }
}
