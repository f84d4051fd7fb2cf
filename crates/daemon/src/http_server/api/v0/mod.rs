use axum::Router;

pub mod artifacts;
pub mod audit;
mod caller;
mod error;
pub mod principals;
pub mod requests;

pub use caller::{Caller, PRINCIPAL_HEADER};
pub use error::ApiError;

use crate::ServiceState;

pub fn router(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .nest("/principals", principals::router(state.clone()))
        .nest("/artifacts", artifacts::router(state.clone()))
        .nest("/requests", requests::router(state.clone()))
        .nest("/audit", audit::router(state.clone()))
        .with_state(state)
}
