mod get_health;
mod get_metrics;
mod odata;

use crate::state::ServerState;
use axum::{routing::get, Router};

pub use get_health::get_health;
pub use get_metrics::get_metrics;
pub use odata::handle_odata;

/// `/health` and `/metrics`; every other path is an OData request.
pub fn create_router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/metrics", get(get_metrics))
        .fallback(handle_odata)
        .with_state(state)
}
