use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use prometheus::{Encoder, TextEncoder};

use crate::error::ODataError;
use crate::state::ServerState;

/// The metrics registry in the Prometheus text format.
pub async fn get_metrics(State(state): State<ServerState>) -> Result<Response, ODataError> {
    state.metrics.update_pool_metrics(&state.pool);
    let encoder = TextEncoder::new();
    let body = encoder
        .encode_to_string(&state.metrics_registry.gather())
        .map_err(ODataError::internal)?;
    Ok(([(header::CONTENT_TYPE, encoder.format_type().to_string())], body).into_response())
}
