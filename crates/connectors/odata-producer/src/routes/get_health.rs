use axum::extract::State;
use axum::http::StatusCode;

use crate::state::ServerState;

/// 204 when the database answers.
pub async fn get_health(State(state): State<ServerState>) -> StatusCode {
    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => StatusCode::NO_CONTENT,
        Err(error) => {
            tracing::error!(
                meta.signal_type = "log",
                event.domain = "odata",
                event.name = "Health check error",
                name = "Health check error",
                body = %error,
                error = true,
            );
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
