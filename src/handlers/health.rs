//! # Health Check Handler

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

/// Liveness plus a database round trip
///
/// ## Route
/// GET /health
///
/// ## Response
/// ```json
/// { "status": "healthy", "service": "passkey-auth-server" }
/// ```
/// 503 with `"status": "degraded"` when the database does not answer.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "service": "passkey-auth-server"
            })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Health check database query failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "service": "passkey-auth-server"
                })),
            )
        }
    }
}
