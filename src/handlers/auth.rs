//! Cookie session endpoints shared by passkey and bearer clients.

use crate::error::{AppError, AppResult};
use crate::middleware::auth::{bearer_token, SESSION_USER_KEY};
use crate::state::AppState;
use axum::{extract::State, http::HeaderMap, Json};
use serde_json::{json, Value};
use tower_sessions::Session;

/// End the cookie session and revoke the bearer token, if one was sent.
pub async fn logout(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    if let Some(token) = bearer_token(&headers) {
        state.identity.sign_out(token).await?;
    }

    session
        .delete()
        .await
        .map_err(|e| AppError::Internal(format!("Session error: {}", e)))?;

    Ok(Json(json!({
        "success": true,
        "message": "Logged out successfully"
    })))
}

pub async fn session_info(session: Session) -> AppResult<Json<Value>> {
    let user_id: Option<String> = session
        .get(SESSION_USER_KEY)
        .await
        .map_err(|e| AppError::Internal(format!("Session error: {}", e)))?;

    match user_id {
        Some(id) => Ok(Json(json!({
            "authenticated": true,
            "userId": id
        }))),
        None => Ok(Json(json!({
            "authenticated": false
        }))),
    }
}
