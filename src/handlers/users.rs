//! # User Handlers

use crate::db::users;
use crate::error::AppResult;
use crate::middleware::auth::CurrentUser;
use crate::state::AppState;
use axum::{extract::State, Extension, Json};
use serde_json::{json, Value};

/// Current user's profile
///
/// ## Route
/// GET /api/users/me
///
/// ## Response
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "email": "fan@example.com",
///   "lastLogin": "2024-06-14T19:00:00.000000Z",
///   "createdAt": "2024-06-01T10:30:00.000000Z",
///   "hasPasskeyHandle": true
/// }
/// ```
///
/// The WebAuthn user handle itself is not returned.
pub async fn get_current_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> AppResult<Json<Value>> {
    let user = users::find_by_id(&state.db, &current.id).await?;

    Ok(Json(json!({
        "id": user.id,
        "email": user.email,
        "lastLogin": user.last_login,
        "createdAt": user.created_at,
        "hasPasskeyHandle": user.webauthn_user_handle.is_some()
    })))
}
