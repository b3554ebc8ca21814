//! # Passkey Handlers
//!
//! Endpoints under `/api/auth/passkey`. Registration and management require
//! a logged-in caller (see `require_auth`); authentication does not.
//!
//! Request bodies are taken as `Result<Json<_>, JsonRejection>` so malformed
//! JSON is reported through [`AppError`] like every other failure.

use crate::error::{AppError, AppResult};
use crate::middleware::auth::{CurrentUser, SESSION_USER_KEY};
use crate::state::AppState;
use crate::webauthn::authentication::{self, AuthenticationOptions};
use crate::webauthn::types::*;
use crate::webauthn::{management, registration, session as session_bridge};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use serde_json::{json, Value};
use tower_sessions::Session;

// Registration endpoints

pub async fn register_options(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<CreationOptions>> {
    let options = registration::begin_registration(&state.db, &state.rp, &user.id, &user.email).await?;

    Ok(Json(options))
}

pub async fn register_verify(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    payload: Result<Json<RegisterVerifyRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(req) = payload?;
    let response = req
        .response
        .ok_or_else(|| AppError::BadRequest("Missing registration response".to_string()))?;

    registration::complete_registration(
        &state.db,
        &state.rp,
        &user.id,
        &response,
        req.credential_name.as_deref(),
    )
    .await?;

    Ok(Json(json!({
        "verified": true,
        "message": "Passkey registered successfully"
    })))
}

// Authentication endpoints

pub async fn authenticate_options(
    State(state): State<AppState>,
    payload: Result<Json<AuthenticateOptionsRequest>, JsonRejection>,
) -> AppResult<Json<AuthenticationOptions>> {
    let Json(req) = payload?;
    let email = req
        .email
        .filter(|email| !email.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Email is required".to_string()))?;

    let options = authentication::begin_authentication(&state.db, &state.rp, email.trim()).await?;

    Ok(Json(options))
}

pub async fn authenticate_verify(
    session: Session,
    State(state): State<AppState>,
    payload: Result<Json<AuthenticateVerifyRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(req) = payload?;
    let (email, response) = match (req.email, req.response) {
        (Some(email), Some(response)) if !email.trim().is_empty() => (email, response),
        _ => {
            return Err(AppError::BadRequest(
                "Missing authentication response or email".to_string(),
            ))
        }
    };

    let verified =
        authentication::complete_authentication(&state.db, &state.rp, email.trim(), &response).await?;

    let identity_session = session_bridge::establish_session(
        &state.db,
        state.identity.as_ref(),
        &verified.user_id,
        &verified.email,
    )
    .await?;

    // New session id on privilege change
    session_bridge::revoke_on_failure(state.identity.as_ref(), &identity_session, async {
        session
            .cycle_id()
            .await
            .map_err(|e| AppError::SessionFailed(format!("Cookie session error: {}", e)))?;
        session
            .insert(SESSION_USER_KEY, &verified.user_id)
            .await
            .map_err(|e| AppError::SessionFailed(format!("Cookie session error: {}", e)))
    })
    .await?;

    Ok(Json(json!({
        "verified": true,
        "userId": verified.user_id,
        "session": identity_session,
    })))
}

// Management endpoints

pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<Value>> {
    let passkeys = management::list_credentials(&state.db, &user.id).await?;

    Ok(Json(json!({ "passkeys": passkeys })))
}

pub async fn rename(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    payload: Result<Json<RenameRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(req) = payload?;
    let name = req
        .name
        .ok_or_else(|| AppError::InvalidName("Passkey name is required".to_string()))?;

    let passkey = management::rename_credential(&state.db, &user.id, &id, &name).await?;

    Ok(Json(json!({
        "success": true,
        "passkey": passkey
    })))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> AppResult<Json<Value>> {
    management::delete_credential(&state.db, &user.id, &id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Passkey deleted successfully"
    })))
}
