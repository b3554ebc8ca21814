//! # HTTP Request Handlers
//!
//! ## Submodules
//! - `health`: health check endpoint (for monitoring)
//! - `passkey`: passkey ceremonies and passkey management
//! - `auth`: cookie session status and logout
//! - `users`: current user profile
//!
//! ## Handler Pattern
//! Handlers extract what they need (state, caller, path, JSON body), call
//! into `webauthn`/`db`, and return `AppResult<Json<_>>`; errors become JSON
//! responses through `AppError`'s `IntoResponse`.

pub mod auth;
pub mod health;
pub mod passkey;
pub mod users;

use crate::middleware::auth::require_auth;
use crate::state::AppState;
use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post},
    Router,
};

/// All API routes, with authentication applied where required.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/auth/passkey/register-options", post(passkey::register_options))
        .route("/api/auth/passkey/register-verify", post(passkey::register_verify))
        .route("/api/auth/passkey/list", get(passkey::list))
        .route("/api/auth/passkey/:id/rename", patch(passkey::rename))
        .route("/api/auth/passkey/:id", delete(passkey::delete))
        .route("/api/users/me", get(users::get_current_user))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/auth/passkey/authenticate-options", post(passkey::authenticate_options))
        .route("/api/auth/passkey/authenticate-verify", post(passkey::authenticate_verify))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/session", get(auth::session_info))
        .merge(protected)
        .with_state(state)
}
