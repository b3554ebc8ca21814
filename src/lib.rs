//! # Passkey Authentication Server
//!
//! Passkey (WebAuthn) registration and login for the tournament app, with a
//! session bridge into the app's identity provider.
//!
//! ## Key Concepts
//! - **Challenge store**: single-use, expiring challenges kept in SQLite
//! - **Ceremonies**: registration (attestation) and authentication (assertion)
//! - **Session bridge**: a verified login becomes an identity-provider session
//!   without the client ever holding a sign-in token

pub mod cleanup;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod state;
pub mod webauthn;

use crate::state::AppState;
use axum::http::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::Router;
use time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tower_sessions::cookie::SameSite;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::SqliteStore;

/// Assemble the application: routes, cookie sessions, CORS and tracing.
///
/// Cookie sessions share the application's SQLite pool; their table is
/// created here if missing.
pub async fn build_app(state: AppState) -> anyhow::Result<Router> {
    let session_store = SqliteStore::new(state.db.clone());
    session_store.migrate().await?;

    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(state.rp.origin.starts_with("https://"))
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(Duration::hours(state.session_ttl_hours)));

    // Credentialed requests only from the RP origin
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_str(&state.rp.origin)?)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    Ok(handlers::router(state)
        .layer(session_layer)
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}
