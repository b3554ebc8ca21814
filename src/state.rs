//! # Application State
//!
//! Shared resources handed to every request handler. Axum clones the state
//! per request, which is cheap: the pool is a handle and the rest is `Arc`.

use crate::config::Config;
use crate::db;
use crate::identity::{self, IdentityProvider};
use crate::webauthn::relying_party::RelyingParty;
use anyhow::Result;
use sqlx::sqlite::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,

    /// Relying Party settings, fixed at start-up
    pub rp: Arc<RelyingParty>,

    /// Mints sessions after a verified passkey login and resolves bearer tokens
    pub identity: Arc<dyn IdentityProvider>,

    /// Inactivity window of the cookie session
    pub session_ttl_hours: i64,
}

impl AppState {
    /// Initialize application state
    ///
    /// Connects to SQLite, runs migrations, validates the RP settings and
    /// builds the configured identity provider.
    ///
    /// # Errors
    /// Fails on an unreachable database, a failed migration, or an RP id that
    /// does not belong to the RP origin.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = db::connect(&config.database_url).await?;
        let rp = RelyingParty::new(&config.rp_name, &config.rp_id, &config.rp_origin)?;
        let identity = identity::from_config(config, db.clone())?;

        Ok(Self::from_parts(db, rp, identity, config.session_ttl_hours))
    }

    pub fn from_parts(
        db: SqlitePool,
        rp: RelyingParty,
        identity: Arc<dyn IdentityProvider>,
        session_ttl_hours: i64,
    ) -> Self {
        AppState {
            db,
            rp: Arc::new(rp),
            identity,
            session_ttl_hours,
        }
    }
}
