//! Background sweep of expired ceremony state.
//!
//! Abandoned ceremonies leave challenges behind; the identity provider may
//! also keep expired sign-in tokens and sessions. Both are deleted here.
//! A row already consumed by a ceremony is simply not counted.

use crate::db::challenges;
use crate::error::AppResult;
use crate::identity::IdentityProvider;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

/// Run the cleanup loop forever, sweeping every `interval`.
pub async fn run_cleanup_loop(db: SqlitePool, identity: Arc<dyn IdentityProvider>, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;

        tracing::debug!("Running expired challenge cleanup");
        if let Err(e) = sweep(&db, identity.as_ref()).await {
            tracing::error!(error = %e, "Cleanup job failed");
        }
    }
}

/// Delete expired challenges and identity artifacts. Returns how many rows
/// went away; running it again immediately returns 0.
pub async fn sweep(db: &SqlitePool, identity: &dyn IdentityProvider) -> AppResult<u64> {
    let challenges = challenges::cleanup_expired_challenges(db).await?;
    let identity_rows = identity.sweep_expired().await?;

    if challenges + identity_rows > 0 {
        tracing::info!(challenges, identity = identity_rows, "Cleanup job completed");
    }

    Ok(challenges + identity_rows)
}
