//! # Identity Provider
//!
//! The collaborator that owns user accounts and mints sessions once a passkey
//! login has been verified.
//!
//! A session is minted in two steps: the server asks the provider for a
//! one-time sign-in token for the user, then immediately redeems it with
//! privileged credentials. The token never reaches the client.
//!
//! ## Implementations
//! - `local`: sessions stored in this server's own SQLite database
//! - `gotrue`: a GoTrue-compatible auth server (magic link + verify)

pub mod gotrue;
pub mod local;

use crate::config::{Config, IdentityConfig};
use crate::error::AppResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::fmt;
use std::sync::Arc;

/// One-time artifact that can be exchanged for a session
#[derive(Clone)]
pub struct SignInToken {
    pub token: String,
    /// Verification type to present when redeeming, e.g. "magiclink"
    pub verification_type: String,
}

impl fmt::Debug for SignInToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignInToken")
            .field("token", &"***")
            .field("verification_type", &self.verification_type)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdentityUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Session returned to the client after a successful passkey login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentitySession {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: IdentityUser,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Issue a short-lived, single-use sign-in token for an existing account.
    async fn issue_sign_in_token(&self, email: &str) -> AppResult<SignInToken>;

    /// Exchange a sign-in token for a session. Fails if already redeemed.
    async fn redeem_sign_in_token(&self, token: &SignInToken) -> AppResult<IdentitySession>;

    /// The user behind a bearer access token, if it is valid.
    async fn resolve_access_token(&self, access_token: &str) -> AppResult<Option<IdentityUser>>;

    async fn sign_out(&self, access_token: &str) -> AppResult<()>;

    /// Remove expired tokens and sessions kept by this provider.
    async fn sweep_expired(&self) -> AppResult<u64> {
        Ok(0)
    }
}

/// Build the provider selected in the configuration.
pub fn from_config(config: &Config, db: SqlitePool) -> anyhow::Result<Arc<dyn IdentityProvider>> {
    let session_ttl = chrono::Duration::hours(config.session_ttl_hours);

    let provider: Arc<dyn IdentityProvider> = match &config.identity {
        IdentityConfig::Local => Arc::new(local::LocalIdentityProvider::new(db, session_ttl)),
        IdentityConfig::GoTrue {
            url,
            service_role_key,
            anon_key,
        } => Arc::new(gotrue::GoTrueIdentityProvider::new(
            url,
            service_role_key.clone(),
            anon_key.clone(),
        )?),
    };

    Ok(provider)
}
