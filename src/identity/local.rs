//! Identity provider backed by this server's own database.
//!
//! Sign-in tokens and access tokens are random 32-byte values; only their
//! SHA-256 is stored.

use super::{IdentityProvider, IdentitySession, IdentityUser, SignInToken};
use crate::db::{identity, users};
use crate::error::{AppError, AppResult};
use crate::webauthn::{encode_base64url, random_base64url, sha256};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::SqlitePool;

/// How long a sign-in token can wait before being redeemed
pub const SIGN_IN_TOKEN_TTL_SECS: i64 = 60;

const TOKEN_BYTES: usize = 32;

pub struct LocalIdentityProvider {
    db: SqlitePool,
    session_ttl: Duration,
}

impl LocalIdentityProvider {
    pub fn new(db: SqlitePool, session_ttl: Duration) -> Self {
        Self { db, session_ttl }
    }

    /// First session for `email`, creating the account if needed.
    ///
    /// Lets an operator sign in before any passkey exists; see the
    /// `bootstrap` subcommand.
    pub async fn bootstrap(&self, email: &str) -> AppResult<IdentitySession> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::BadRequest(format!("'{}' is not an email address", email)));
        }
        if users::find_by_email(&self.db, email).await?.is_none() {
            let user = users::create_user(&self.db, email).await?;
            tracing::info!(user_id = %user.id, "Account created by bootstrap");
        }

        let token = self.issue_sign_in_token(email).await?;
        self.redeem_sign_in_token(&token).await
    }
}

fn token_hash(token: &str) -> String {
    encode_base64url(&sha256(token.as_bytes()))
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn issue_sign_in_token(&self, email: &str) -> AppResult<SignInToken> {
        let user = users::find_by_email(&self.db, email)
            .await?
            .ok_or_else(|| AppError::SessionFailed(format!("No account for '{}'", email)))?;

        let token = random_base64url(TOKEN_BYTES)?;
        let expires_at = crate::db::timestamp(Utc::now() + Duration::seconds(SIGN_IN_TOKEN_TTL_SECS));
        identity::insert_sign_in_token(&self.db, &token_hash(&token), &user.id, &expires_at).await?;

        Ok(SignInToken {
            token,
            verification_type: "magiclink".to_string(),
        })
    }

    async fn redeem_sign_in_token(&self, token: &SignInToken) -> AppResult<IdentitySession> {
        let user_id = identity::consume_sign_in_token(&self.db, &token_hash(&token.token))
            .await?
            .ok_or_else(|| AppError::SessionFailed("Sign-in token invalid or expired".to_string()))?;
        let user = users::find_by_id(&self.db, &user_id).await?;

        let access_token = random_base64url(TOKEN_BYTES)?;
        let expires = Utc::now() + self.session_ttl;
        identity::insert_session(
            &self.db,
            &token_hash(&access_token),
            &user.id,
            &crate::db::timestamp(expires),
        )
        .await?;

        Ok(IdentitySession {
            access_token,
            token_type: "bearer".to_string(),
            expires_in: self.session_ttl.num_seconds(),
            expires_at: Some(expires.timestamp()),
            refresh_token: None,
            user: IdentityUser {
                id: user.id,
                email: Some(user.email),
            },
        })
    }

    async fn resolve_access_token(&self, access_token: &str) -> AppResult<Option<IdentityUser>> {
        let user = identity::find_session_user(&self.db, &token_hash(access_token)).await?;

        Ok(user.map(|u| IdentityUser {
            id: u.id,
            email: Some(u.email),
        }))
    }

    async fn sign_out(&self, access_token: &str) -> AppResult<()> {
        identity::delete_session(&self.db, &token_hash(access_token)).await
    }

    async fn sweep_expired(&self) -> AppResult<u64> {
        identity::cleanup_expired(&self.db).await
    }
}
