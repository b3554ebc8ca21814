//! Session bridge: from a verified passkey login to an identity session.
//!
//! Any failure here aborts the login with `SessionFailed`; a verified
//! ceremony never half-completes into a session. Once a session is minted,
//! later failures sign it out again.

use crate::db::users;
use crate::error::{AppError, AppResult};
use crate::identity::{IdentityProvider, IdentitySession};
use sqlx::SqlitePool;
use std::future::Future;

pub async fn establish_session(
    db: &SqlitePool,
    identity: &dyn IdentityProvider,
    user_id: &str,
    email: &str,
) -> AppResult<IdentitySession> {
    let token = identity
        .issue_sign_in_token(email)
        .await
        .map_err(|e| session_failed("issue sign-in token", e))?;

    let session = identity
        .redeem_sign_in_token(&token)
        .await
        .map_err(|e| session_failed("redeem sign-in token", e))?;

    revoke_on_failure(identity, &session, async {
        if let Some(session_email) = session.user.email.as_deref() {
            if !session_email.eq_ignore_ascii_case(email) {
                return Err(AppError::SessionFailed(format!(
                    "identity session belongs to a different account than user {}",
                    user_id
                )));
            }
        }
        users::touch_last_login(db, user_id).await
    })
    .await?;

    tracing::info!(user_id = %user_id, "Session established");
    Ok(session)
}

/// Run `step` and sign `session` out if it fails.
///
/// The step's error is returned either way; a failed sign-out is only logged.
pub async fn revoke_on_failure<T, F>(
    identity: &dyn IdentityProvider,
    session: &IdentitySession,
    step: F,
) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match step.await {
        Ok(value) => Ok(value),
        Err(e) => {
            if let Err(revoke) = identity.sign_out(&session.access_token).await {
                tracing::warn!(user_id = %session.user.id, "Failed to revoke identity session: {}", revoke);
            }
            Err(e)
        }
    }
}

fn session_failed(step: &str, e: AppError) -> AppError {
    match e {
        AppError::SessionFailed(_) => e,
        other => AppError::SessionFailed(format!("{}: {}", step, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::identity::local::LocalIdentityProvider;
    use crate::identity::{IdentityUser, SignInToken};
    use async_trait::async_trait;

    struct RefusingProvider;

    #[async_trait]
    impl IdentityProvider for RefusingProvider {
        async fn issue_sign_in_token(&self, _email: &str) -> AppResult<SignInToken> {
            Err(AppError::Internal("upstream down".to_string()))
        }

        async fn redeem_sign_in_token(&self, _token: &SignInToken) -> AppResult<IdentitySession> {
            unreachable!("never issued")
        }

        async fn resolve_access_token(&self, _token: &str) -> AppResult<Option<IdentityUser>> {
            Ok(None)
        }

        async fn sign_out(&self, _token: &str) -> AppResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_session_updates_last_login() {
        let pool = test_pool().await;
        let user = users::create_user(&pool, "fan@example.com").await.unwrap();
        let provider = LocalIdentityProvider::new(pool.clone(), chrono::Duration::hours(1));

        let session = establish_session(&pool, &provider, &user.id, &user.email).await.unwrap();
        assert_eq!(session.user.id, user.id);

        let reloaded = users::find_by_id(&pool, &user.id).await.unwrap();
        assert!(reloaded.last_login.is_some());
    }

    #[tokio::test]
    async fn test_failed_step_revokes_minted_session() {
        let pool = test_pool().await;
        let user = users::create_user(&pool, "fan@example.com").await.unwrap();
        let provider = LocalIdentityProvider::new(pool.clone(), chrono::Duration::hours(1));
        let session = establish_session(&pool, &provider, &user.id, &user.email).await.unwrap();

        let result: AppResult<()> = revoke_on_failure(&provider, &session, async {
            Err(AppError::SessionFailed("cookie store unavailable".to_string()))
        })
        .await;

        assert!(matches!(result, Err(AppError::SessionFailed(_))));
        assert!(provider.resolve_access_token(&session.access_token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_successful_step_keeps_session() {
        let pool = test_pool().await;
        let user = users::create_user(&pool, "fan@example.com").await.unwrap();
        let provider = LocalIdentityProvider::new(pool.clone(), chrono::Duration::hours(1));
        let session = establish_session(&pool, &provider, &user.id, &user.email).await.unwrap();

        let value = revoke_on_failure(&provider, &session, async { Ok(7) }).await.unwrap();

        assert_eq!(value, 7);
        assert!(provider.resolve_access_token(&session.access_token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_provider_failure_is_session_failure() {
        let pool = test_pool().await;
        let user = users::create_user(&pool, "fan@example.com").await.unwrap();

        let result = establish_session(&pool, &RefusingProvider, &user.id, &user.email).await;
        assert!(matches!(result, Err(AppError::SessionFailed(_))));

        let reloaded = users::find_by_id(&pool, &user.id).await.unwrap();
        assert!(reloaded.last_login.is_none());
    }
}
