//! Storage for the built-in identity provider.
//!
//! Only SHA-256 hashes of sign-in tokens and access tokens are persisted, so a
//! leaked database does not hand out live sessions.

use crate::db::models::User;
use crate::error::AppResult;
use sqlx::SqlitePool;

pub async fn insert_sign_in_token(
    pool: &SqlitePool,
    token_hash: &str,
    user_id: &str,
    expires_at: &str,
) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO sign_in_tokens (token_hash, user_id, created_at, expires_at)
         VALUES (?, ?, ?, ?)",
    )
    .bind(token_hash)
    .bind(user_id)
    .bind(crate::db::now())
    .bind(expires_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Redeem a sign-in token: delete it and return its user in one statement.
pub async fn consume_sign_in_token(pool: &SqlitePool, token_hash: &str) -> AppResult<Option<String>> {
    let user_id = sqlx::query_scalar::<_, String>(
        "DELETE FROM sign_in_tokens
         WHERE token_hash = ? AND expires_at > ?
         RETURNING user_id",
    )
    .bind(token_hash)
    .bind(crate::db::now())
    .fetch_optional(pool)
    .await?;

    Ok(user_id)
}

pub async fn insert_session(
    pool: &SqlitePool,
    token_hash: &str,
    user_id: &str,
    expires_at: &str,
) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO identity_sessions (token_hash, user_id, created_at, expires_at)
         VALUES (?, ?, ?, ?)",
    )
    .bind(token_hash)
    .bind(user_id)
    .bind(crate::db::now())
    .bind(expires_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// The user behind an unexpired access token
pub async fn find_session_user(pool: &SqlitePool, token_hash: &str) -> AppResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT u.* FROM identity_sessions s
         JOIN users u ON u.id = s.user_id
         WHERE s.token_hash = ? AND s.expires_at > ?",
    )
    .bind(token_hash)
    .bind(crate::db::now())
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub async fn delete_session(pool: &SqlitePool, token_hash: &str) -> AppResult<()> {
    sqlx::query("DELETE FROM identity_sessions WHERE token_hash = ?")
        .bind(token_hash)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn cleanup_expired(pool: &SqlitePool) -> AppResult<u64> {
    let now = crate::db::now();

    let tokens = sqlx::query("DELETE FROM sign_in_tokens WHERE expires_at <= ?")
        .bind(&now)
        .execute(pool)
        .await?
        .rows_affected();

    let sessions = sqlx::query("DELETE FROM identity_sessions WHERE expires_at <= ?")
        .bind(&now)
        .execute(pool)
        .await?
        .rows_affected();

    Ok(tokens + sessions)
}
