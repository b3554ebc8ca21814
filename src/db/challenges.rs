//! # Challenge Store
//!
//! Challenges are the only ceremony state kept between the "options" and
//! "verify" steps, and they live in the database rather than in process
//! memory, so any server instance can finish a ceremony another one began.
//!
//! ## Guarantees
//! - At most one live challenge per (user, type): storing replaces older ones
//! - Consumption is a single `DELETE ... RETURNING`, so two concurrent
//!   verifications can never both obtain the same challenge
//! - The expiry sweep is idempotent; rows already consumed are not an error

use crate::db::models::{Challenge, ChallengeType};
use crate::error::{AppError, AppResult};
use sqlx::SqlitePool;

/// Store a fresh challenge, invalidating any unconsumed one of the same type.
pub async fn replace_challenge(
    pool: &SqlitePool,
    user_id: &str,
    challenge_type: ChallengeType,
    challenge_value: &str,
) -> AppResult<Challenge> {
    let challenge = Challenge::new(user_id.to_string(), challenge_value.to_string(), challenge_type);

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM challenges WHERE user_id = ? AND type = ?")
        .bind(user_id)
        .bind(challenge_type)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "INSERT INTO challenges (id, user_id, challenge, type, created_at, expires_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&challenge.id)
    .bind(&challenge.user_id)
    .bind(&challenge.challenge)
    .bind(challenge.challenge_type)
    .bind(&challenge.created_at)
    .bind(&challenge.expires_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(challenge)
}

/// Atomically fetch and delete the newest unexpired challenge of a type.
///
/// Fails with `ChallengeNotFound` when there is none, including when it was
/// already consumed by a concurrent request or has expired.
pub async fn consume_challenge(
    pool: &SqlitePool,
    user_id: &str,
    challenge_type: ChallengeType,
) -> AppResult<Challenge> {
    let consumed = sqlx::query_as::<_, Challenge>(
        "DELETE FROM challenges
         WHERE id = (
             SELECT id FROM challenges
             WHERE user_id = ? AND type = ? AND expires_at > ?
             ORDER BY created_at DESC
             LIMIT 1
         )
         RETURNING *",
    )
    .bind(user_id)
    .bind(challenge_type)
    .bind(crate::db::now())
    .fetch_optional(pool)
    .await?;

    consumed.ok_or(AppError::ChallengeNotFound)
}

/// Delete every expired challenge and report how many rows went away.
pub async fn cleanup_expired_challenges(pool: &SqlitePool) -> AppResult<u64> {
    let deleted = sqlx::query("DELETE FROM challenges WHERE expires_at <= ?")
        .bind(crate::db::now())
        .execute(pool)
        .await?
        .rows_affected();

    Ok(deleted)
}
