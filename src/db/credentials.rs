//! # Credential Database Operations
//!
//! CRUD for passkey credentials. Every lookup that serves a request is scoped
//! by the owning user id.
//!
//! ## Security Note
//! Only public keys are stored - private keys never leave the user's device.

use crate::db::models::{Credential, NewCredential};
use crate::error::{AppError, AppResult};
use sqlx::types::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Save a new passkey credential after successful registration
///
/// A protocol credential id that already exists (for any user) is rejected as
/// bad input rather than surfacing as a storage failure.
pub async fn insert_credential(pool: &SqlitePool, new: NewCredential) -> AppResult<Credential> {
    let now = crate::db::now();

    let credential = Credential {
        id: Uuid::new_v4().to_string(),
        user_id: new.user_id,
        credential_id: new.credential_id,
        public_key: new.public_key,
        counter: i64::from(new.counter),
        device_type: new.device_type,
        backed_up: new.backed_up,
        transports: Json(new.transports),
        aaguid: new.aaguid,
        credential_name: new.credential_name,
        last_used_at: None,
        created_at: now.clone(),
        updated_at: now,
    };

    sqlx::query(
        "INSERT INTO credentials
         (id, user_id, credential_id, public_key, counter, device_type, backed_up,
          transports, aaguid, credential_name, last_used_at, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, ?, ?)",
    )
    .bind(&credential.id)
    .bind(&credential.user_id)
    .bind(&credential.credential_id)
    .bind(&credential.public_key)
    .bind(credential.counter)
    .bind(credential.device_type)
    .bind(credential.backed_up)
    .bind(&credential.transports)
    .bind(&credential.aaguid)
    .bind(&credential.credential_name)
    .bind(&credential.created_at)
    .bind(&credential.updated_at)
    .execute(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            AppError::BadRequest("This passkey is already registered".to_string())
        }
        _ => AppError::Database(e),
    })?;

    Ok(credential)
}

/// All credentials of a user, newest first. Empty when there are none.
pub async fn find_by_user_id(pool: &SqlitePool, user_id: &str) -> AppResult<Vec<Credential>> {
    let credentials = sqlx::query_as::<_, Credential>(
        "SELECT * FROM credentials WHERE user_id = ? ORDER BY created_at DESC, id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(credentials)
}

/// Look up a credential by its protocol id, only among the user's own.
///
/// A credential id that exists but belongs to someone else is reported the
/// same way as one that does not exist at all.
pub async fn find_for_user(
    pool: &SqlitePool,
    user_id: &str,
    credential_id: &str,
) -> AppResult<Credential> {
    sqlx::query_as::<_, Credential>(
        "SELECT * FROM credentials WHERE user_id = ? AND credential_id = ?",
    )
    .bind(user_id)
    .bind(credential_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::CredentialNotFound)
}

/// Store a new signature counter, but only if nobody changed it since `expected`.
///
/// This is a compare-and-set: two concurrent authentications that both read
/// the same stored counter cannot both succeed. Returns `false` when the row
/// was modified (or removed) in between.
pub async fn update_counter(
    pool: &SqlitePool,
    id: &str,
    expected: i64,
    new_counter: u32,
    backed_up: bool,
) -> AppResult<bool> {
    let now = crate::db::now();

    let updated = sqlx::query(
        "UPDATE credentials
         SET counter = ?, backed_up = ?, last_used_at = ?, updated_at = ?
         WHERE id = ? AND counter = ?",
    )
    .bind(i64::from(new_counter))
    .bind(backed_up)
    .bind(&now)
    .bind(&now)
    .bind(id)
    .bind(expected)
    .execute(pool)
    .await?
    .rows_affected();

    Ok(updated == 1)
}

/// Set the label of a credential the user owns. `None` if not found / not owned.
pub async fn rename(
    pool: &SqlitePool,
    user_id: &str,
    id: &str,
    name: &str,
) -> AppResult<Option<Credential>> {
    let credential = sqlx::query_as::<_, Credential>(
        "UPDATE credentials SET credential_name = ?, updated_at = ?
         WHERE id = ? AND user_id = ?
         RETURNING *",
    )
    .bind(name)
    .bind(crate::db::now())
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(credential)
}

/// Delete one credential the user owns. Returns whether a row was removed.
pub async fn delete(pool: &SqlitePool, user_id: &str, id: &str) -> AppResult<bool> {
    let deleted = sqlx::query("DELETE FROM credentials WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?
        .rows_affected();

    Ok(deleted == 1)
}
