//! Listing, renaming and deleting a user's passkeys.
//!
//! Every operation is scoped to the calling user; a credential owned by
//! someone else behaves exactly like one that does not exist.

use super::types::CredentialSummary;
use crate::db::credentials;
use crate::error::{AppError, AppResult};
use sqlx::SqlitePool;

/// Longest accepted passkey label, in characters
pub const MAX_NAME_CHARS: usize = 100;

/// Trim a passkey label and check it is 1..=100 characters.
pub fn normalize_credential_name(name: &str) -> AppResult<String> {
    let trimmed = name.trim();
    let length = trimmed.chars().count();

    if length == 0 {
        return Err(AppError::InvalidName("Passkey name must not be empty".to_string()));
    }
    if length > MAX_NAME_CHARS {
        return Err(AppError::InvalidName(format!(
            "Passkey name must be at most {} characters",
            MAX_NAME_CHARS
        )));
    }

    Ok(trimmed.to_string())
}

pub async fn list_credentials(db: &SqlitePool, user_id: &str) -> AppResult<Vec<CredentialSummary>> {
    let stored = credentials::find_by_user_id(db, user_id).await?;
    Ok(stored.into_iter().map(CredentialSummary::from).collect())
}

pub async fn rename_credential(
    db: &SqlitePool,
    user_id: &str,
    id: &str,
    name: &str,
) -> AppResult<CredentialSummary> {
    let name = normalize_credential_name(name)?;

    let updated = credentials::rename(db, user_id, id, &name)
        .await?
        .ok_or_else(|| AppError::NotFound("Passkey not found".to_string()))?;

    tracing::info!(user_id = %user_id, credential = %id, "Passkey renamed");
    Ok(CredentialSummary::from(updated))
}

/// Delete one passkey. Deleting the last one is allowed.
pub async fn delete_credential(db: &SqlitePool, user_id: &str, id: &str) -> AppResult<()> {
    if !credentials::delete(db, user_id, id).await? {
        return Err(AppError::NotFound("Passkey not found".to_string()));
    }

    tracing::info!(user_id = %user_id, credential = %id, "Passkey deleted");
    Ok(())
}
