use crate::db::models::User;
use crate::error::{AppError, AppResult};
use sqlx::SqlitePool;

pub async fn create_user(pool: &SqlitePool, email: &str) -> AppResult<User> {
    let user = User::new(email.trim().to_string());

    sqlx::query(
        "INSERT INTO users (id, email, webauthn_user_handle, last_login, created_at, updated_at)
         VALUES (?, ?, NULL, NULL, ?, ?)",
    )
    .bind(&user.id)
    .bind(&user.email)
    .bind(&user.created_at)
    .bind(&user.updated_at)
    .execute(pool)
    .await?;

    Ok(user)
}

/// Email lookup, case-insensitive. `None` when nobody has that address.
pub async fn find_by_email(pool: &SqlitePool, email: &str) -> AppResult<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ? COLLATE NOCASE")
        .bind(email.trim())
        .fetch_optional(pool)
        .await?;

    Ok(user)
}

pub async fn find_by_id(pool: &SqlitePool, user_id: &str) -> AppResult<User> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => AppError::NotFound(format!("User with id '{}' not found", user_id)),
            _ => AppError::Database(e),
        })?;

    Ok(user)
}

/// Return the user's WebAuthn handle, persisting `candidate` if none exists yet.
///
/// The write only succeeds while the column is still NULL, so two concurrent
/// registrations converge on whichever handle landed first.
pub async fn ensure_user_handle(pool: &SqlitePool, user_id: &str, candidate: &str) -> AppResult<String> {
    sqlx::query(
        "UPDATE users SET webauthn_user_handle = ?, updated_at = ?
         WHERE id = ? AND webauthn_user_handle IS NULL",
    )
    .bind(candidate)
    .bind(crate::db::now())
    .bind(user_id)
    .execute(pool)
    .await?;

    let user = find_by_id(pool, user_id).await?;
    user.webauthn_user_handle
        .ok_or_else(|| AppError::Internal(format!("User handle missing for '{}'", user_id)))
}

pub async fn touch_last_login(pool: &SqlitePool, user_id: &str) -> AppResult<()> {
    let now = crate::db::now();

    sqlx::query("UPDATE users SET last_login = ?, updated_at = ? WHERE id = ?")
        .bind(&now)
        .bind(&now)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn test_find_by_email_is_case_insensitive() {
        let pool = test_pool().await;
        let user = create_user(&pool, "Alice@Example.com").await.unwrap();

        let found = find_by_email(&pool, "alice@example.COM ").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(find_by_email(&pool, "bob@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_user_handle_is_set_once() {
        let pool = test_pool().await;
        let user = create_user(&pool, "carol@example.com").await.unwrap();

        let first = ensure_user_handle(&pool, &user.id, "handle-one").await.unwrap();
        let second = ensure_user_handle(&pool, &user.id, "handle-two").await.unwrap();

        assert_eq!(first, "handle-one");
        assert_eq!(second, "handle-one");
    }

    #[tokio::test]
    async fn test_touch_last_login() {
        let pool = test_pool().await;
        let user = create_user(&pool, "dave@example.com").await.unwrap();
        assert!(user.last_login.is_none());

        touch_last_login(&pool, &user.id).await.unwrap();

        let reloaded = find_by_id(&pool, &user.id).await.unwrap();
        assert!(reloaded.last_login.is_some());
    }
}
