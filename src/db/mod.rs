//! # Database Module
//!
//! - `models`: row types (User, Credential, Challenge)
//! - `users`: user lookups, WebAuthn user handles, last-login stamps
//! - `credentials`: passkey credential CRUD and the counter compare-and-set
//! - `challenges`: single-use ceremony challenges
//! - `identity`: sign-in tokens and sessions of the built-in identity provider
//!
//! All queries here are explicitly scoped by user where ownership matters;
//! there is no row-level security underneath to fall back on.

pub mod challenges;
pub mod credentials;
pub mod identity;
pub mod models;
pub mod users;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

/// Open a connection pool and bring the schema up to date.
///
/// In-memory databases exist per connection, so they get a single-connection
/// pool; everything else gets WAL mode and a busy timeout so concurrent
/// writers queue instead of failing.
pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let in_memory = database_url.contains(":memory:");

    let mut options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5));
    if !in_memory {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let pool = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new().connect_with(options).await?
    };

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Format a timestamp for storage.
///
/// Fixed-width UTC with microseconds, so stored timestamps compare correctly
/// as plain strings inside SQL (`expires_at > ?`, `ORDER BY created_at`).
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time in storage format
pub fn now() -> String {
    timestamp(Utc::now())
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    connect("sqlite::memory:").await.expect("in-memory database")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_sort_lexicographically() {
        let early = Utc::now();
        let late = early + chrono::Duration::milliseconds(1);
        let whole = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        assert!(timestamp(early) < timestamp(late));
        assert_eq!(timestamp(whole), "2024-01-01T00:00:00.000000Z");
    }
}
