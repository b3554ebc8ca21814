//! # Configuration Management
//!
//! Configuration is read once from the environment ("12-factor" style) at
//! process start. Nothing else in the crate reads environment variables.
//!
//! ## Environment Variables
//! - `HOST`, `PORT`: Server bind address (default: 127.0.0.1:8080)
//! - `DATABASE_URL`: SQLite database connection string
//! - `RP_ID`: WebAuthn Relying Party ID (usually your domain)
//! - `RP_ORIGIN`: WebAuthn Relying Party Origin (full URL)
//! - `RP_NAME`: Human-readable name for your service
//! - `SESSION_TTL_HOURS`: Lifetime of cookie and identity sessions (default: 24)
//! - `CHALLENGE_CLEANUP_INTERVAL_SECS`: Expired-challenge sweep period (default: 600)
//! - `IDENTITY_PROVIDER`: `local` (default) or `gotrue`
//! - `IDENTITY_URL`, `IDENTITY_SERVICE_ROLE_KEY`, `IDENTITY_ANON_KEY`: GoTrue
//!   endpoint and the two privileged keys used only by the session bridge

use anyhow::{bail, Context, Result};
use std::env;
use std::fmt;

/// A secret value that never shows up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Which identity collaborator mints sessions.
#[derive(Debug, Clone)]
pub enum IdentityConfig {
    /// Sessions are minted by this server from its own SQLite tables
    Local,
    /// Sessions are minted by a GoTrue-compatible auth server
    GoTrue {
        url: String,
        service_role_key: Secret,
        anon_key: Secret,
    },
}

/// Application configuration
///
/// ## WebAuthn Terminology
/// - **RP (Relying Party)**: the application that relies on authentication
/// - **RP ID**: the domain name (e.g., "example.com" or "localhost")
/// - **RP Origin**: full URL of the application (e.g., "https://example.com")
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,

    /// SQLite database connection URL, e.g. "sqlite:passkey.db?mode=rwc"
    pub database_url: String,

    pub rp_id: String,
    pub rp_origin: String,
    pub rp_name: String,

    /// Cookie session inactivity window and identity session lifetime
    pub session_ttl_hours: i64,

    /// How often the background task deletes expired challenges
    pub challenge_cleanup_interval_secs: u64,

    pub identity: IdentityConfig,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Loads `.env` first if present, then falls back to defaults for anything
    /// unset. Malformed numbers and incomplete GoTrue settings are errors.
    ///
    /// ## Example .env file
    /// ```text
    /// HOST=127.0.0.1
    /// PORT=8080
    /// DATABASE_URL=sqlite:passkey.db?mode=rwc
    /// RP_ID=localhost
    /// RP_ORIGIN=http://localhost:8080
    /// RP_NAME=Tournament Predictor
    /// IDENTITY_PROVIDER=local
    /// ```
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let identity = match env::var("IDENTITY_PROVIDER")
            .unwrap_or_else(|_| "local".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "local" => IdentityConfig::Local,
            "gotrue" => IdentityConfig::GoTrue {
                url: required("IDENTITY_URL")?.trim_end_matches('/').to_string(),
                service_role_key: Secret::new(required("IDENTITY_SERVICE_ROLE_KEY")?),
                anon_key: Secret::new(required("IDENTITY_ANON_KEY")?),
            },
            other => bail!("IDENTITY_PROVIDER must be 'local' or 'gotrue', got '{}'", other),
        };

        let session_ttl_hours: i64 = env::var("SESSION_TTL_HOURS")
            .unwrap_or_else(|_| "24".to_string())
            .parse()
            .context("SESSION_TTL_HOURS must be an integer")?;
        if session_ttl_hours <= 0 {
            bail!("SESSION_TTL_HOURS must be positive");
        }

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),

            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid port number")?,

            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:passkey.db?mode=rwc".to_string()),

            rp_id: env::var("RP_ID").unwrap_or_else(|_| "localhost".to_string()),
            rp_origin: env::var("RP_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            rp_name: env::var("RP_NAME").unwrap_or_else(|_| "Tournament Predictor".to_string()),

            session_ttl_hours,

            challenge_cleanup_interval_secs: env::var("CHALLENGE_CLEANUP_INTERVAL_SECS")
                .unwrap_or_else(|_| "600".to_string())
                .parse()
                .context("CHALLENGE_CLEANUP_INTERVAL_SECS must be an integer")?,

            identity,
        })
    }

    /// Socket address to bind the server to, e.g. "127.0.0.1:8080"
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn required(key: &str) -> Result<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => bail!("{} must be set when IDENTITY_PROVIDER=gotrue", key),
    }
}
