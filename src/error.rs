//! # Error Handling
//!
//! Application-wide error type and its conversion into HTTP responses.
//!
//! Ceremony failures are recovered here, at the endpoint boundary, and mapped
//! onto a small taxonomy:
//! - **401** caller is not logged in
//! - **404** user, challenge or credential absent, expired or not owned
//! - **400** malformed input, invalid names, failed verification
//! - **500** storage or session-minting failures
//!
//! Detailed causes for verification, storage and session failures are logged
//! server-side; the client only ever sees a generic message.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Message shared by "unknown user" and "no passkeys" so the HTTP surface does
/// not tell the two apart.
const NO_PASSKEY_MESSAGE: &str = "No passkeys registered for this account";

/// Application-wide error type
///
/// `#[from]` lets `?` convert sqlx and serde_json errors directly.
#[derive(Error, Debug)]
pub enum AppError {
    /// Persistence layer failure (the `StorageFailed` case)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    /// No user matches the email given to the authentication ceremony
    #[error("User not found")]
    UserNotFound,

    /// The user exists but has no passkeys to authenticate with
    #[error("No passkeys registered for this user")]
    NoCredentialsRegistered,

    /// No unexpired challenge of the expected type for the user
    #[error("Challenge not found or expired")]
    ChallengeNotFound,

    /// The presented credential id is unknown for the resolved user
    #[error("Credential not found")]
    CredentialNotFound,

    /// Cryptographic or ceremony-policy mismatch. The detail is for logs only.
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    /// Passkey label outside 1..=100 characters after trimming
    #[error("Invalid passkey name: {0}")]
    InvalidName(String),

    /// The identity provider could not issue or redeem a sign-in artifact
    #[error("Session creation failed: {0}")]
    SessionFailed(String),
}

impl AppError {
    /// Shorthand for ceremony checks that fail verification.
    pub fn verification(detail: impl Into<String>) -> Self {
        AppError::VerificationFailed(detail.into())
    }
}

/// Convert AppError into an HTTP response
///
/// Each variant maps to a status code and a user-facing message. Variants that
/// could leak internals (database, verification detail, identity provider
/// responses) are logged and replaced by a generic message.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }
            AppError::Serialization(e) => {
                tracing::error!("Serialization error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Serialization error".to_string())
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::VerificationFailed(detail) => {
                tracing::warn!(reason = %detail, "Passkey verification failed");
                (StatusCode::BAD_REQUEST, "Passkey verification failed".to_string())
            }
            AppError::SessionFailed(detail) => {
                tracing::error!(reason = %detail, "Failed to mint session");
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create session".to_string())
            }
            AppError::UserNotFound | AppError::NoCredentialsRegistered => {
                tracing::debug!(reason = %self, "Passkey authentication options refused");
                (StatusCode::NOT_FOUND, NO_PASSKEY_MESSAGE.to_string())
            }
            AppError::ChallengeNotFound | AppError::CredentialNotFound => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::InvalidName(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Malformed or non-JSON request bodies are client errors, not 422s.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;
