//! # Database Models
//!
//! Row types for the `users`, `credentials` and `challenges` tables.
//!
//! Timestamps are stored as fixed-width RFC3339 strings (see
//! [`crate::db::timestamp`]) and kept as `String` here, which keeps them
//! comparable inside SQL and trivially serializable.

use chrono::Utc;
use passkey_types::webauthn::AuthenticatorTransport;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

/// Challenge lifetime: options handed out now can be completed for 5 minutes.
pub const CHALLENGE_TTL_MINUTES: i64 = 5;

/// User account mirrored from the identity provider
///
/// The `webauthn_user_handle` is a random opaque value handed to
/// authenticators as the WebAuthn user id, so neither the email nor the
/// application id ever ends up stored on a device.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub webauthn_user_handle: Option<String>,
    pub last_login: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn new(email: String) -> Self {
        let now = crate::db::now();

        Self {
            id: Uuid::new_v4().to_string(),
            email,
            webauthn_user_handle: None,
            last_login: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Whether a credential is bound to one device or synced between devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "camelCase")]
#[sqlx(rename_all = "camelCase")]
pub enum DeviceType {
    SingleDevice,
    MultiDevice,
}

/// Passkey credential stored for a user
///
/// Only the public key is stored; the private key never leaves the
/// authenticator.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Credential {
    /// Server-generated UUID, used in management URLs
    pub id: String,

    pub user_id: String,

    /// Protocol credential id, base64url; unique across all users
    pub credential_id: String,

    /// COSE_Key bytes, base64url
    pub public_key: String,

    /// Signature counter. Never written lower than the stored value.
    pub counter: i64,

    pub device_type: DeviceType,
    pub backed_up: bool,
    pub transports: Json<Vec<AuthenticatorTransport>>,
    pub aaguid: Option<String>,
    pub credential_name: Option<String>,
    pub last_used_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields needed to insert a freshly verified credential
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub user_id: String,
    pub credential_id: String,
    pub public_key: String,
    pub counter: u32,
    pub device_type: DeviceType,
    pub backed_up: bool,
    pub transports: Vec<AuthenticatorTransport>,
    pub aaguid: Option<String>,
    pub credential_name: Option<String>,
}

/// Which ceremony a challenge belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ChallengeType {
    Registration,
    Authentication,
}

/// A single-use ceremony challenge
///
/// ## Challenge Lifecycle
/// 1. A ceremony's "options" step stores it, replacing older ones of the same type
/// 2. The client's authenticator signs over it
/// 3. The "verify" step deletes it atomically before checking anything else
/// 4. Abandoned challenges expire and are swept by the cleanup task
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Challenge {
    pub id: String,
    pub user_id: String,

    /// base64url of 32 random bytes, exactly as sent to the client
    pub challenge: String,

    #[sqlx(rename = "type")]
    pub challenge_type: ChallengeType,

    pub created_at: String,
    pub expires_at: String,
}

impl Challenge {
    pub fn new(user_id: String, challenge: String, challenge_type: ChallengeType) -> Self {
        let now = Utc::now();
        let expires = now + chrono::Duration::minutes(CHALLENGE_TTL_MINUTES);

        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            challenge,
            challenge_type,
            created_at: crate::db::timestamp(now),
            expires_at: crate::db::timestamp(expires),
        }
    }
}
