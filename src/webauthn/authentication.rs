//! # Passkey Authentication Logic
//!
//! Logging in by email with a registered passkey.
//!
//! ## Verify order
//! 1. Resolve the user by email
//! 2. Consume the pending challenge
//! 3. Find the presented credential among the user's own
//! 4. Check client data, authenticator data and the signature
//! 5. Reject counter regressions (possible cloned authenticator)
//! 6. Advance the counter with a compare-and-set
//!
//! Steps 2 and 6 are single statements, so two concurrent completions of the
//! same ceremony cannot both succeed.

use super::authenticator_data::{check_authenticator_data, parse_authenticator_data, sign_count};
use super::client_data::verify_client_data;
use super::cose::CosePublicKey;
use super::relying_party::RelyingParty;
use super::types::*;
use super::{decode_base64url, encode_base64url, random_base64url, sha256, CHALLENGE_BYTES};
use crate::db::models::{ChallengeType, Credential};
use crate::db::{challenges, credentials, users};
use crate::error::{AppError, AppResult};
use passkey_types::ctap2::Flags;
use passkey_types::webauthn::{ClientDataType, PublicKeyCredentialType};
use serde::Serialize;
use sqlx::SqlitePool;

/// Request options plus the user they were issued for
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationOptions {
    #[serde(flatten)]
    pub options: RequestOptions,
    pub user_id: String,
}

#[derive(Debug, Clone)]
pub struct VerifiedAuthentication {
    pub user_id: String,
    pub email: String,
    /// Server id of the credential that signed
    pub credential_id: String,
    pub new_counter: u32,
}

/// What the signature check learned from the authenticator data
#[derive(Debug, Clone, Copy)]
pub struct AssertionOutcome {
    pub sign_count: u32,
    pub backed_up: bool,
}

/// Start a login for the user behind `email`
///
/// ## Errors
/// - UserNotFound: no account with this email
/// - NoCredentialsRegistered: the account has no passkeys
pub async fn begin_authentication(
    db: &SqlitePool,
    rp: &RelyingParty,
    email: &str,
) -> AppResult<AuthenticationOptions> {
    let user = users::find_by_email(db, email).await?.ok_or(AppError::UserNotFound)?;

    let stored = credentials::find_by_user_id(db, &user.id).await?;
    if stored.is_empty() {
        return Err(AppError::NoCredentialsRegistered);
    }

    let challenge = random_base64url(CHALLENGE_BYTES)?;
    challenges::replace_challenge(db, &user.id, ChallengeType::Authentication, &challenge).await?;

    tracing::debug!(user_id = %user.id, credentials = stored.len(), "Authentication options issued");

    Ok(AuthenticationOptions {
        options: RequestOptions {
            challenge,
            timeout: rp.timeout_ms,
            rp_id: rp.id.clone(),
            allow_credentials: stored.iter().map(CredentialDescriptor::from).collect(),
            user_verification: rp.user_verification,
        },
        user_id: user.id,
    })
}

/// Finish a login and return the user it proves
pub async fn complete_authentication(
    db: &SqlitePool,
    rp: &RelyingParty,
    email: &str,
    response: &AuthenticationResponseJson,
) -> AppResult<VerifiedAuthentication> {
    let user = users::find_by_email(db, email).await?.ok_or(AppError::UserNotFound)?;

    let challenge = challenges::consume_challenge(db, &user.id, ChallengeType::Authentication).await?;

    // Stored ids are canonical unpadded base64url
    let presented_id = decode_base64url(&response.id)
        .map(|bytes| encode_base64url(&bytes))
        .ok_or(AppError::CredentialNotFound)?;
    let credential = credentials::find_for_user(db, &user.id, &presented_id).await?;

    let outcome = verify_assertion(
        rp,
        &challenge.challenge,
        &credential,
        user.webauthn_user_handle.as_deref(),
        response,
    )?;

    if let Err(e) = check_counter(credential.counter, outcome.sign_count) {
        tracing::warn!(
            user_id = %user.id,
            credential = %credential.id,
            stored = credential.counter,
            presented = outcome.sign_count,
            "Signature counter did not advance, possible cloned authenticator"
        );
        return Err(e);
    }

    let advanced = credentials::update_counter(
        db,
        &credential.id,
        credential.counter,
        outcome.sign_count,
        outcome.backed_up,
    )
    .await?;
    if !advanced {
        return Err(AppError::verification("credential was used concurrently"));
    }

    tracing::info!(user_id = %user.id, credential = %credential.id, "Passkey authentication succeeded");

    Ok(VerifiedAuthentication {
        user_id: user.id,
        email: user.email,
        credential_id: credential.id,
        new_counter: outcome.sign_count,
    })
}

/// Check an assertion against the challenge and the stored credential.
pub fn verify_assertion(
    rp: &RelyingParty,
    expected_challenge: &str,
    credential: &Credential,
    user_handle: Option<&str>,
    response: &AuthenticationResponseJson,
) -> AppResult<AssertionOutcome> {
    if response.type_ != PublicKeyCredentialType::PublicKey {
        return Err(AppError::verification("credential type is not public-key"));
    }
    let presented_id = decode_base64url(&response.id)
        .ok_or_else(|| AppError::verification("credential id is not base64url"))?;
    if decode_base64url(&response.raw_id).as_deref() != Some(presented_id.as_slice()) {
        return Err(AppError::verification("id and rawId differ"));
    }
    if decode_base64url(&credential.credential_id).as_deref() != Some(presented_id.as_slice()) {
        return Err(AppError::verification("assertion is for a different credential"));
    }

    let client_data_json = decode_base64url(&response.response.client_data_json)
        .ok_or_else(|| AppError::verification("clientDataJSON is not base64url"))?;
    verify_client_data(&client_data_json, ClientDataType::Get, expected_challenge, &rp.origin)?;

    let auth_data_bytes = decode_base64url(&response.response.authenticator_data)
        .ok_or_else(|| AppError::verification("authenticatorData is not base64url"))?;
    let auth_data = parse_authenticator_data(&auth_data_bytes)?;
    check_authenticator_data(rp, &auth_data)?;

    if let Some(presented) = response.response.user_handle.as_deref().filter(|h| !h.is_empty()) {
        let expected = user_handle.and_then(decode_base64url);
        if expected.is_none() || decode_base64url(presented) != expected {
            return Err(AppError::verification("userHandle does not belong to this user"));
        }
    }

    let public_key = decode_base64url(&credential.public_key)
        .ok_or_else(|| AppError::Internal(format!("Stored public key of {} is corrupt", credential.id)))?;
    let key = CosePublicKey::from_slice(&public_key)?;

    let signature = decode_base64url(&response.response.signature)
        .ok_or_else(|| AppError::verification("signature is not base64url"))?;

    let mut signed = auth_data_bytes;
    signed.extend_from_slice(&sha256(&client_data_json));
    key.verify(&signed, &signature)?;

    Ok(AssertionOutcome {
        sign_count: sign_count(&auth_data),
        backed_up: auth_data.flags.contains(Flags::BS),
    })
}

/// The counter must strictly increase, unless the authenticator does not
/// implement one at all (both zero).
pub fn check_counter(stored: i64, presented: u32) -> AppResult<()> {
    let presented = i64::from(presented);
    if presented > stored || (presented == 0 && stored == 0) {
        Ok(())
    } else {
        Err(AppError::verification(format!(
            "signature counter {} is not above stored {}",
            presented, stored
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn rp() -> RelyingParty {
        RelyingParty::new("Predictor", "localhost", "http://localhost:8080").unwrap()
    }

    #[test]
    fn test_counter_policy() {
        assert!(check_counter(0, 0).is_ok());
        assert!(check_counter(0, 1).is_ok());
        assert!(check_counter(5, 6).is_ok());
        assert!(matches!(check_counter(5, 5), Err(AppError::VerificationFailed(_))));
        assert!(matches!(check_counter(5, 4), Err(AppError::VerificationFailed(_))));
        assert!(matches!(check_counter(5, 0), Err(AppError::VerificationFailed(_))));
    }

    #[tokio::test]
    async fn test_unknown_user_and_no_credentials_are_distinct() {
        let pool = test_pool().await;
        users::create_user(&pool, "fan@example.com").await.unwrap();

        assert!(matches!(
            begin_authentication(&pool, &rp(), "nobody@example.com").await,
            Err(AppError::UserNotFound)
        ));
        assert!(matches!(
            begin_authentication(&pool, &rp(), "fan@example.com").await,
            Err(AppError::NoCredentialsRegistered)
        ));
    }
}
