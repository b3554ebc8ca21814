//! # Passkey Registration Logic
//!
//! Binds a new authenticator to an already logged-in user.
//!
//! ## Registration Flow
//! 1. **Options**: make sure the user has a WebAuthn handle, store a fresh
//!    challenge, describe what kind of credential we want
//! 2. **Verify**: consume the challenge, check the attestation response,
//!    store the public key
//!
//! The attestation statement itself is not evaluated: options request
//! conveyance `none`, so only the authenticator data is trusted, and only
//! after the client data proves it answers our challenge.

use super::attestation::AttestationObject;
use super::authenticator_data::{check_authenticator_data, device_type, sign_count};
use super::client_data::verify_client_data;
use super::cose::{encode_key, CosePublicKey};
use super::management::normalize_credential_name;
use super::relying_party::RelyingParty;
use super::types::*;
use super::{decode_base64url, encode_base64url, random_base64url, CHALLENGE_BYTES, USER_HANDLE_BYTES};
use crate::db::models::{ChallengeType, Credential, DeviceType, NewCredential};
use crate::db::{challenges, credentials, users};
use crate::error::{AppError, AppResult};
use coset::iana::EnumI64;
use passkey_types::ctap2::Flags;
use passkey_types::webauthn::{
    AttestationConveyancePreference, AuthenticatorTransport, ClientDataType, PublicKeyCredentialType,
    ResidentKeyRequirement,
};
use sqlx::SqlitePool;
use uuid::Uuid;

/// What a valid attestation response yields, ready to be stored
#[derive(Debug, Clone)]
pub struct VerifiedRegistration {
    pub credential_id: String,
    pub public_key: String,
    pub counter: u32,
    pub device_type: DeviceType,
    pub backed_up: bool,
    pub transports: Vec<AuthenticatorTransport>,
    pub aaguid: String,
    pub format: String,
}

/// Start registering a passkey for a logged-in user
///
/// Creates the user's WebAuthn handle on first use, excludes the
/// credentials they already have, and replaces any pending registration
/// challenge with a new one.
pub async fn begin_registration(
    db: &SqlitePool,
    rp: &RelyingParty,
    user_id: &str,
    email: &str,
) -> AppResult<CreationOptions> {
    let candidate = random_base64url(USER_HANDLE_BYTES)?;
    let user_handle = users::ensure_user_handle(db, user_id, &candidate).await?;

    let existing = credentials::find_by_user_id(db, user_id).await?;

    let challenge = random_base64url(CHALLENGE_BYTES)?;
    challenges::replace_challenge(db, user_id, ChallengeType::Registration, &challenge).await?;

    tracing::debug!(user_id = %user_id, excluded = existing.len(), "Registration options issued");

    Ok(CreationOptions {
        rp: RpEntity {
            name: rp.name.clone(),
            id: rp.id.clone(),
        },
        user: UserEntity {
            id: user_handle,
            name: email.to_string(),
            display_name: email.to_string(),
        },
        challenge,
        pub_key_cred_params: rp
            .algorithms
            .iter()
            .map(|alg| PubKeyCredParam {
                alg: alg.to_i64(),
                type_: PublicKeyCredentialType::PublicKey,
            })
            .collect(),
        timeout: rp.timeout_ms,
        attestation: AttestationConveyancePreference::None,
        exclude_credentials: existing.iter().map(CredentialDescriptor::from).collect(),
        authenticator_selection: AuthenticatorSelection {
            resident_key: ResidentKeyRequirement::Preferred,
            require_resident_key: false,
            user_verification: rp.user_verification,
        },
        extensions: RegistrationExtensions { cred_props: true },
    })
}

/// Finish registration and store the new credential
///
/// The pending challenge is consumed before anything is verified, so a
/// failed attempt needs fresh options. A blank name is stored as no name.
///
/// ## Errors
/// - InvalidName: label longer than 100 characters
/// - ChallengeNotFound: no pending registration, or it expired
/// - VerificationFailed: the response does not answer our challenge
/// - BadRequest: the credential id is already registered
pub async fn complete_registration(
    db: &SqlitePool,
    rp: &RelyingParty,
    user_id: &str,
    response: &RegistrationResponseJson,
    credential_name: Option<&str>,
) -> AppResult<Credential> {
    let credential_name = match credential_name {
        Some(name) if !name.trim().is_empty() => Some(normalize_credential_name(name)?),
        _ => None,
    };

    let challenge = challenges::consume_challenge(db, user_id, ChallengeType::Registration).await?;

    let verified = verify_registration(rp, &challenge.challenge, response)?;

    let credential = credentials::insert_credential(
        db,
        NewCredential {
            user_id: user_id.to_string(),
            credential_id: verified.credential_id,
            public_key: verified.public_key,
            counter: verified.counter,
            device_type: verified.device_type,
            backed_up: verified.backed_up,
            transports: verified.transports,
            aaguid: Some(verified.aaguid),
            credential_name,
        },
    )
    .await?;

    tracing::info!(
        user_id = %user_id,
        credential = %credential.id,
        format = %verified.format,
        device_type = ?credential.device_type,
        "Passkey registered"
    );

    Ok(credential)
}

/// Check an attestation response against the challenge it must answer.
pub fn verify_registration(
    rp: &RelyingParty,
    expected_challenge: &str,
    response: &RegistrationResponseJson,
) -> AppResult<VerifiedRegistration> {
    if response.type_ != PublicKeyCredentialType::PublicKey {
        return Err(AppError::verification("credential type is not public-key"));
    }
    let credential_id = decode_base64url(&response.id)
        .ok_or_else(|| AppError::verification("credential id is not base64url"))?;
    if decode_base64url(&response.raw_id).as_deref() != Some(credential_id.as_slice()) {
        return Err(AppError::verification("id and rawId differ"));
    }

    let client_data_json = decode_base64url(&response.response.client_data_json)
        .ok_or_else(|| AppError::verification("clientDataJSON is not base64url"))?;
    verify_client_data(&client_data_json, ClientDataType::Create, expected_challenge, &rp.origin)?;

    let attestation_bytes = decode_base64url(&response.response.attestation_object)
        .ok_or_else(|| AppError::verification("attestationObject is not base64url"))?;
    let attestation = AttestationObject::parse(&attestation_bytes)?;
    let auth_data = &attestation.auth_data;
    check_authenticator_data(rp, auth_data)?;

    let attested = auth_data
        .attested_credential_data
        .as_ref()
        .ok_or_else(|| AppError::verification("no attested credential data"))?;
    if attested.credential_id() != credential_id.as_slice() {
        return Err(AppError::verification("credential id does not match authenticator data"));
    }

    let key = CosePublicKey::from_cose_key(&attested.key)?;
    if !rp.supports(key.algorithm) {
        return Err(AppError::verification(format!(
            "algorithm {:?} was not offered",
            key.algorithm
        )));
    }

    Ok(VerifiedRegistration {
        credential_id: encode_base64url(attested.credential_id()),
        public_key: encode_base64url(&encode_key(&attested.key)?),
        counter: sign_count(auth_data),
        device_type: device_type(auth_data.flags),
        backed_up: auth_data.flags.contains(Flags::BS),
        transports: parse_transports(&response.response.transports),
        aaguid: Uuid::from_bytes(attested.aaguid.0).to_string(),
        format: attestation.fmt,
    })
}

/// Known transport hints in the order given, without duplicates
fn parse_transports(values: &[String]) -> Vec<AuthenticatorTransport> {
    let mut transports = Vec::new();
    for value in values {
        let parsed = serde_json::from_value::<AuthenticatorTransport>(serde_json::Value::String(value.clone()));
        if let Ok(transport) = parsed {
            if !transports.contains(&transport) {
                transports.push(transport);
            }
        }
    }
    transports
}
