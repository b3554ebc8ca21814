//! # WebAuthn API Types
//!
//! JSON shapes exchanged with the browser and the API endpoints.
//!
//! ## API Flow
//! Each ceremony has two steps: options and verify
//! - Options: server stores a challenge, client receives the options below
//! - Verify: client sends the authenticator response, server checks it
//!
//! Binary fields travel as unpadded base64url strings, matching what
//! browser helper libraries produce from `PublicKeyCredential.toJSON()`.
//! The enums are the `passkey-types` ones; the structs are local because
//! that JSON leaves `authenticatorData` and `publicKeyAlgorithm` out of
//! older registration responses and carries ids as strings.

use crate::db::models::{Credential, DeviceType};
use passkey_types::webauthn::{
    AttestationConveyancePreference, AuthenticatorTransport, PublicKeyCredentialType,
    ResidentKeyRequirement, UserVerificationRequirement,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct RpEntity {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntity {
    /// Opaque WebAuthn user handle, never the email or the account id
    pub id: String,
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PubKeyCredParam {
    pub alg: i64,
    #[serde(rename = "type")]
    pub type_: PublicKeyCredentialType,
}

#[derive(Debug, Clone, Serialize)]
pub struct CredentialDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: PublicKeyCredentialType,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transports: Vec<AuthenticatorTransport>,
}

impl From<&Credential> for CredentialDescriptor {
    fn from(credential: &Credential) -> Self {
        CredentialDescriptor {
            id: credential.credential_id.clone(),
            type_: PublicKeyCredentialType::PublicKey,
            transports: credential.transports.0.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorSelection {
    pub resident_key: ResidentKeyRequirement,
    pub require_resident_key: bool,
    pub user_verification: UserVerificationRequirement,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationExtensions {
    pub cred_props: bool,
}

/// Options for `navigator.credentials.create()`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationOptions {
    pub rp: RpEntity,
    pub user: UserEntity,
    pub challenge: String,
    pub pub_key_cred_params: Vec<PubKeyCredParam>,
    pub timeout: u64,
    pub attestation: AttestationConveyancePreference,
    pub exclude_credentials: Vec<CredentialDescriptor>,
    pub authenticator_selection: AuthenticatorSelection,
    pub extensions: RegistrationExtensions,
}

/// Options for `navigator.credentials.get()`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    pub challenge: String,
    pub timeout: u64,
    pub rp_id: String,
    pub allow_credentials: Vec<CredentialDescriptor>,
    pub user_verification: UserVerificationRequirement,
}

/// Attestation response from `navigator.credentials.create()`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponseJson {
    pub id: String,
    pub raw_id: String,
    pub response: AttestationResponseJson,
    #[serde(rename = "type")]
    pub type_: PublicKeyCredentialType,
    #[serde(default)]
    pub authenticator_attachment: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationResponseJson {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    pub attestation_object: String,
    /// Unknown values are dropped when the credential is stored
    #[serde(default)]
    pub transports: Vec<String>,
}

/// Assertion response from `navigator.credentials.get()`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationResponseJson {
    pub id: String,
    pub raw_id: String,
    pub response: AssertionResponseJson,
    #[serde(rename = "type")]
    pub type_: PublicKeyCredentialType,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResponseJson {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    pub authenticator_data: String,
    pub signature: String,
    #[serde(default)]
    pub user_handle: Option<String>,
}

// Endpoint request bodies. Required fields are optional here so a missing
// value is reported as a 400 with a specific message.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterVerifyRequest {
    pub response: Option<RegistrationResponseJson>,
    pub credential_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AuthenticateOptionsRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AuthenticateVerifyRequest {
    pub email: Option<String>,
    pub response: Option<AuthenticationResponseJson>,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub name: Option<String>,
}

/// Credential projection returned by the management endpoints.
/// Never carries key material.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSummary {
    pub id: String,
    pub credential_id: String,
    pub credential_name: Option<String>,
    pub device_type: DeviceType,
    pub last_used_at: Option<String>,
    pub created_at: String,
    pub transports: Vec<AuthenticatorTransport>,
    pub backed_up: bool,
}

impl From<Credential> for CredentialSummary {
    fn from(credential: Credential) -> Self {
        CredentialSummary {
            id: credential.id,
            credential_id: credential.credential_id,
            credential_name: credential.credential_name,
            device_type: credential.device_type,
            last_used_at: credential.last_used_at,
            created_at: credential.created_at,
            transports: credential.transports.0,
            backed_up: credential.backed_up,
        }
    }
}
