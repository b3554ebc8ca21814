//! Attestation object decoding.
//!
//! Registration options ask for attestation conveyance `none`, so the
//! statement itself is never evaluated; only `authData` is used. The format is
//! kept for logging.

use crate::error::{AppError, AppResult};
use passkey_types::ctap2::AuthenticatorData;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AttestationObject {
    pub fmt: String,
    #[serde(rename = "attStmt")]
    pub att_stmt: ciborium::Value,
    #[serde(rename = "authData")]
    pub auth_data: AuthenticatorData,
}

impl AttestationObject {
    pub fn parse(bytes: &[u8]) -> AppResult<Self> {
        let object: AttestationObject = ciborium::from_reader(bytes)
            .map_err(|e| AppError::verification(format!("attestation object is malformed: {}", e)))?;

        if object.att_stmt.as_map().is_none() {
            return Err(AppError::verification("attStmt is not a map"));
        }

        Ok(object)
    }
}
