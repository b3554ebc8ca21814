//! # WebAuthn Module
//!
//! Server side of the passkey ceremonies.
//!
//! ## Submodules
//! - `relying_party`: immutable RP configuration passed into every ceremony
//! - `types`: JSON shapes exchanged with the browser and the API
//! - `client_data`, `authenticator_data`, `attestation`, `cose`: checks on
//!   the pieces of a ceremony response, decoded with `passkey-types` and
//!   `coset`
//! - `registration`: binding a new authenticator to a logged-in user
//! - `authentication`: logging in by email with a registered passkey
//! - `session`: turning a verified login into an identity-provider session
//! - `management`: listing, renaming and deleting passkeys
//!
//! ## WebAuthn Flow Overview
//!
//! ### Registration (Creating a Passkey)
//! 1. `registration::begin_registration()` stores a challenge, returns options
//! 2. The browser runs `navigator.credentials.create()`
//! 3. `registration::complete_registration()` consumes the challenge, verifies
//!    the attestation and stores the public key
//!
//! ### Authentication (Logging In)
//! 1. `authentication::begin_authentication()` stores a challenge scoped to the
//!    user's credentials
//! 2. The browser runs `navigator.credentials.get()`
//! 3. `authentication::complete_authentication()` consumes the challenge,
//!    verifies the signature and advances the counter
//! 4. `session::establish_session()` mints the session

pub mod attestation;
pub mod authentication;
pub mod authenticator_data;
pub mod client_data;
pub mod cose;
pub mod management;
pub mod registration;
pub mod relying_party;
pub mod session;
pub mod types;

use crate::error::{AppError, AppResult};
use aws_lc_rs::digest::{self, SHA256};
use aws_lc_rs::rand::{SecureRandom, SystemRandom};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// Random bytes behind every challenge
pub const CHALLENGE_BYTES: usize = 32;

/// Random bytes behind every WebAuthn user handle
pub const USER_HANDLE_BYTES: usize = 32;

/// `len` random bytes from the system CSPRNG, base64url encoded.
pub fn random_base64url(len: usize) -> AppResult<String> {
    let mut bytes = vec![0u8; len];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AppError::Internal("System random number generator failed".to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

pub fn encode_base64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode base64url, tolerating trailing padding some clients add.
pub fn decode_base64url(value: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(value.trim_end_matches('=')).ok()
}

pub fn sha256(data: &[u8]) -> Vec<u8> {
    digest::digest(&SHA256, data).as_ref().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_values_are_distinct() {
        let a = random_base64url(CHALLENGE_BYTES).unwrap();
        let b = random_base64url(CHALLENGE_BYTES).unwrap();
        assert_ne!(a, b);
        assert_eq!(decode_base64url(&a).unwrap().len(), CHALLENGE_BYTES);
    }

    #[test]
    fn test_decode_accepts_padding() {
        assert_eq!(decode_base64url("AQI").unwrap(), vec![1, 2]);
        assert_eq!(decode_base64url("AQI=").unwrap(), vec![1, 2]);
        assert!(decode_base64url("not base64!").is_none());
    }
}
