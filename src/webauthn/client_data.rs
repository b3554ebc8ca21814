//! `clientDataJSON` checks.

use super::decode_base64url;
use crate::error::{AppError, AppResult};
use passkey_types::webauthn::{ClientDataType, CollectedClientData};

/// Parse `clientDataJSON` and check ceremony type, challenge and origin
/// against what the server issued.
pub fn verify_client_data(
    bytes: &[u8],
    ceremony: ClientDataType,
    expected_challenge: &str,
    expected_origin: &str,
) -> AppResult<CollectedClientData> {
    let data: CollectedClientData = serde_json::from_slice(bytes)
        .map_err(|e| AppError::verification(format!("clientDataJSON is not valid: {}", e)))?;

    if data.ty != ceremony {
        return Err(AppError::verification(format!(
            "unexpected client data type '{}', expected '{}'",
            data.ty, ceremony
        )));
    }

    // Compare decoded bytes; encoders disagree on padding
    let received = decode_base64url(&data.challenge)
        .ok_or_else(|| AppError::verification("client data challenge is not base64url"))?;
    let expected = decode_base64url(expected_challenge)
        .ok_or_else(|| AppError::Internal("stored challenge is not base64url".to_string()))?;
    if received != expected {
        return Err(AppError::verification("challenge mismatch"));
    }

    if data.origin.trim_end_matches('/') != expected_origin {
        return Err(AppError::verification(format!(
            "unexpected origin '{}', expected '{}'",
            data.origin, expected_origin
        )));
    }

    if data.cross_origin == Some(true) {
        return Err(AppError::verification("cross-origin ceremonies are not accepted"));
    }

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ORIGIN: &str = "https://predictor.example.com";

    fn client_data(type_: &str, challenge: &str, origin: &str, cross_origin: bool) -> Vec<u8> {
        json!({
            "type": type_,
            "challenge": challenge,
            "origin": origin,
            "crossOrigin": cross_origin,
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn test_accepts_matching_client_data() {
        let data = client_data("webauthn.get", "AQIDBA", ORIGIN, false);
        assert!(verify_client_data(&data, ClientDataType::Get, "AQIDBA", ORIGIN).is_ok());
        // Padded form of the same challenge
        assert!(verify_client_data(&data, ClientDataType::Get, "AQIDBA==", ORIGIN).is_ok());

        let trailing_slash = client_data("webauthn.get", "AQIDBA", "https://predictor.example.com/", false);
        assert!(verify_client_data(&trailing_slash, ClientDataType::Get, "AQIDBA", ORIGIN).is_ok());
    }

    #[test]
    fn test_rejects_mismatches() {
        let data = client_data("webauthn.get", "AQIDBA", ORIGIN, false);
        assert!(matches!(
            verify_client_data(&data, ClientDataType::Create, "AQIDBA", ORIGIN),
            Err(AppError::VerificationFailed(_))
        ));
        assert!(matches!(
            verify_client_data(&data, ClientDataType::Get, "BQYHCA", ORIGIN),
            Err(AppError::VerificationFailed(_))
        ));
        assert!(matches!(
            verify_client_data(&data, ClientDataType::Get, "AQIDBA", "https://evil.example.com"),
            Err(AppError::VerificationFailed(_))
        ));

        let framed = client_data("webauthn.get", "AQIDBA", ORIGIN, true);
        assert!(matches!(
            verify_client_data(&framed, ClientDataType::Get, "AQIDBA", ORIGIN),
            Err(AppError::VerificationFailed(_))
        ));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            verify_client_data(b"{not json", ClientDataType::Get, "AQIDBA", ORIGIN),
            Err(AppError::VerificationFailed(_))
        ));
    }
}
