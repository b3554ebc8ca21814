//! Authenticator data checks shared by both ceremonies.

use super::relying_party::RelyingParty;
use crate::db::models::DeviceType;
use crate::error::{AppError, AppResult};
use passkey_types::ctap2::{AuthenticatorData, Flags};

pub fn parse_authenticator_data(bytes: &[u8]) -> AppResult<AuthenticatorData> {
    AuthenticatorData::from_slice(bytes)
        .map_err(|e| AppError::verification(format!("authenticator data is malformed: {}", e)))
}

/// RP binding and user flags. Presence is always required, verification
/// only when the RP asks for it.
pub fn check_authenticator_data(rp: &RelyingParty, data: &AuthenticatorData) -> AppResult<()> {
    if data.rp_id_hash() != rp.rp_id_hash() {
        return Err(AppError::verification("RP id hash mismatch"));
    }
    if !data.flags.contains(Flags::UP) {
        return Err(AppError::verification("user presence flag not set"));
    }
    if rp.requires_user_verification() && !data.flags.contains(Flags::UV) {
        return Err(AppError::verification("user verification required but not performed"));
    }
    if data.flags.contains(Flags::BS) && !data.flags.contains(Flags::BE) {
        return Err(AppError::verification(
            "backup state set on a credential that is not backup eligible",
        ));
    }
    Ok(())
}

pub fn sign_count(data: &AuthenticatorData) -> u32 {
    data.counter.unwrap_or_default()
}

pub fn device_type(flags: Flags) -> DeviceType {
    if flags.contains(Flags::BE) {
        DeviceType::MultiDevice
    } else {
        DeviceType::SingleDevice
    }
}
