//! COSE public keys and signature verification.
//!
//! Keys are decoded with `coset`. The two algorithms offered in registration
//! options, ES256 (EC2 key on P-256) and RS256 (RSA key), are verified with
//! aws-lc-rs.

use crate::error::{AppError, AppResult};
use aws_lc_rs::signature::{
    RsaPublicKeyComponents, UnparsedPublicKey, ECDSA_P256_SHA256_ASN1, RSA_PKCS1_2048_8192_SHA256,
};
use coset::iana::{self, EnumI64};
use coset::{CborSerializable, CoseKey, Label, RegisteredLabel, RegisteredLabelWithPrivate};

#[derive(Debug, Clone, PartialEq, Eq)]
enum KeyMaterial {
    /// Uncompressed SEC1 point: 0x04 || x || y
    P256(Vec<u8>),
    Rsa { n: Vec<u8>, e: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CosePublicKey {
    pub algorithm: iana::Algorithm,
    material: KeyMaterial,
}

impl CosePublicKey {
    /// Decode a stored COSE_Key.
    pub fn from_slice(bytes: &[u8]) -> AppResult<Self> {
        let key = CoseKey::from_slice(bytes)
            .map_err(|e| AppError::verification(format!("credential public key is not a COSE key: {}", e)))?;
        Self::from_cose_key(&key)
    }

    pub fn from_cose_key(key: &CoseKey) -> AppResult<Self> {
        let algorithm = match key.alg {
            Some(RegisteredLabelWithPrivate::Assigned(alg)) => alg,
            _ => return Err(AppError::verification("COSE key has no registered alg")),
        };

        let material = match (algorithm, &key.kty) {
            (iana::Algorithm::ES256, RegisteredLabel::Assigned(iana::KeyType::EC2)) => {
                if int_param(key, iana::Ec2KeyParameter::Crv.to_i64()) != Some(iana::EllipticCurve::P_256.to_i64()) {
                    return Err(AppError::verification("ES256 key is not on P-256"));
                }
                let x = bytes_param(key, iana::Ec2KeyParameter::X.to_i64()).filter(|x| x.len() == 32);
                let y = bytes_param(key, iana::Ec2KeyParameter::Y.to_i64()).filter(|y| y.len() == 32);
                let (Some(x), Some(y)) = (x, y) else {
                    return Err(AppError::verification("EC2 key coordinates missing or malformed"));
                };
                let mut point = Vec::with_capacity(65);
                point.push(0x04);
                point.extend_from_slice(x);
                point.extend_from_slice(y);
                KeyMaterial::P256(point)
            }
            (iana::Algorithm::RS256, RegisteredLabel::Assigned(iana::KeyType::RSA)) => {
                let n = bytes_param(key, iana::RsaKeyParameter::N.to_i64())
                    .ok_or_else(|| AppError::verification("RSA key has no modulus"))?;
                let e = bytes_param(key, iana::RsaKeyParameter::E.to_i64())
                    .ok_or_else(|| AppError::verification("RSA key has no exponent"))?;
                KeyMaterial::Rsa {
                    n: strip_leading_zeros(n),
                    e: strip_leading_zeros(e),
                }
            }
            (alg, kty) => {
                return Err(AppError::verification(format!(
                    "unsupported key: algorithm {:?} with key type {:?}",
                    alg, kty
                )))
            }
        };

        Ok(CosePublicKey { algorithm, material })
    }

    /// Verify `signature` over `message` with this key.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> AppResult<()> {
        let result = match &self.material {
            KeyMaterial::P256(point) => {
                UnparsedPublicKey::new(&ECDSA_P256_SHA256_ASN1, point).verify(message, signature)
            }
            KeyMaterial::Rsa { n, e } => RsaPublicKeyComponents { n: n.as_slice(), e: e.as_slice() }
                .verify(&RSA_PKCS1_2048_8192_SHA256, message, signature),
        };

        result.map_err(|_| AppError::verification("signature does not verify"))
    }
}

/// CTAP2 canonical encoding of a key, as stored with the credential
pub fn encode_key(key: &CoseKey) -> AppResult<Vec<u8>> {
    key.clone()
        .to_vec()
        .map_err(|e| AppError::Internal(format!("Failed to encode COSE key: {}", e)))
}

fn param(key: &CoseKey, label: i64) -> Option<&ciborium::Value> {
    key.params
        .iter()
        .find(|(k, _)| *k == Label::Int(label))
        .map(|(_, v)| v)
}

fn int_param(key: &CoseKey, label: i64) -> Option<i64> {
    param(key, label)
        .and_then(ciborium::Value::as_integer)
        .and_then(|i| i64::try_from(i).ok())
}

fn bytes_param(key: &CoseKey, label: i64) -> Option<&[u8]> {
    param(key, label).and_then(ciborium::Value::as_bytes).map(Vec::as_slice)
}

fn strip_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}
