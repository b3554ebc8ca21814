//! Test helpers: an in-memory database and a software authenticator that
//! produces real ES256 attestations and assertions.

#![allow(dead_code)]

use aws_lc_rs::digest::{digest, SHA256};
use aws_lc_rs::rand::{SecureRandom, SystemRandom};
use aws_lc_rs::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_ASN1_SIGNING};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ciborium::Value as Cbor;
use coset::{iana, CoseKey, CoseKeyBuilder};
use passkey_auth_server::webauthn::relying_party::RelyingParty;
use passkey_auth_server::webauthn::types::{AuthenticationResponseJson, RegistrationResponseJson};
use passkey_types::ctap2::{Aaguid, AttestedCredentialData, AuthenticatorData, Flags};
use serde_json::{json, Value};
use sqlx::SqlitePool;

pub const RP_ID: &str = "localhost";
pub const ORIGIN: &str = "http://localhost:8080";

pub async fn test_pool() -> SqlitePool {
    passkey_auth_server::db::connect("sqlite::memory:")
        .await
        .expect("in-memory database")
}

pub fn relying_party() -> RelyingParty {
    RelyingParty::new("Tournament Predictor", RP_ID, ORIGIN).expect("valid RP settings")
}

pub fn b64(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// A synced platform authenticator holding one P-256 credential
pub struct SoftAuthenticator {
    key_pair: EcdsaKeyPair,
    rng: SystemRandom,
    pub credential_id: Vec<u8>,
    /// Reported at registration, then advanced by `counter_step` per assertion
    pub counter: u32,
    /// 0 models an authenticator without a signature counter
    pub counter_step: u32,
    pub rp_id: String,
    pub origin: String,
    pub flags: Flags,
}

impl SoftAuthenticator {
    pub fn new() -> Self {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng).unwrap();
        let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, pkcs8.as_ref()).unwrap();

        let mut credential_id = vec![0u8; 16];
        rng.fill(&mut credential_id).unwrap();

        Self {
            key_pair,
            rng,
            credential_id,
            counter: 0,
            counter_step: 1,
            rp_id: RP_ID.to_string(),
            origin: ORIGIN.to_string(),
            flags: Flags::UP | Flags::UV | Flags::BE | Flags::BS,
        }
    }

    pub fn credential_id_b64(&self) -> String {
        b64(&self.credential_id)
    }

    fn cose_key(&self) -> CoseKey {
        let point = self.key_pair.public_key().as_ref();
        CoseKeyBuilder::new_ec2_pub_key(iana::EllipticCurve::P_256, point[1..33].to_vec(), point[33..65].to_vec())
            .algorithm(iana::Algorithm::ES256)
            .build()
    }

    fn client_data(&self, ceremony: &str, challenge: &str) -> Vec<u8> {
        json!({
            "type": ceremony,
            "challenge": challenge,
            "origin": self.origin,
            "crossOrigin": false,
        })
        .to_string()
        .into_bytes()
    }

    fn auth_data(&self) -> AuthenticatorData {
        let mut data = AuthenticatorData::new(&self.rp_id, Some(self.counter));
        data.flags = self.flags;
        data
    }

    /// Response to `navigator.credentials.create()` for `challenge`
    pub fn registration_json(&self, challenge: &str) -> Value {
        let attested = AttestedCredentialData::new(Aaguid([0xAA; 16]), self.credential_id.clone(), self.cose_key())
            .unwrap();
        let auth_data = self.auth_data().set_attested_credential_data(attested);

        let attestation = Cbor::Map(vec![
            (Cbor::Text("fmt".into()), Cbor::Text("none".into())),
            (Cbor::Text("attStmt".into()), Cbor::Map(vec![])),
            (Cbor::Text("authData".into()), Cbor::Bytes(auth_data.to_vec())),
        ]);
        let mut attestation_object = Vec::new();
        ciborium::into_writer(&attestation, &mut attestation_object).unwrap();

        let id = self.credential_id_b64();
        json!({
            "id": id,
            "rawId": id,
            "type": "public-key",
            "authenticatorAttachment": "platform",
            "clientExtensionResults": { "credProps": { "rk": true } },
            "response": {
                "clientDataJSON": b64(&self.client_data("webauthn.create", challenge)),
                "attestationObject": b64(&attestation_object),
                "transports": ["internal", "hybrid", "smart-card"]
            }
        })
    }

    pub fn registration(&self, challenge: &str) -> RegistrationResponseJson {
        serde_json::from_value(self.registration_json(challenge)).unwrap()
    }

    /// Response to `navigator.credentials.get()`; advances the counter first.
    pub fn assertion_json(&mut self, challenge: &str, user_handle: Option<&str>) -> Value {
        self.counter += self.counter_step;

        let auth_data = self.auth_data().to_vec();
        let client_data = self.client_data("webauthn.get", challenge);

        let mut signed = auth_data.clone();
        signed.extend_from_slice(digest(&SHA256, &client_data).as_ref());
        let signature = self.key_pair.sign(&self.rng, &signed).unwrap();

        let id = self.credential_id_b64();
        json!({
            "id": id,
            "rawId": id,
            "type": "public-key",
            "clientExtensionResults": {},
            "response": {
                "clientDataJSON": b64(&client_data),
                "authenticatorData": b64(&auth_data),
                "signature": b64(signature.as_ref()),
                "userHandle": user_handle
            }
        })
    }

    pub fn assertion(&mut self, challenge: &str, user_handle: Option<&str>) -> AuthenticationResponseJson {
        serde_json::from_value(self.assertion_json(challenge, user_handle)).unwrap()
    }
}
