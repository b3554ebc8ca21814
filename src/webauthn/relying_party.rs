//! Relying Party configuration.
//!
//! Built once at start-up from [`Config`](crate::config::Config) and shared
//! read-only; ceremony functions take it as an explicit `&RelyingParty`.

use anyhow::{bail, Context, Result};
use coset::iana;
use passkey_types::webauthn::UserVerificationRequirement;
use public_suffix::{EffectiveTLDProvider, DEFAULT_PROVIDER};
use url::{Host, Url};

/// Client-side operation timeout communicated in the options, in milliseconds.
pub const CEREMONY_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, Clone)]
pub struct RelyingParty {
    pub name: String,
    pub id: String,

    /// Serialized origin (scheme://host[:port]) that clientDataJSON must carry
    pub origin: String,

    pub user_verification: UserVerificationRequirement,

    /// Offered to authenticators in this order of preference
    pub algorithms: Vec<iana::Algorithm>,

    pub timeout_ms: u64,

    rp_id_hash: Vec<u8>,
}

impl RelyingParty {
    /// Validate and assemble the RP settings.
    ///
    /// The RP id must be the origin's host or a registrable parent domain of
    /// it. Browsers refuse every ceremony otherwise, so this fails at start-up.
    pub fn new(name: &str, id: &str, origin: &str) -> Result<Self> {
        let url = Url::parse(origin).with_context(|| format!("Invalid RP origin '{}'", origin))?;

        let id = id.trim().to_ascii_lowercase();
        if id.is_empty() {
            bail!("RP id must not be empty");
        }

        match url.host() {
            Some(Host::Domain(host)) => {
                if host != id && !host.ends_with(&format!(".{}", id)) {
                    bail!("RP id '{}' is not a registrable suffix of origin host '{}'", id, host);
                }
                // localhost has no registrable domain but browsers accept it
                if id != "localhost" && DEFAULT_PROVIDER.effective_tld_plus_one(&id).is_err() {
                    bail!("RP id '{}' is a public suffix", id);
                }
            }
            Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => {
                if url.host_str() != Some(id.as_str()) {
                    bail!("RP id '{}' must equal the IP address of origin '{}'", id, origin);
                }
            }
            None => bail!("RP origin '{}' has no host", origin),
        }

        Ok(RelyingParty {
            name: name.to_string(),
            rp_id_hash: super::sha256(id.as_bytes()),
            id,
            origin: url.origin().ascii_serialization(),
            user_verification: UserVerificationRequirement::Preferred,
            algorithms: vec![iana::Algorithm::ES256, iana::Algorithm::RS256],
            timeout_ms: CEREMONY_TIMEOUT_MS,
        })
    }

    pub fn with_user_verification(mut self, requirement: UserVerificationRequirement) -> Self {
        self.user_verification = requirement;
        self
    }

    /// SHA-256 of the RP id, as it appears at the start of authenticator data
    pub fn rp_id_hash(&self) -> &[u8] {
        &self.rp_id_hash
    }

    pub fn requires_user_verification(&self) -> bool {
        self.user_verification == UserVerificationRequirement::Required
    }

    pub fn supports(&self, algorithm: iana::Algorithm) -> bool {
        self.algorithms.contains(&algorithm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_is_normalized() {
        let rp = RelyingParty::new("Predictor", "example.com", "https://app.example.com:443/").unwrap();
        assert_eq!(rp.origin, "https://app.example.com");
        assert_eq!(rp.id, "example.com");
        assert_eq!(rp.rp_id_hash().len(), 32);
    }

    #[test]
    fn test_rp_id_must_match_origin_host() {
        assert!(RelyingParty::new("x", "localhost", "http://localhost:8080").is_ok());
        assert!(RelyingParty::new("x", "example.com", "https://evil.com").is_err());
        assert!(RelyingParty::new("x", "ample.com", "https://example.com").is_err());
        assert!(RelyingParty::new("x", "example.com", "not a url").is_err());
    }

    #[test]
    fn test_rp_id_cannot_be_a_public_suffix() {
        assert!(RelyingParty::new("x", "com", "https://example.com").is_err());
        assert!(RelyingParty::new("x", "co.uk", "https://predictor.co.uk").is_err());
        assert!(RelyingParty::new("x", "predictor.co.uk", "https://www.predictor.co.uk").is_ok());
    }

    #[test]
    fn test_ip_origins_need_an_exact_rp_id() {
        assert!(RelyingParty::new("x", "127.0.0.1", "http://127.0.0.1:3000").is_ok());
        assert!(RelyingParty::new("x", "0.0.1", "http://127.0.0.1:3000").is_err());
    }

    #[test]
    fn test_defaults_follow_passkey_policy() {
        let rp = RelyingParty::new("x", "localhost", "http://localhost:8080").unwrap();
        assert_eq!(rp.user_verification, UserVerificationRequirement::Preferred);
        assert!(!rp.requires_user_verification());
        assert_eq!(rp.algorithms, vec![iana::Algorithm::ES256, iana::Algorithm::RS256]);
        assert_eq!(rp.timeout_ms, 60_000);
    }
}
