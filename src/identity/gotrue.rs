//! Identity provider backed by a GoTrue-compatible auth server.
//!
//! - `POST /auth/v1/admin/generate_link` (service-role key) issues a magic
//!   link; only its hashed token is used
//! - `POST /auth/v1/verify` (anon key) redeems the hashed token for a session
//! - `GET /auth/v1/user` resolves an access token
//! - `POST /auth/v1/logout` revokes it

use super::{IdentityProvider, IdentitySession, IdentityUser, SignInToken};
use crate::config::Secret;
use crate::error::{AppError, AppResult};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct GoTrueIdentityProvider {
    client: Client,
    base_url: String,
    service_role_key: Secret,
    anon_key: Secret,
}

#[derive(Debug, Deserialize)]
struct GenerateLinkResponse {
    hashed_token: String,
    #[serde(default = "default_verification_type")]
    verification_type: String,
}

fn default_verification_type() -> String {
    "magiclink".to_string()
}

impl GoTrueIdentityProvider {
    pub fn new(base_url: &str, service_role_key: Secret, anon_key: Secret) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build identity HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_role_key,
            anon_key,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }
}

fn upstream(context: &str, e: reqwest::Error) -> AppError {
    AppError::SessionFailed(format!("{}: {}", context, e))
}

#[async_trait]
impl IdentityProvider for GoTrueIdentityProvider {
    async fn issue_sign_in_token(&self, email: &str) -> AppResult<SignInToken> {
        let key = self.service_role_key.expose();

        let response = self
            .client
            .post(self.endpoint("admin/generate_link"))
            .header("apikey", key)
            .bearer_auth(key)
            .json(&json!({ "type": "magiclink", "email": email }))
            .send()
            .await
            .map_err(|e| upstream("generate_link request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::SessionFailed(format!("generate_link returned {}", status)));
        }

        let link: GenerateLinkResponse = response
            .json()
            .await
            .map_err(|e| upstream("generate_link response unreadable", e))?;

        Ok(SignInToken {
            token: link.hashed_token,
            verification_type: link.verification_type,
        })
    }

    async fn redeem_sign_in_token(&self, token: &SignInToken) -> AppResult<IdentitySession> {
        let response = self
            .client
            .post(self.endpoint("verify"))
            .header("apikey", self.anon_key.expose())
            .json(&json!({ "type": token.verification_type, "token_hash": token.token }))
            .send()
            .await
            .map_err(|e| upstream("verify request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::SessionFailed(format!("verify returned {}", status)));
        }

        response
            .json::<IdentitySession>()
            .await
            .map_err(|e| upstream("verify response unreadable", e))
    }

    async fn resolve_access_token(&self, access_token: &str) -> AppResult<Option<IdentityUser>> {
        let response = self
            .client
            .get(self.endpoint("user"))
            .header("apikey", self.anon_key.expose())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Identity user lookup failed: {}", e)))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let user = response
                    .json::<IdentityUser>()
                    .await
                    .map_err(|e| AppError::Internal(format!("Identity user response unreadable: {}", e)))?;
                Ok(Some(user))
            }
            status => Err(AppError::Internal(format!("Identity user lookup returned {}", status))),
        }
    }

    async fn sign_out(&self, access_token: &str) -> AppResult<()> {
        let response = self
            .client
            .post(self.endpoint("logout"))
            .header("apikey", self.anon_key.expose())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Identity logout failed: {}", e)))?;

        // An already invalid token is as good as signed out
        if !response.status().is_success() && response.status() != StatusCode::UNAUTHORIZED {
            tracing::warn!(status = %response.status(), "Identity logout was refused");
        }

        Ok(())
    }
}
