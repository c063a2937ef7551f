use std::collections::BTreeMap;

use async_trait::async_trait;
use config::IdentityConfig;
use http::StatusCode;
use jiff::Timestamp;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use super::principal::Principal;

/// Why a credential failed verification.
///
/// The distinctions exist for internal diagnostics; the HTTP surface
/// collapses all of them into a uniform unauthenticated response.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("credential is malformed")]
    Malformed,
    #[error("credential is expired")]
    Expired,
    #[error("credential is revoked or invalid")]
    Revoked,
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Validates an opaque bearer credential against the identity provider.
///
/// Injected into the auth layer so tests can substitute a stub.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Principal, VerificationError>;
}

/// Stand-in used when no identity provider is configured. Every credential
/// resolves to [`VerificationError::Unavailable`], so protected routes stay
/// fail-closed instead of silently becoming public.
pub struct DisabledVerifier;

#[async_trait]
impl CredentialVerifier for DisabledVerifier {
    async fn verify(&self, _token: &str) -> Result<Principal, VerificationError> {
        Err(VerificationError::Unavailable(
            "no identity provider configured".to_owned(),
        ))
    }
}

/// Verifier backed by the identity provider's HTTP verification endpoint.
///
/// The request timeout comes from the identity configuration; a slow or
/// unreachable provider resolves to [`VerificationError::Unavailable`], which
/// the auth layer treats as a rejection. Identity is never assumed when it
/// cannot be confirmed.
pub struct HttpVerifier {
    client: reqwest::Client,
    verify_url: Url,
    api_key: Option<SecretString>,
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    token: &'a str,
}

#[derive(Deserialize)]
struct VerifyResponse {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    claims: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    iat: Option<i64>,
    #[serde(default)]
    exp: Option<i64>,
}

#[derive(Deserialize)]
struct VerifyErrorResponse {
    #[serde(default)]
    error: String,
}

impl HttpVerifier {
    pub fn new(config: &IdentityConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.verify_timeout)
            .build()?;

        Ok(Self {
            client,
            verify_url: config.verify_url.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl CredentialVerifier for HttpVerifier {
    async fn verify(&self, token: &str) -> Result<Principal, VerificationError> {
        let mut request = self
            .client
            .post(self.verify_url.clone())
            .json(&VerifyRequest { token });

        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await.map_err(|error| {
            if error.is_timeout() {
                VerificationError::Unavailable("verification call timed out".to_owned())
            } else {
                VerificationError::Unavailable(error.without_url().to_string())
            }
        })?;

        let status = response.status();

        if status.is_success() {
            let body: VerifyResponse = response.json().await.map_err(|error| {
                VerificationError::Unavailable(format!("invalid verification response: {error}"))
            })?;

            return Ok(Principal {
                subject: body.sub,
                email: body.email,
                claims: body.claims,
                issued_at: body.iat.and_then(|iat| Timestamp::from_second(iat).ok()),
                expires_at: body.exp.and_then(|exp| Timestamp::from_second(exp).ok()),
            });
        }

        if status.is_server_error() {
            return Err(VerificationError::Unavailable(format!(
                "identity provider returned {status}"
            )));
        }

        // 4xx: the provider rejected the credential. The body may carry a
        // machine-readable reason.
        let reason = response
            .json::<VerifyErrorResponse>()
            .await
            .map(|body| body.error)
            .unwrap_or_default();

        Err(match (status, reason.as_str()) {
            (StatusCode::BAD_REQUEST, _) | (_, "malformed") => VerificationError::Malformed,
            (_, "expired") => VerificationError::Expired,
            _ => VerificationError::Revoked,
        })
    }
}
