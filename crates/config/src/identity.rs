use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Identity provider used to verify bearer credentials.
///
/// When this section is absent the server cannot confirm any identity:
/// protected routes reject every request (fail-closed) and the login
/// endpoint reports the provider as unavailable.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    /// Endpoint that verifies a credential and returns the subject claims.
    pub verify_url: Url,
    /// Upper bound on a single verification call.
    #[serde(
        default = "default_verify_timeout",
        deserialize_with = "duration_str::deserialize_duration"
    )]
    pub verify_timeout: Duration,
    /// Credential presented to the identity provider itself, if it requires
    /// one.
    #[serde(default)]
    pub api_key: Option<SecretString>,
}

fn default_verify_timeout() -> Duration {
    Duration::from_secs(5)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn minimal_section() {
        let config: IdentityConfig = toml::from_str(indoc! {r#"
            verify_url = "https://id.example.com/v1/verify"
        "#})
        .unwrap();

        assert_eq!(config.verify_url.as_str(), "https://id.example.com/v1/verify");
        assert_eq!(config.verify_timeout, Duration::from_secs(5));
        assert!(config.api_key.is_none());
    }

    #[test]
    fn api_key_round_trips_without_leaking_in_debug() {
        let config: IdentityConfig = toml::from_str(indoc! {r#"
            verify_url = "https://id.example.com/v1/verify"
            verify_timeout = "2s"
            api_key = "sk-verify-123"
        "#})
        .unwrap();

        assert_eq!(config.verify_timeout, Duration::from_secs(2));
        let api_key = config.api_key.as_ref().map(ExposeSecret::expose_secret);
        assert_eq!(api_key, Some("sk-verify-123"));
        assert!(!format!("{config:?}").contains("sk-verify-123"));
    }
}
