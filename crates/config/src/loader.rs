use std::path::Path;

use anyhow::{Context, bail};
use http::{HeaderName, Method};

use crate::Config;

impl Config {
    /// Read and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file {}", path.display()))?;

        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("Could not parse config file {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> anyhow::Result<()> {
        let rate_limits = &self.server.rate_limits;

        if !rate_limits.per_second.is_finite() || rate_limits.per_second < 0.0 {
            bail!(
                "server.rate_limits.per_second must be a finite, non-negative number, got {}",
                rate_limits.per_second
            );
        }

        if !rate_limits.burst.is_finite() || rate_limits.burst < 0.0 {
            bail!(
                "server.rate_limits.burst must be a finite, non-negative number, got {}",
                rate_limits.burst
            );
        }

        if rate_limits.enabled {
            if rate_limits.sweep_interval.is_zero() {
                bail!("server.rate_limits.sweep_interval must be greater than zero");
            }
            if rate_limits.idle_after.is_zero() {
                bail!("server.rate_limits.idle_after must be greater than zero");
            }
        }

        if self.server.health.enabled && !self.server.health.path.starts_with('/') {
            bail!(
                "server.health.path must start with a slash, got {}",
                self.server.health.path
            );
        }

        if let Some(cors) = &self.server.cors {
            if cors.allow_credentials && cors.allow_origins == crate::AllowedOrigins::Any {
                bail!(
                    "server.cors.allow_credentials requires an explicit allow_origins list, not \"*\""
                );
            }
            for method in &cors.allow_methods {
                Method::from_bytes(method.as_bytes())
                    .with_context(|| format!("Invalid CORS method: {method}"))?;
            }
            for header in &cors.allow_headers {
                header
                    .parse::<HeaderName>()
                    .with_context(|| format!("Invalid CORS header name: {header}"))?;
            }
        }

        if let Some(identity) = &self.identity {
            let scheme = identity.verify_url.scheme();
            if scheme != "http" && scheme != "https" {
                bail!(
                    "identity.verify_url must use http or https, got {scheme}://"
                );
            }
            if identity.verify_timeout.is_zero() {
                bail!("identity.verify_timeout must be greater than zero");
            }
        }

        Ok(())
    }
}
