use std::time::Duration;

use serde::Deserialize;

/// Per-client token-bucket settings.
///
/// `per_second` is the steady refill rate, `burst` the bucket capacity. A
/// client that stays idle for `idle_after` has its bucket evicted by the
/// background sweep that runs every `sweep_interval`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_per_second")]
    pub per_second: f64,
    #[serde(default = "default_burst")]
    pub burst: f64,
    #[serde(
        default = "default_sweep_interval",
        deserialize_with = "duration_str::deserialize_duration"
    )]
    pub sweep_interval: Duration,
    #[serde(
        default = "default_idle_after",
        deserialize_with = "duration_str::deserialize_duration"
    )]
    pub idle_after: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            per_second: default_per_second(),
            burst: default_burst(),
            sweep_interval: default_sweep_interval(),
            idle_after: default_idle_after(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_per_second() -> f64 {
    100.0
}

fn default_burst() -> f64 {
    200.0
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_idle_after() -> Duration {
    Duration::from_secs(300)
}
