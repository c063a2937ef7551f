use std::fmt;
use std::time::Duration;

use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};
use url::Url;

/// Cross-origin resource sharing settings for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorsConfig {
    #[serde(default)]
    pub allow_origins: AllowedOrigins,
    #[serde(default = "default_allow_methods")]
    pub allow_methods: Vec<String>,
    #[serde(default = "default_allow_headers")]
    pub allow_headers: Vec<String>,
    #[serde(default)]
    pub allow_credentials: bool,
    #[serde(default, deserialize_with = "duration_str::deserialize_option_duration")]
    pub max_age: Option<Duration>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origins: AllowedOrigins::default(),
            allow_methods: default_allow_methods(),
            allow_headers: default_allow_headers(),
            allow_credentials: false,
            max_age: None,
        }
    }
}

fn default_allow_methods() -> Vec<String> {
    ["GET", "POST", "PUT", "DELETE", "OPTIONS"]
        .into_iter()
        .map(str::to_owned)
        .collect()
}

fn default_allow_headers() -> Vec<String> {
    ["authorization", "content-type"]
        .into_iter()
        .map(str::to_owned)
        .collect()
}

/// Origins granted cross-origin access: either the `"*"` wildcard or an
/// explicit list of origin URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AllowedOrigins {
    #[default]
    Any,
    List(Vec<Url>),
}

impl<'de> Deserialize<'de> for AllowedOrigins {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OriginsVisitor;

        impl<'de> Visitor<'de> for OriginsVisitor {
            type Value = AllowedOrigins;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str(r#""*" or a list of origin URLs"#)
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                if value == "*" {
                    Ok(AllowedOrigins::Any)
                } else {
                    Err(E::custom(r#"expected "*"; list origins as an array"#))
                }
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut origins = Vec::new();
                while let Some(origin) = seq.next_element::<Url>()? {
                    origins.push(origin);
                }
                Ok(AllowedOrigins::List(origins))
            }
        }

        deserializer.deserialize_any(OriginsVisitor)
    }
}
