use std::collections::BTreeMap;

use jiff::Timestamp;

/// Verified identity attached to a request after successful credential
/// verification.
///
/// Only constructed from a verifier response, never from unvalidated input,
/// and lives in the request extensions for the duration of one request.
/// Extensions are keyed by type, so no other middleware can collide with or
/// overwrite this slot by accident.
#[derive(Debug, Clone)]
pub struct Principal {
    /// Stable identity key assigned by the identity provider.
    pub subject: String,
    /// Primary email claim, when the provider reports one.
    pub email: Option<String>,
    /// Remaining claims, verbatim from the provider.
    pub claims: BTreeMap<String, serde_json::Value>,
    /// When the credential was issued.
    pub issued_at: Option<Timestamp>,
    /// When the credential expires.
    pub expires_at: Option<Timestamp>,
}
