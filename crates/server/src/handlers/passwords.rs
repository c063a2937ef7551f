//! Password policy endpoints.
//!
//! Scoring only; passwords are managed by the identity provider and never
//! stored here.

use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::model::score_password;

use super::envelope;

#[derive(Deserialize)]
pub(crate) struct StrengthCheckRequest {
    #[serde(default)]
    password: String,
}

/// `POST /password/strength-check`
pub(crate) async fn strength_check(
    Json(request): Json<StrengthCheckRequest>,
) -> Json<serde_json::Value> {
    let strength = score_password(&request.password);
    envelope(strength, "Password strength evaluated")
}

/// `GET /password/policy`
pub(crate) async fn policy() -> Json<serde_json::Value> {
    envelope(
        json!({
            "min_length": 8,
            "require_uppercase": true,
            "require_lowercase": true,
            "require_digit": true,
            "require_symbol": false,
            "max_score": 5,
        }),
        "Password policy",
    )
}
