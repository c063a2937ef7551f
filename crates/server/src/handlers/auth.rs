//! Identity-facing handlers: login, profile, authentication status.

use axum::extract::{Request, State};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;

use crate::auth::{Principal, VerificationError};
use crate::redact::redact;
use crate::storage::StoreError;

use super::{ApiError, AppState, envelope};

#[derive(Deserialize)]
pub(crate) struct LoginRequest {
    id_token: String,
}

/// `POST /auth/login`
///
/// Verifies the posted credential, mirrors the identity into the local user
/// record and bumps its login statistics.
pub(crate) async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let verifier = state.verifier.as_ref().ok_or(ApiError::AuthDisabled)?;

    let principal = verifier.verify(&request.id_token).await.map_err(|error| {
        // The caller gets a uniform rejection either way; only the
        // diagnostics distinguish an outage from a bad credential.
        match &error {
            VerificationError::Unavailable(_) => {
                log::warn!("Identity provider unavailable during login: {error}");
            }
            _ => log::debug!(
                "Login credential {} rejected: {error}",
                redact(&request.id_token)
            ),
        }
        ApiError::Unauthenticated
    })?;

    let user = state.store.upsert_identity(&principal).await?;

    Ok(envelope(user, "Login successful"))
}

/// `GET /auth/profile`
///
/// Behind the required auth gate, so the principal is always present. The
/// payload pairs the mirrored user record with the credential's claims and
/// validity window.
pub(crate) async fn profile(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = state.store.get_by_subject(&principal.subject).await?;

    Ok(envelope(
        json!({
            "user": user,
            "credential": {
                "issued_at": principal.issued_at,
                "expires_at": principal.expires_at,
                "claims": principal.claims,
            },
        }),
        "Profile retrieved successfully",
    ))
}

/// `GET /auth/status`
///
/// Optional-auth route: reports whether the caller presented a verifiable
/// credential, and attaches the mirrored user record when one exists.
pub(crate) async fn status(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Some(principal) = request.extensions().get::<Principal>() else {
        return Ok(envelope(
            json!({ "authenticated": false }),
            "Authentication status",
        ));
    };

    let user = match state.store.get_by_subject(&principal.subject).await {
        Ok(user) => Some(user),
        Err(StoreError::NotFound) => None,
        Err(error) => return Err(error.into()),
    };

    Ok(envelope(
        json!({
            "authenticated": true,
            "subject": principal.subject,
            "user": user,
        }),
        "Authentication status",
    ))
}
