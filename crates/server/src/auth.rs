//! Bearer-credential gate for protected routes.
//!
//! Extracts the `Authorization` header, verifies the credential through the
//! injected [`CredentialVerifier`], and attaches the resulting [`Principal`]
//! to the request extensions. Every request re-verifies; nothing is cached.

mod error;
mod principal;
mod verifier;

use std::{
    fmt::Display,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::body::Body;
use error::ExtractError;
use http::{HeaderValue, Request, Response, StatusCode, header, request::Parts};
use tower::Layer;

use crate::redact::redact;

pub use principal::Principal;
pub use verifier::{CredentialVerifier, DisabledVerifier, HttpVerifier, VerificationError};

const BEARER_SCHEME: &str = "Bearer";

/// How the gate treats a request that carries no verified identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuthMode {
    /// Reject with 401. Used by protected routes.
    Required,
    /// Proceed without a [`Principal`]. Only a successful verification
    /// attaches identity.
    Optional,
}

#[derive(Clone)]
pub struct AuthLayer(Arc<AuthLayerInner>);

struct AuthLayerInner {
    verifier: Arc<dyn CredentialVerifier>,
    mode: AuthMode,
}

impl AuthLayer {
    /// Gate that rejects requests without a verified credential.
    pub fn required(verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self(Arc::new(AuthLayerInner {
            verifier,
            mode: AuthMode::Required,
        }))
    }

    /// Gate that attaches identity when present but never rejects.
    pub fn optional(verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self(Arc::new(AuthLayerInner {
            verifier,
            mode: AuthMode::Optional,
        }))
    }
}

impl<Service> Layer<Service> for AuthLayer
where
    Service: Send + Clone,
{
    type Service = AuthService<Service>;

    fn layer(&self, next: Service) -> Self::Service {
        AuthService {
            next,
            layer: self.0.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthService<Service> {
    next: Service,
    layer: Arc<AuthLayerInner>,
}

impl<Service, ReqBody> tower::Service<Request<ReqBody>> for AuthService<Service>
where
    Service: tower::Service<Request<ReqBody>, Response = Response<Body>> + Send + Clone + 'static,
    Service::Future: Send,
    Service::Error: Display + 'static,
    ReqBody: http_body::Body + Send + 'static,
{
    type Response = http::Response<Body>;
    type Error = Service::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response<Body>, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.next.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let mut next = self.next.clone();
        let layer = self.layer.clone();

        let (mut parts, body) = req.into_parts();

        Box::pin(async move {
            let token = match extract_bearer(&parts) {
                Ok(token) => token,
                Err(error) => {
                    return match layer.mode {
                        AuthMode::Required => {
                            log::debug!("Rejecting request: {error}");
                            Ok(unauthenticated())
                        }
                        AuthMode::Optional => {
                            next.call(Request::from_parts(parts, body)).await
                        }
                    };
                }
            };

            match layer.verifier.verify(&token).await {
                Ok(principal) => {
                    parts.extensions.insert(principal);
                    next.call(Request::from_parts(parts, body)).await
                }
                Err(error) => {
                    // Internal diagnostics keep the cause; the client never
                    // sees it. Only a redacted credential prefix is logged.
                    log::debug!(
                        "Credential {} failed verification: {error}",
                        redact(&token)
                    );

                    match layer.mode {
                        AuthMode::Required => Ok(unauthenticated()),
                        AuthMode::Optional => {
                            next.call(Request::from_parts(parts, body)).await
                        }
                    }
                }
            }
        })
    }
}

/// Pull the bearer credential out of the `Authorization` header.
///
/// The value must be exactly two parts separated by a single space, with a
/// case-sensitive `Bearer` scheme. Anything else is malformed.
fn extract_bearer(parts: &Parts) -> Result<String, ExtractError> {
    let header = parts
        .headers
        .get(header::AUTHORIZATION)
        .ok_or(ExtractError::MissingHeader)?;

    let value = header.to_str().map_err(|_| ExtractError::NotUtf8)?;

    let mut segments = value.split(' ');
    let scheme = segments.next().unwrap_or_default();
    let credential = segments.next().ok_or(ExtractError::Malformed)?;

    if segments.next().is_some() || credential.is_empty() {
        return Err(ExtractError::Malformed);
    }

    if scheme != BEARER_SCHEME {
        return Err(ExtractError::WrongScheme);
    }

    Ok(credential.to_owned())
}

/// The uniform rejection response. Carries no hint of which check failed.
fn unauthenticated() -> Response<Body> {
    let response = Response::builder()
        .status(StatusCode::UNAUTHORIZED)
        .header(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"))
        .header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .body(Body::from(r#"{"error":"unauthorized"}"#));

    match response {
        Ok(response) => response,
        Err(_) => {
            let mut fallback = Response::new(Body::empty());
            *fallback.status_mut() = StatusCode::UNAUTHORIZED;
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use axum::{Router, routing::get};
    use tower::ServiceExt;

    use super::*;

    /// Verifier stub that accepts exactly one token and counts every call.
    struct StubVerifier {
        calls: AtomicUsize,
    }

    impl StubVerifier {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CredentialVerifier for StubVerifier {
        async fn verify(&self, token: &str) -> Result<Principal, VerificationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if token == "valid-token" {
                Ok(Principal {
                    subject: "u1".to_owned(),
                    email: Some("u1@example.com".to_owned()),
                    claims: BTreeMap::new(),
                    issued_at: None,
                    expires_at: None,
                })
            } else {
                Err(VerificationError::Revoked)
            }
        }
    }

    fn app(layer: AuthLayer) -> Router {
        Router::new()
            .route(
                "/whoami",
                get(|req: axum::extract::Request| async move {
                    match req.extensions().get::<Principal>() {
                        Some(principal) => principal.subject.clone(),
                        None => "anonymous".to_owned(),
                    }
                }),
            )
            .layer(layer)
    }

    fn request(authorization: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/whoami");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_string(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn missing_header_rejected_without_verifier_call() {
        let verifier = StubVerifier::new();
        let app = app(AuthLayer::required(verifier.clone()));

        let response = app.oneshot(request(None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(verifier.calls(), 0);
    }

    #[tokio::test]
    async fn wrong_scheme_rejected_without_verifier_call() {
        let verifier = StubVerifier::new();
        let app = app(AuthLayer::required(verifier.clone()));

        let response = app.oneshot(request(Some("Token abc123"))).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(verifier.calls(), 0);
    }

    #[tokio::test]
    async fn scheme_is_case_sensitive() {
        let verifier = StubVerifier::new();
        let app = app(AuthLayer::required(verifier.clone()));

        let response = app
            .oneshot(request(Some("bearer valid-token")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(verifier.calls(), 0);
    }

    #[tokio::test]
    async fn extra_parts_are_malformed() {
        let verifier = StubVerifier::new();
        let app = app(AuthLayer::required(verifier.clone()));

        for value in ["Bearer a b", "Bearer  token", "Bearer"] {
            let response = app.clone().oneshot(request(Some(value))).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{value:?}");
        }

        assert_eq!(verifier.calls(), 0);
    }

    #[tokio::test]
    async fn valid_credential_attaches_principal() {
        let verifier = StubVerifier::new();
        let app = app(AuthLayer::required(verifier.clone()));

        let response = app
            .oneshot(request(Some("Bearer valid-token")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "u1");
        assert_eq!(verifier.calls(), 1);
    }

    #[tokio::test]
    async fn failed_verification_yields_uniform_rejection() {
        let verifier = StubVerifier::new();
        let app = app(AuthLayer::required(verifier.clone()));

        let response = app
            .oneshot(request(Some("Bearer expired-token")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_string(response).await, r#"{"error":"unauthorized"}"#);
        assert_eq!(verifier.calls(), 1);
    }

    #[tokio::test]
    async fn optional_mode_never_rejects() {
        let verifier = StubVerifier::new();
        let app = app(AuthLayer::optional(verifier.clone()));

        for value in [None, Some("Token abc123"), Some("Bearer bad-token")] {
            let response = app.clone().oneshot(request(value)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{value:?}");
            assert_eq!(body_string(response).await, "anonymous");
        }
    }

    #[tokio::test]
    async fn optional_mode_attaches_principal_on_success() {
        let verifier = StubVerifier::new();
        let app = app(AuthLayer::optional(verifier.clone()));

        let response = app
            .oneshot(request(Some("Bearer valid-token")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "u1");
    }
}
