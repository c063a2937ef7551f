//! userd server library.
//!
//! Assembles the request pipeline (access log, rate limiting, CORS, auth
//! gate) around the user-account routes and serves it, either for the
//! binary or for tests.

#![deny(missing_docs)]

mod access_log;
mod auth;
mod cors;
mod handlers;
mod health;
mod model;
mod rate_limit;
mod redact;
mod storage;

use std::net::SocketAddr;
use std::sync::Arc;

use ::rate_limit::RateLimiter;
use access_log::AccessLogLayer;
use anyhow::anyhow;
use auth::{AuthLayer, CredentialVerifier, DisabledVerifier, HttpVerifier};
use axum::{
    Router,
    routing::{get, post, put},
};
use axum_server::tls_rustls::RustlsConfig;
use config::Config;
use handlers::AppState;
use rate_limit::RateLimitLayer;
use storage::InMemoryUserStore;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

/// Configuration for serving userd.
pub struct ServeConfig {
    /// The socket address the server binds to.
    pub listen_address: SocketAddr,
    /// The deserialized TOML configuration.
    pub config: Config,
}

/// Starts and runs the server with the provided configuration.
pub async fn serve(ServeConfig { listen_address, config }: ServeConfig) -> anyhow::Result<()> {
    let verifier: Option<Arc<dyn CredentialVerifier>> = match &config.identity {
        Some(identity) => Some(Arc::new(HttpVerifier::new(identity)?)),
        None => {
            log::warn!(
                "No identity provider configured; protected routes will reject every request"
            );
            None
        }
    };

    let state = AppState {
        store: Arc::new(InMemoryUserStore::new()),
        verifier: verifier.clone(),
    };

    let gate_verifier = verifier.unwrap_or_else(|| Arc::new(DisabledVerifier));
    let mut app = router(state, gate_verifier);

    if config.server.health.enabled {
        app = app.route(&config.server.health.path, get(health::health));
    }

    // Pipeline order, innermost out: routes, CORS, rate limiting, access
    // log. Each `layer` call wraps everything added before it, so the access
    // log observes the final status of rate-limit and CORS rejections too.
    let cors = match &config.server.cors {
        Some(cors_config) => cors::generate(cors_config),
        None => CorsLayer::permissive(),
    };
    app = app.layer(cors);

    let shutdown = CancellationToken::new();
    let mut sweeper = None;

    if config.server.rate_limits.enabled {
        let limiter = RateLimiter::new(&config.server.rate_limits);
        sweeper = Some(limiter.spawn_sweeper(shutdown.clone()));
        app = app.layer(RateLimitLayer::new(limiter));
    } else {
        log::debug!("Rate limiting disabled");
    }

    app = app.layer(AccessLogLayer);

    let listener = TcpListener::bind(listen_address)
        .await
        .map_err(|e| anyhow!("Failed to bind to {listen_address}: {e}"))?;

    let result = match &config.server.tls {
        Some(tls_config) => {
            let rustls_config =
                RustlsConfig::from_pem_file(&tls_config.certificate_path, &tls_config.key_path)
                    .await
                    .map_err(|e| anyhow!("Failed to load TLS certificate and key: {e}"))?;

            log::info!("Listening on https://{listen_address}");

            axum_server::from_tcp_rustls(listener.into_std()?, rustls_config)
                .serve(app.into_make_service_with_connect_info::<SocketAddr>())
                .await
                .map_err(|e| anyhow!("Failed to start HTTPS server: {e}"))
        }
        None => {
            log::info!("Listening on http://{listen_address}");

            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
            .await
            .map_err(|e| anyhow!("Failed to start HTTP server: {e}"))
        }
    };

    // Stop the sweeper with the server, whichever way serving ended.
    shutdown.cancel();
    if let Some(handle) = sweeper {
        let _ = handle.await;
    }

    result
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(error) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for the shutdown signal: {error}");
        return;
    }

    log::info!("Shutdown signal received, draining connections");
    shutdown.cancel();
}

/// The route table. Protected routes sit behind the required auth gate,
/// `/auth/status` behind the optional one; everything else is public.
fn router(state: AppState, gate_verifier: Arc<dyn CredentialVerifier>) -> Router {
    let public = Router::new()
        .route("/ping", get(handlers::ping))
        .route("/users", get(handlers::users::list))
        .route("/users/search", get(handlers::users::search))
        .route("/users/count", get(handlers::users::count))
        .route("/users/{id}", get(handlers::users::get))
        .route("/users/subject/{subject}", get(handlers::users::get_by_subject))
        .route("/users/username/{username}", get(handlers::users::get_by_username))
        .route("/users/email/{email}", get(handlers::users::get_by_email))
        .route("/password/strength-check", post(handlers::passwords::strength_check))
        .route("/password/policy", get(handlers::passwords::policy))
        .route("/login/history/{user_id}", get(handlers::logins::history));

    let protected = Router::new()
        .route("/users", post(handlers::users::create))
        .route("/users/active", get(handlers::users::active))
        .route(
            "/users/{id}",
            put(handlers::users::update).delete(handlers::users::delete),
        )
        .route("/users/{id}/login", post(handlers::users::record_login))
        .route("/auth/profile", get(handlers::auth::profile))
        .route("/login/sessions", get(handlers::logins::sessions))
        .layer(AuthLayer::required(gate_verifier.clone()));

    let optional = Router::new()
        .route("/auth/status", get(handlers::auth::status))
        .layer(AuthLayer::optional(gate_verifier));

    // The login route takes the credential in the request body, so it sits
    // in front of the gate rather than behind it.
    let login = Router::new().route("/auth/login", post(handlers::auth::login));

    public
        .merge(protected)
        .merge(optional)
        .merge(login)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use config::RateLimitConfig;
    use crate::auth::{Principal, VerificationError};
    use http::{Request, StatusCode, header};
    use tower::ServiceExt;

    use super::*;

    struct StubVerifier;

    #[async_trait]
    impl CredentialVerifier for StubVerifier {
        async fn verify(&self, token: &str) -> Result<Principal, VerificationError> {
            if token == "valid-token" {
                Ok(Principal {
                    subject: "s-live".to_owned(),
                    email: Some("live@example.com".to_owned()),
                    claims: BTreeMap::from([("role".to_owned(), serde_json::json!("admin"))]),
                    issued_at: "2026-01-01T00:00:00Z".parse().ok(),
                    expires_at: None,
                })
            } else {
                Err(VerificationError::Revoked)
            }
        }
    }

    /// Full pipeline as `serve` assembles it, minus the listener.
    fn test_app(per_second: f64, burst: f64) -> Router {
        let state = AppState {
            store: Arc::new(InMemoryUserStore::new()),
            verifier: Some(Arc::new(StubVerifier)),
        };

        let limiter = RateLimiter::new(&RateLimitConfig {
            enabled: true,
            per_second,
            burst,
            sweep_interval: Duration::from_secs(60),
            idle_after: Duration::from_secs(300),
        });

        router(state, Arc::new(StubVerifier))
            .route("/health", get(health::health))
            .layer(CorsLayer::permissive())
            .layer(RateLimitLayer::new(limiter))
            .layer(AccessLogLayer)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.50")
            .body(Body::empty())
            .unwrap()
    }

    fn post_json(uri: &str, body: &serde_json::Value, bearer: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.50")
            .header(header::CONTENT_TYPE, "application/json");

        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_and_ping_are_public() {
        let app = test_app(100.0, 200.0);

        let response = app.clone().oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "healthy");

        let response = app.oneshot(get_request("/ping")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["message"], "pong");
    }

    #[tokio::test]
    async fn protected_route_requires_credential() {
        let app = test_app(100.0, 200.0);

        let body = serde_json::json!({
            "subject": "s1",
            "email": "a@example.com",
            "username": "alice",
        });

        let response = app
            .clone()
            .oneshot(post_json("/users", &body, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(post_json("/users", &body, Some("valid-token")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let payload = json_body(response).await;
        assert_eq!(payload["message"], "User created successfully");
        assert_eq!(payload["data"]["username"], "alice");
    }

    #[tokio::test]
    async fn duplicate_user_conflicts() {
        let app = test_app(100.0, 200.0);

        let body = serde_json::json!({
            "subject": "s1",
            "email": "a@example.com",
            "username": "alice",
        });

        let response = app
            .clone()
            .oneshot(post_json("/users", &body, Some("valid-token")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let mut duplicate = body.clone();
        duplicate["subject"] = "s2".into();
        duplicate["username"] = "bob".into();

        let response = app
            .oneshot(post_json("/users", &duplicate, Some("valid-token")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            json_body(response).await["error"],
            "a user with this email already exists"
        );
    }

    #[tokio::test]
    async fn invalid_dto_is_a_400_with_details() {
        let app = test_app(100.0, 200.0);

        let body = serde_json::json!({
            "subject": "s1",
            "email": "not-an-email",
            "username": "x",
        });

        let response = app
            .oneshot(post_json("/users", &body, Some("valid-token")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let payload = json_body(response).await;
        assert_eq!(payload["error"], "validation failed");
        assert_eq!(payload["details"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn rate_limit_rejects_before_auth() {
        let app = test_app(0.0, 1.0);

        // First request consumes the only credit; it fails auth, not
        // admission.
        let response = app
            .clone()
            .oneshot(post_json("/users", &serde_json::json!({}), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // Second request is rejected by the limiter without reaching the
        // auth gate, even with a valid credential.
        let response = app
            .oneshot(post_json(
                "/users",
                &serde_json::json!({}),
                Some("valid-token"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn auth_status_reflects_the_caller() {
        let app = test_app(100.0, 200.0);

        let response = app.clone().oneshot(get_request("/auth/status")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["data"]["authenticated"], false);

        let mut request = get_request("/auth/status");
        request.headers_mut().insert(
            header::AUTHORIZATION,
            "Bearer valid-token".parse().unwrap(),
        );

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let payload = json_body(response).await;
        assert_eq!(payload["data"]["authenticated"], true);
        assert_eq!(payload["data"]["subject"], "s-live");
    }

    #[tokio::test]
    async fn login_upserts_the_mirrored_record() {
        let app = test_app(100.0, 200.0);

        let body = serde_json::json!({ "id_token": "valid-token" });

        let response = app
            .clone()
            .oneshot(post_json("/auth/login", &body, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let payload = json_body(response).await;
        assert_eq!(payload["data"]["subject"], "s-live");
        assert_eq!(payload["data"]["login_count"], 1);

        let bad = serde_json::json!({ "id_token": "stolen-token" });
        let response = app
            .oneshot(post_json("/auth/login", &bad, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn disabled_verifier_keeps_protected_routes_closed() {
        let state = AppState {
            store: Arc::new(InMemoryUserStore::new()),
            verifier: None,
        };
        let app = router(state, Arc::new(DisabledVerifier));

        let response = app
            .clone()
            .oneshot(post_json(
                "/users",
                &serde_json::json!({}),
                Some("valid-token"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // Body-credential login reports the outage instead.
        let response = app
            .oneshot(post_json(
                "/auth/login",
                &serde_json::json!({ "id_token": "t" }),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn profile_pairs_user_with_credential_metadata() {
        let app = test_app(100.0, 200.0);

        // Mirror the identity first so the profile lookup resolves.
        let login = serde_json::json!({ "id_token": "valid-token" });
        let response = app
            .clone()
            .oneshot(post_json("/auth/login", &login, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let mut request = get_request("/auth/profile");
        request.headers_mut().insert(
            header::AUTHORIZATION,
            "Bearer valid-token".parse().unwrap(),
        );

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let payload = json_body(response).await;
        assert_eq!(payload["data"]["user"]["subject"], "s-live");
        assert_eq!(payload["data"]["credential"]["claims"]["role"], "admin");
        assert_eq!(
            payload["data"]["credential"]["issued_at"],
            "2026-01-01T00:00:00Z"
        );
    }

    #[tokio::test]
    async fn same_path_mixes_public_and_gated_methods() {
        let app = test_app(100.0, 200.0);

        // GET /users is public.
        let response = app.clone().oneshot(get_request("/users")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // PUT /users/{id} sits behind the gate.
        let body = serde_json::json!({ "first_name": "Ada" });
        let mut request = post_json("/users/999", &body, None);
        *request.method_mut() = http::Method::PUT;

        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // With a credential the request reaches the handler, which reports
        // the missing record rather than an auth failure.
        let mut request = post_json("/users/999", &body, Some("valid-token"));
        *request.method_mut() = http::Method::PUT;

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn search_requires_a_query() {
        let app = test_app(100.0, 200.0);

        let response = app.oneshot(get_request("/users/search")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
