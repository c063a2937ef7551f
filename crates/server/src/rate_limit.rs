//! Admission-control middleware for HTTP requests.

use std::{
    fmt::Display,
    future::Future,
    net::{IpAddr, SocketAddr},
    pin::Pin,
    task::{Context, Poll},
};

use axum::{body::Body, extract::ConnectInfo};
use http::{Request, Response, StatusCode, header};
use rate_limit::RateLimiter;
use tower::Layer;

#[derive(Clone)]
pub struct RateLimitLayer(RateLimiter);

impl RateLimitLayer {
    pub fn new(limiter: RateLimiter) -> Self {
        Self(limiter)
    }
}

impl<Service> Layer<Service> for RateLimitLayer
where
    Service: Send + Clone,
{
    type Service = RateLimitService<Service>;

    fn layer(&self, next: Service) -> Self::Service {
        RateLimitService {
            next,
            limiter: self.0.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RateLimitService<Service> {
    next: Service,
    limiter: RateLimiter,
}

impl<Service, ReqBody> tower::Service<Request<ReqBody>> for RateLimitService<Service>
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
        let limiter = self.limiter.clone();

        Box::pin(async move {
            // Admission runs before any other work, including CORS and auth,
            // so abusive clients are rejected as cheaply as possible.
            let key = match extract_client_ip(&req) {
                Some(ip) => ip.to_string(),
                None => "unknown".to_owned(),
            };

            if limiter.allow(&key) {
                return next.call(req).await;
            }

            // Generic body, no Retry-After: the client learns nothing about
            // the limiter's internals.
            let response = Response::builder()
                .status(StatusCode::TOO_MANY_REQUESTS)
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from("Rate limit exceeded"));

            match response {
                Ok(response) => Ok(response),
                Err(_) => {
                    let mut fallback = Response::new(Body::empty());
                    *fallback.status_mut() = StatusCode::TOO_MANY_REQUESTS;
                    Ok(fallback)
                }
            }
        })
    }
}

/// Extract the client IP used as the rate-limit key.
fn extract_client_ip<B>(req: &Request<B>) -> Option<IpAddr> {
    // Direct connection first.
    if let Some(connect_info) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return Some(connect_info.0.ip());
    }

    // X-Forwarded-For for proxied requests; first hop in the chain.
    if let Some(forwarded_for) = req.headers().get("x-forwarded-for") {
        let value = forwarded_for.to_str().ok()?;
        let ip_str = value.split(',').next()?;

        return ip_str.trim().parse::<IpAddr>().ok();
    }

    let ip_str = req.headers().get("x-real-ip")?.to_str().ok()?;

    ip_str.parse::<IpAddr>().ok()
}
