//! Outermost request logging.
//!
//! Wraps the whole pipeline so the final status and latency are recorded no
//! matter which stage produced the response, including rate-limit and auth
//! rejections.

use std::{
    fmt::Display,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Instant,
};

use axum::body::Body;
use http::{Request, Response};
use tower::Layer;

#[derive(Clone, Default)]
pub struct AccessLogLayer;

impl<Service> Layer<Service> for AccessLogLayer
where
    Service: Send + Clone,
{
    type Service = AccessLogService<Service>;

    fn layer(&self, next: Service) -> Self::Service {
        AccessLogService { next }
    }
}

#[derive(Clone)]
pub struct AccessLogService<Service> {
    next: Service,
}

impl<Service, ReqBody> tower::Service<Request<ReqBody>> for AccessLogService<Service>
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

        let method = req.method().clone();
        let path = req.uri().path().to_owned();
        let start = Instant::now();

        Box::pin(async move {
            let response = next.call(req).await?;
            let elapsed = start.elapsed();
            let status = response.status().as_u16();

            log::info!("{method} {path} {status} {elapsed:?}");

            Ok(response)
        })
    }
}
