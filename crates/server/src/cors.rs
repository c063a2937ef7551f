use config::{AllowedOrigins, CorsConfig};
use http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

pub(super) fn generate(config: &CorsConfig) -> CorsLayer {
    let mut cors_layer = CorsLayer::new().allow_credentials(config.allow_credentials);

    cors_layer = cors_layer.allow_origin(match &config.allow_origins {
        AllowedOrigins::Any => AllowOrigin::any(),
        AllowedOrigins::List(origins) => {
            let origins = origins
                .iter()
                .filter_map(|origin| {
                    // Scheme, host and port only; a trailing path never
                    // matches a browser's Origin header.
                    HeaderValue::from_str(&origin[..url::Position::BeforePath]).ok()
                })
                .collect::<Vec<_>>();

            AllowOrigin::list(origins)
        }
    });

    // Method and header names are validated at config load, so parse
    // failures cannot occur here; filter_map keeps the layer total anyway.
    let mut methods: Vec<Method> = config
        .allow_methods
        .iter()
        .filter_map(|method| Method::from_bytes(method.as_bytes()).ok())
        .collect();

    // Preflight always needs OPTIONS.
    if !methods.contains(&Method::OPTIONS) {
        methods.push(Method::OPTIONS);
    }

    cors_layer = cors_layer.allow_methods(methods);

    let headers: Vec<HeaderName> = config
        .allow_headers
        .iter()
        .filter_map(|header| HeaderName::from_bytes(header.as_bytes()).ok())
        .collect();

    cors_layer = cors_layer.allow_headers(headers);

    if let Some(max_age) = config.max_age {
        cors_layer = cors_layer.max_age(max_age);
    }

    cors_layer
}
