//! Cross-origin policy for the gRPC-Web endpoint
//!
//! Every response leaves with exactly one wildcard value for each of
//! `access-control-allow-origin`, `-methods` and `-headers`. Preflight
//! requests are answered here and never reach the bridge.

use axum::Router;
use http::header::{
    HeaderName, HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

/// Trailing metadata a browser client must be able to read
pub const EXPOSED_HEADERS: [HeaderName; 3] = [
    HeaderName::from_static("grpc-status"),
    HeaderName::from_static("grpc-message"),
    HeaderName::from_static("grpc-status-details-bin"),
];

const WILDCARD: HeaderValue = HeaderValue::from_static("*");

/// The tower-http CORS layer used for preflight and exposed headers
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(EXPOSED_HEADERS)
}

/// Wrap a router with the cross-origin policy
///
/// The overriding header layers sit outermost so that the wildcard values
/// replace anything produced further in.
pub fn with_cors(router: Router) -> Router {
    router
        .layer(cors_layer())
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            WILDCARD,
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_METHODS,
            WILDCARD,
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_HEADERS,
            WILDCARD,
        ))
}
