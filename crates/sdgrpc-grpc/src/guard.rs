//! Per-call panic recovery shared by both transports
//!
//! A panic inside a service implementation is turned into an `INTERNAL`
//! status for that call only; the connection and server loop keep running.

use std::any::Any;
use tonic::body::BoxBody;
use tonic::Status;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::error;

/// Handler signature used by [`PanicGuardLayer`]
pub type PanicHandler = fn(Box<dyn Any + Send + 'static>) -> http::Response<BoxBody>;

/// Layer converting service panics into gRPC statuses
pub type PanicGuardLayer = CatchPanicLayer<PanicHandler>;

/// Build the panic guard layer
pub fn panic_guard() -> PanicGuardLayer {
    CatchPanicLayer::custom(panic_to_status as PanicHandler)
}

/// Turn a caught panic payload into a trailers-only `INTERNAL` response
pub fn panic_to_status(payload: Box<dyn Any + Send + 'static>) -> http::Response<BoxBody> {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else {
        "non-string panic payload"
    };
    error!(panic = detail, "Service implementation panicked");

    Status::internal("Service implementation panicked").into_http()
}
