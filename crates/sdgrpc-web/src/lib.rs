//! sdgrpc gRPC-Web Transport
//!
//! Serves the shared service implementations to browsers and other HTTP/1.1
//! clients. A request passes, outermost first, through the cross-origin
//! policy ([`cors`]), the header compatibility chain ([`compat`]) and the
//! protocol bridge ([`bridge`]) before it reaches the same route table the
//! native server uses. `GET /health` is served alongside.

#![warn(missing_docs)]

pub mod bridge;
pub mod compat;
pub mod cors;
pub mod frame;
pub mod handlers;

use axum::Router;
use handlers::{create_router, AppState};
use sdgrpc_domain::EngineManager;
use sdgrpc_grpc::ServiceSet;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use bridge::GrpcWebService;
pub use compat::{CompatLayer, HeaderTransform, TransformChain};
pub use frame::{Encoding, FrameError};

/// gRPC-Web server error
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    /// Server I/O error
    #[error("gRPC-Web server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Build the complete gRPC-Web application
pub fn web_router(services: &ServiceSet, manager: Arc<dyn EngineManager>) -> Router {
    let app = create_router(AppState { manager })
        .fallback_service(GrpcWebService::new(services))
        .layer(CompatLayer::new(TransformChain::compatibility()));

    cors::with_cors(app).layer(TraceLayer::new_for_http())
}

/// Serve the application on an already bound listener until it stops
pub async fn serve_web(listener: TcpListener, app: Router) -> Result<(), WebError> {
    let local = listener.local_addr().ok();
    info!(addr = ?local, "gRPC-Web server starting");

    axum::serve(listener, app).await?;

    Ok(())
}
