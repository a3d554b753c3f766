//! Native gRPC server configuration and lifecycle
//!
//! Serves the shared [`ServiceSet`] over plaintext HTTP/2 with a global
//! ceiling on in-flight calls, streaming bodies included, and per-call panic
//! recovery.

use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tower::ServiceBuilder;
use tracing::info;

use crate::ceiling::WorkerCeilingLayer;
use crate::guard::panic_guard;
use crate::registry::ServiceSet;

/// Native server error
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    /// Transport failure while serving
    #[error("gRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// Configuration rejected before serving
    #[error("Invalid native server configuration: {0}")]
    Config(String),
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct NativeServerConfig {
    /// Server listen address
    pub addr: String,

    /// Server port
    pub port: u16,

    /// Maximum calls dispatched concurrently across all connections
    pub worker_count: usize,
}

impl Default for NativeServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1".to_string(),
            port: 50051,
            worker_count: 4,
        }
    }
}

impl NativeServerConfig {
    /// Create a new server configuration
    pub fn new(addr: impl Into<String>, port: u16) -> Self {
        Self {
            addr: addr.into(),
            port,
            ..Default::default()
        }
    }

    /// Set the concurrency ceiling
    pub fn with_workers(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Get the full server address
    pub fn full_address(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }
}

/// Serve the services on an already bound listener until the server stops
///
/// Binding happens in the caller so that bind failures surface before any
/// transport starts serving.
///
/// # Errors
/// Returns error if `worker_count` is zero or the transport fails
pub async fn serve_native(
    listener: TcpListener,
    services: &ServiceSet,
    worker_count: usize,
) -> Result<(), ServeError> {
    if worker_count == 0 {
        return Err(ServeError::Config("worker_count must be at least 1".to_string()));
    }

    let local = listener.local_addr().ok();
    info!(addr = ?local, workers = worker_count, "Native gRPC server starting");

    let layer = ServiceBuilder::new()
        .layer(WorkerCeilingLayer::new(worker_count))
        .layer(panic_guard())
        .into_inner();

    Server::builder()
        .trace_fn(|request| tracing::info_span!("grpc", path = %request.uri().path()))
        .layer(layer)
        .add_routes(services.routes())
        .serve_with_incoming(TcpListenerStream::new(listener))
        .await?;

    Ok(())
}
