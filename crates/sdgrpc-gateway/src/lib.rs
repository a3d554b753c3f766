//! sdgrpc Gateway
//!
//! Builds one set of service implementations and serves it over native gRPC
//! and gRPC-Web at the same time. Startup either brings both listeners up or
//! fails as a whole; once running, the gateway only stops on error.

#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod logging;

pub use cli::Cli;
pub use config::{ConfigError, GatewayConfig};

use axum::Router;
use sdgrpc_domain::EngineManager;
use sdgrpc_engine::{ConfiguredEngineManager, ManagerError, Pipeline};
use sdgrpc_grpc::{serve_native, ServeError, ServiceSet};
use sdgrpc_web::{serve_web, web_router, WebError};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Gateway error
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Engine manager could not be built
    #[error("Failed to build engine manager: {0}")]
    Manager(#[from] ManagerError),

    /// Listener could not be bound
    #[error("Failed to bind {transport} listener on {addr}: {source}")]
    Bind {
        /// Transport the listener was for
        transport: &'static str,
        /// Requested address
        addr: SocketAddr,
        /// Underlying I/O failure
        source: std::io::Error,
    },

    /// Native server failed
    #[error(transparent)]
    Native(#[from] ServeError),

    /// gRPC-Web server failed
    #[error(transparent)]
    Web(#[from] WebError),

    /// A server loop returned without an error
    #[error("{0} server stopped unexpectedly")]
    Stopped(&'static str),
}

/// Pipelines keyed by engine class
pub type PipelineSet = Vec<(String, Arc<dyn Pipeline>)>;

/// Both transports, bound and ready to serve
pub struct Gateway {
    services: ServiceSet,
    web_app: Router,
    native: TcpListener,
    web: TcpListener,
    worker_count: usize,
}

async fn bind(transport: &'static str, addr: SocketAddr) -> Result<TcpListener, GatewayError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| GatewayError::Bind {
            transport,
            addr,
            source,
        })
}

impl Gateway {
    /// Register the services on both transports and bind both listeners
    ///
    /// If the second bind fails the first listener is dropped before the
    /// error is returned.
    pub async fn bind(
        config: &GatewayConfig,
        manager: Arc<dyn EngineManager>,
    ) -> Result<Self, GatewayError> {
        config.validate()?;

        let services = ServiceSet::new(Arc::clone(&manager), config.local_identity())
            .with_max_message_bytes(config.max_message_bytes);
        info!(services = ?ServiceSet::service_names(), "Services registered");

        let web_app = web_router(&services, manager);

        let native = bind("native gRPC", config.native_addr()).await?;
        let web = bind("gRPC-Web", config.web_addr()).await?;

        Ok(Self {
            services,
            web_app,
            native,
            web,
            worker_count: config.worker_count,
        })
    }

    /// Bound address of the native listener
    pub fn native_addr(&self) -> std::io::Result<SocketAddr> {
        self.native.local_addr()
    }

    /// Bound address of the gRPC-Web listener
    pub fn web_addr(&self) -> std::io::Result<SocketAddr> {
        self.web.local_addr()
    }

    /// Serve both transports until one of them stops
    ///
    /// Never returns `Ok`: a server loop ending for any reason is a failure.
    pub async fn run(self) -> Result<Infallible, GatewayError> {
        let Gateway {
            services,
            web_app,
            native,
            web,
            worker_count,
        } = self;

        let native_addr = native.local_addr().ok();
        let web_addr = web.local_addr().ok();

        let native_server = serve_native(native, &services, worker_count);
        let web_server = serve_web(web, web_app);

        // Both listeners are bound, so connections queue from here on
        info!(
            native = ?native_addr,
            web = ?web_addr,
            "Listeners bound, serving both transports"
        );

        tokio::select! {
            result = native_server => {
                result?;
                Err(GatewayError::Stopped("native gRPC"))
            }
            result = web_server => {
                result?;
                Err(GatewayError::Stopped("gRPC-Web"))
            }
        }
    }
}

/// Build the engine manager from the configured engines document
pub fn build_manager(
    config: &GatewayConfig,
    pipelines: PipelineSet,
) -> Result<ConfiguredEngineManager, GatewayError> {
    let mut manager = ConfiguredEngineManager::from_file(&config.engine_config)?;
    if pipelines.is_empty() {
        warn!("No pipelines registered, engines will report not ready");
    }
    for (class, pipeline) in pipelines {
        manager = manager.with_pipeline(&class, pipeline);
    }
    info!(engines = manager.engine_count(), "Engine manager ready");
    Ok(manager)
}

/// Start the gateway with the given pipelines and serve until failure
pub async fn start_with_pipelines(
    config: GatewayConfig,
    pipelines: PipelineSet,
) -> Result<Infallible, GatewayError> {
    info!("Starting sdgrpc gateway");
    info!("Engines document: {}", config.engine_config.display());
    info!("Native worker count: {}", config.worker_count);

    let manager = build_manager(&config, pipelines)?;
    let gateway = Gateway::bind(&config, Arc::new(manager)).await?;
    gateway.run().await
}

/// Start the gateway without inference pipelines
pub async fn start(config: GatewayConfig) -> Result<Infallible, GatewayError> {
    start_with_pipelines(config, Vec::new()).await
}
