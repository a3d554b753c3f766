//! The shared set of service implementations
//!
//! Both transports build their route tables from one [`ServiceSet`]. Every
//! route table holds another reference to the same `Arc`'d implementations,
//! never a copy, so the two protocols cannot diverge.

use sdgrpc_domain::{EngineManager, LocalIdentity};
use std::sync::Arc;
use tonic::server::NamedService;
use tonic::service::Routes;

use crate::proto::dashboard_service_server::DashboardServiceServer;
use crate::proto::engines_service_server::EnginesServiceServer;
use crate::proto::generation_service_server::GenerationServiceServer;
use crate::service::{DashboardServiceImpl, EnginesServiceImpl, GenerationServiceImpl};

/// Default ceiling for a single decoded request message (64 MiB)
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 64 * 1024 * 1024;

/// Service implementations shared by every transport
#[derive(Clone)]
pub struct ServiceSet {
    generation: Arc<GenerationServiceImpl>,
    dashboard: Arc<DashboardServiceImpl>,
    engines: Arc<EnginesServiceImpl>,
    max_message_bytes: usize,
}

impl ServiceSet {
    /// Build each service implementation once, bound to the manager
    pub fn new(manager: Arc<dyn EngineManager>, identity: LocalIdentity) -> Self {
        Self {
            generation: Arc::new(GenerationServiceImpl::new(Arc::clone(&manager))),
            dashboard: Arc::new(DashboardServiceImpl::new(identity)),
            engines: Arc::new(EnginesServiceImpl::new(manager)),
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }

    /// Override the largest request message the services will decode
    pub fn with_max_message_bytes(mut self, limit: usize) -> Self {
        self.max_message_bytes = limit;
        self
    }

    /// Largest request message the services will decode
    pub fn max_message_bytes(&self) -> usize {
        self.max_message_bytes
    }

    /// Fully qualified names of the registered services
    pub fn service_names() -> [&'static str; 3] {
        [
            <GenerationServiceServer<GenerationServiceImpl> as NamedService>::NAME,
            <DashboardServiceServer<DashboardServiceImpl> as NamedService>::NAME,
            <EnginesServiceServer<EnginesServiceImpl> as NamedService>::NAME,
        ]
    }

    /// Route table dispatching to the shared implementations
    pub fn routes(&self) -> Routes {
        let limit = self.max_message_bytes;
        Routes::new(
            GenerationServiceServer::from_arc(Arc::clone(&self.generation))
                .max_decoding_message_size(limit),
        )
        .add_service(
            DashboardServiceServer::from_arc(Arc::clone(&self.dashboard))
                .max_decoding_message_size(limit),
        )
        .add_service(
            EnginesServiceServer::from_arc(Arc::clone(&self.engines))
                .max_decoding_message_size(limit),
        )
    }

    /// The generation service instance
    pub fn generation(&self) -> &Arc<GenerationServiceImpl> {
        &self.generation
    }

    /// The dashboard service instance
    pub fn dashboard(&self) -> &Arc<DashboardServiceImpl> {
        &self.dashboard
    }

    /// The engines service instance
    pub fn engines(&self) -> &Arc<EnginesServiceImpl> {
        &self.engines
    }
}
