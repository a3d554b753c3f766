//! EnginesService implementation

use sdgrpc_domain::EngineManager;
use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::debug;

use crate::conversions::engine_to_proto;
use crate::proto;
use crate::proto::engines_service_server::EnginesService;

/// Implementation of the EnginesService
pub struct EnginesServiceImpl {
    manager: Arc<dyn EngineManager>,
}

impl EnginesServiceImpl {
    /// Create a new service instance bound to the manager
    pub fn new(manager: Arc<dyn EngineManager>) -> Self {
        Self { manager }
    }
}

#[tonic::async_trait]
impl EnginesService for EnginesServiceImpl {
    async fn list_engines(
        &self,
        _request: Request<proto::ListEnginesRequest>,
    ) -> Result<Response<proto::Engines>, Status> {
        let engine: Vec<proto::EngineInfo> = self
            .manager
            .list_engines()
            .iter()
            .map(engine_to_proto)
            .collect();
        debug!(count = engine.len(), "Listing engines");

        Ok(Response::new(proto::Engines { engine }))
    }
}
