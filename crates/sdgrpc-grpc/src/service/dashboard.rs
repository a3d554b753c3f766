//! DashboardService implementation

use sdgrpc_domain::LocalIdentity;
use tonic::{Request, Response, Status};

use crate::conversions::{identity_to_organization, identity_to_user};
use crate::proto;
use crate::proto::dashboard_service_server::DashboardService;

/// Implementation of the DashboardService
///
/// Reports the single local identity; it does not touch the engine manager.
pub struct DashboardServiceImpl {
    identity: LocalIdentity,
}

impl DashboardServiceImpl {
    /// Create a new service instance for the given identity
    pub fn new(identity: LocalIdentity) -> Self {
        Self { identity }
    }
}

#[tonic::async_trait]
impl DashboardService for DashboardServiceImpl {
    async fn get_me(
        &self,
        _request: Request<proto::EmptyRequest>,
    ) -> Result<Response<proto::User>, Status> {
        Ok(Response::new(identity_to_user(&self.identity)))
    }

    async fn get_organization(
        &self,
        request: Request<proto::GetOrganizationRequest>,
    ) -> Result<Response<proto::Organization>, Status> {
        let req = request.into_inner();

        if req.id != self.identity.organization_id {
            return Err(Status::not_found(format!("Organization {} not found", req.id)));
        }

        Ok(Response::new(identity_to_organization(&self.identity)))
    }
}
