//! Trait definitions for external interactions
//!
//! These traits define the boundary between the gateway and the inference
//! side. Implementations live in other crates.

use async_trait::async_trait;

use crate::{EngineDescriptor, EngineError, Generation, GenerationRequest};

/// Owner of every engine the gateway exposes
///
/// One manager is created at startup and shared by reference between the
/// gRPC and gRPC-Web transports for the life of the process.
///
/// # Thread Safety
///
/// Both transports call into the manager concurrently and the gateway adds no
/// locking of its own. Implementations must be safe under concurrent use and
/// serialize internally wherever the underlying hardware requires it.
#[async_trait]
pub trait EngineManager: Send + Sync {
    /// Enumerate the engines visible to clients
    fn list_engines(&self) -> Vec<EngineDescriptor>;

    /// Run a generation request to completion
    async fn generate(&self, request: GenerationRequest) -> Result<Generation, EngineError>;
}
