//! Pipeline seam - the code that actually turns requests into images

use async_trait::async_trait;
use sdgrpc_domain::{GeneratedImage, GenerationRequest};

use crate::config::EngineSpec;

/// An inference backend for one pipeline class
///
/// The manager serializes calls per engine, so an implementation sees at most
/// one in-flight request for a given engine at a time. Distinct engines may
/// share a pipeline and run concurrently.
#[async_trait]
pub trait Pipeline: Send + Sync {
    /// Generate images for `request` using the engine described by `engine`
    async fn run(
        &self,
        engine: &EngineSpec,
        request: &GenerationRequest,
    ) -> anyhow::Result<Vec<GeneratedImage>>;
}
