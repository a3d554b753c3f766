//! sdgrpc Domain Layer
//!
//! Core vocabulary shared by every transport of the gateway: engine
//! descriptors, generation requests and results, the local identity served by
//! the dashboard, and the [`traits::EngineManager`] boundary behind which all
//! inference work happens.
//!
//! ## Architecture
//!
//! - No transport types (no protobuf, no HTTP) live here
//! - The engine manager is an interface; implementations live in other crates
//! - Both the gRPC and gRPC-Web transports call into the same trait object

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod error;
pub mod generation;
pub mod identity;
pub mod traits;

// Re-exports for convenience
pub use engine::{EngineDescriptor, EngineKind};
pub use error::EngineError;
pub use generation::{Generation, GeneratedImage, GenerationRequest, ImageParams, WeightedPrompt};
pub use identity::LocalIdentity;
pub use traits::EngineManager;
