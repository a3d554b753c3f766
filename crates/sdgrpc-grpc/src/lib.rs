#![warn(missing_docs)]

//! sdgrpc gRPC Service Layer
//!
//! Exposes the engine manager via gRPC. Implements:
//! - GenerationService: server-streaming image generation
//! - DashboardService: the local identity
//! - EnginesService: engine enumeration
//!
//! The service implementations are built once into a [`ServiceSet`]; both the
//! native server in [`server`] and the gRPC-Web bridge build their route
//! tables from that same set.

// Include generated protobuf code
pub mod proto {
    //! Generated protobuf types and service definitions
    #![allow(missing_docs)]
    tonic::include_proto!("gooseai");
}

pub mod ceiling;
pub mod conversions;
pub mod guard;
pub mod registry;
pub mod server;
pub mod service;

#[cfg(test)]
mod testing;

pub use registry::ServiceSet;
pub use server::{serve_native, NativeServerConfig, ServeError};
pub use service::{DashboardServiceImpl, EnginesServiceImpl, GenerationServiceImpl};
