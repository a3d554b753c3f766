//! gRPC service implementations
//!
//! One implementation per service of the schema. Each is stateless per call
//! and delegates domain work to the shared engine manager.

mod dashboard;
mod engines;
mod generation;

pub use dashboard::DashboardServiceImpl;
pub use engines::EnginesServiceImpl;
pub use generation::GenerationServiceImpl;
