//! sdgrpc Engine Manager
//!
//! Implements the `EngineManager` trait from the engines document
//! (`engines.yaml`). Inference itself stays behind the [`Pipeline`] trait;
//! this crate only decides which engine serves a request, whether it is
//! ready, and serializes runs per engine.

#![warn(missing_docs)]

pub mod config;
pub mod manager;
pub mod pipeline;

pub use config::EngineSpec;
pub use manager::ConfiguredEngineManager;
pub use pipeline::Pipeline;

use thiserror::Error;

/// Errors that can occur while building an engine manager
#[derive(Error, Debug)]
pub enum ManagerError {
    /// Engines document could not be read
    #[error("Failed to read engines document {path}: {source}")]
    FileRead {
        /// Path that was tried
        path: String,
        /// Underlying I/O failure
        source: std::io::Error,
    },

    /// Engines document is not valid YAML for the expected shape
    #[error("Failed to parse engines document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Two engines share an id
    #[error("Duplicate engine id: {0}")]
    DuplicateEngine(String),

    /// More than one engine is flagged default
    #[error("More than one default engine: {0}")]
    MultipleDefaults(String),

    /// Engine entry is unusable
    #[error("Invalid engine entry: {0}")]
    InvalidEngine(String),
}
