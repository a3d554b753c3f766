//! Errors surfaced by engine managers

use thiserror::Error;

/// Failure of a single engine manager operation
///
/// Every variant is per-call: none of them means the manager itself is
/// unusable for subsequent requests.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// No engine with the requested id exists
    #[error("Unknown engine: {0}")]
    UnknownEngine(String),

    /// Request named no engine and none is marked default
    #[error("No default engine is configured")]
    NoDefaultEngine,

    /// Engine exists but is disabled or has no pipeline attached
    #[error("Engine {0} is not ready")]
    NotReady(String),

    /// Request is well-formed on the wire but unusable by the engine
    #[error("Invalid generation request: {0}")]
    InvalidRequest(String),

    /// Pipeline failed while generating
    #[error("Engine {engine} failed: {message}")]
    Pipeline {
        /// Engine that failed
        engine: String,
        /// Pipeline failure description
        message: String,
    },
}
