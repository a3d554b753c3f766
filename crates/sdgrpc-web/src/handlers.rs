//! Plain HTTP handlers served next to the bridge.
//!
//! Implements the health check endpoint using axum.

use axum::{extract::State, response::Json, routing::get, Router};
use sdgrpc_domain::EngineManager;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Engine manager backing the services
    pub manager: Arc<dyn EngineManager>,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    /// Overall health status
    pub status: String,
    /// Number of listed engines
    pub engine_count: usize,
    /// Number of engines ready to generate
    pub ready_engines: usize,
}

/// GET /health - Engine readiness summary
async fn health_check(State(state): State<AppState>) -> Json<HealthCheckResponse> {
    let engines = state.manager.list_engines();
    let ready_engines = engines.iter().filter(|e| e.ready).count();

    let status = if ready_engines == 0 {
        "unhealthy"
    } else if ready_engines < engines.len() {
        "degraded"
    } else {
        "healthy"
    };

    Json(HealthCheckResponse {
        status: status.to_string(),
        engine_count: engines.len(),
        ready_engines,
    })
}

/// Create the axum router with the plain HTTP routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(state)
}
