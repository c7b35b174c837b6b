//! Health and discovery endpoints
//!
//! - `GET /health` - liveness with node identity and uptime
//! - `GET /discover` - capability manifest

use crate::agent::{Agent, DiscoveryManifest};
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub version: String,
    pub uptime_seconds: u64,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health
pub async fn health(State(agent): State<Agent>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "ok".to_string(),
        node_id: agent.node_id().to_string(),
        version: agent.config().version.clone(),
        uptime_seconds: agent.uptime_seconds(),
    };
    (StatusCode::OK, Json(response))
}

/// GET /discover
pub async fn discover(State(agent): State<Agent>) -> Json<DiscoveryManifest> {
    Json(agent.discovery_manifest())
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<Agent> {
    Router::new()
        .route("/health", get(health))
        .route("/discover", get(discover))
}
