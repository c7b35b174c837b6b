//! Agent HTTP surface

pub mod execute;
pub mod health;

use crate::agent::Agent;
use crate::error::{AgentError, AgentResult};
use axum::Router;
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Build the agent's router with all endpoints and request tracing.
pub fn create_router(agent: Agent) -> Router {
    Router::new()
        .merge(health::create_router())
        .merge(execute::create_router())
        .layer(TraceLayer::new_for_http())
        .with_state(agent)
}

impl Agent {
    pub fn router(&self) -> Router {
        create_router(self.clone())
    }

    /// Serve on `listener` until `shutdown` resolves.
    pub async fn serve_with_shutdown<S>(&self, listener: TcpListener, shutdown: S) -> AgentResult<()>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr().ok();
        tracing::info!(node_id = %self.node_id(), addr = ?local_addr, "Agent listening");
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| AgentError::internal(format!("Server error: {}", e)))
    }
}
