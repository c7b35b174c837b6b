//! Control-plane seam
//!
//! Everything the runtime sends to the control plane goes through the
//! [`ControlPlane`] trait. [`HttpControlPlane`] is the production
//! implementation; tests substitute a recording double.

mod client;
mod types;

pub use client::HttpControlPlane;
pub use types::{
    AuditFilters, CommunicationConfig, CredentialContext, CredentialRequest, ExecutionNote,
    MemoryContext, MemoryRequest, NodePhase, NodeRegistration, RemoteExecuteRequest,
    RemoteExecuteResponse, ShutdownNotice, StatusUpdate, VectorMatch, VectorSearchRequest,
    VectorSetRequest,
};

use crate::error::AgentResult;
use agentfield_core::{ExecutionStatusUpdate, MemoryChangeEvent, WorkflowEvent};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

/// Operations the agent runtime performs against the control plane.
///
/// Implementations bound every call with a timeout and map network
/// failures to [`crate::AgentError::Transport`].
#[async_trait]
pub trait ControlPlane: Send + Sync {
    // ========================================================================
    // NODE LIFECYCLE
    // ========================================================================

    async fn register_node(&self, registration: &NodeRegistration) -> AgentResult<()>;

    /// Lease renewal and lifecycle phase changes.
    async fn update_status(&self, node_id: &str, update: &StatusUpdate) -> AgentResult<()>;

    async fn notify_shutdown(&self, node_id: &str, notice: &ShutdownNotice) -> AgentResult<()>;

    // ========================================================================
    // EXECUTION
    // ========================================================================

    /// Run a capability on another node. Returns the upstream response
    /// as-is; interpreting its status is the caller's job.
    async fn execute(&self, request: &RemoteExecuteRequest) -> AgentResult<RemoteExecuteResponse>;

    async fn send_workflow_event(&self, event: &WorkflowEvent) -> AgentResult<()>;

    /// Terminal status callback for an execution accepted asynchronously.
    async fn post_execution_status(&self, update: &ExecutionStatusUpdate) -> AgentResult<()>;

    async fn add_execution_note(&self, execution_id: &str, note: &ExecutionNote)
        -> AgentResult<()>;

    // ========================================================================
    // MEMORY
    // ========================================================================

    async fn memory_get(&self, request: &MemoryRequest) -> AgentResult<Option<Value>>;

    async fn memory_set(&self, request: &MemoryRequest) -> AgentResult<()>;

    async fn memory_delete(&self, request: &MemoryRequest) -> AgentResult<()>;

    async fn memory_vector_set(&self, request: &VectorSetRequest) -> AgentResult<()>;

    async fn memory_vector_search(
        &self,
        request: &VectorSearchRequest,
    ) -> AgentResult<Vec<VectorMatch>>;

    /// Open a stream of memory change events. The receiver yields `None`
    /// once the connection drops; reconnecting is the caller's job.
    async fn subscribe_memory_events(&self) -> AgentResult<mpsc::Receiver<MemoryChangeEvent>>;

    // ========================================================================
    // CREDENTIALS
    // ========================================================================

    async fn issue_credential(&self, request: &CredentialRequest) -> AgentResult<Value>;

    async fn export_audit_trail(&self, filters: &AuditFilters) -> AgentResult<Value>;
}
