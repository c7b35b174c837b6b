//! Control-plane request and response payloads

use agentfield_core::{
    CapabilityDescriptor, DeploymentType, ExecutionContext, MemoryScope, MemoryScopeKind,
    Timestamp,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// NODE LIFECYCLE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunicationConfig {
    pub protocols: Vec<String>,
    pub heartbeat_interval: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRegistration {
    pub id: String,
    pub team_id: String,
    pub base_url: String,
    pub version: String,
    pub reasoners: Vec<CapabilityDescriptor>,
    pub skills: Vec<CapabilityDescriptor>,
    pub communication_config: CommunicationConfig,
    pub health_status: String,
    pub last_heartbeat: Timestamp,
    pub registered_at: Timestamp,
    pub metadata: Value,
    pub deployment_type: DeploymentType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodePhase {
    Ready,
    Offline,
}

/// Lease renewal and lifecycle update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub phase: NodePhase,
    pub health_score: u8,
}

impl StatusUpdate {
    pub fn ready() -> Self {
        Self {
            phase: NodePhase::Ready,
            health_score: 100,
        }
    }

    pub fn offline() -> Self {
        Self {
            phase: NodePhase::Offline,
            health_score: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownNotice {
    pub reason: String,
}

// ============================================================================
// REMOTE EXECUTION
// ============================================================================

/// A call routed through the control plane to another node.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteExecuteRequest {
    /// Fully-qualified `node.name` target.
    pub target: String,
    pub input: Value,
    /// Lineage headers describing the caller.
    pub headers: Vec<(&'static str, String)>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteExecuteResponse {
    #[serde(default)]
    pub execution_id: Option<String>,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error_message: Option<String>,
}

// ============================================================================
// MEMORY
// ============================================================================

/// Lineage attached to every memory operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryContext {
    pub agent_node_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

impl MemoryContext {
    pub fn new(agent_node_id: &str, ctx: Option<&ExecutionContext>) -> Self {
        Self {
            agent_node_id: agent_node_id.to_string(),
            workflow_id: ctx.map(|c| c.workflow_id.clone()),
            session_id: ctx.and_then(|c| c.session_id.clone()),
            actor_id: ctx.and_then(|c| c.actor_id.clone()),
            execution_id: ctx.map(|c| c.execution_id.clone()),
            run_id: ctx.map(|c| c.run_id.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRequest {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub scope: MemoryScopeKind,
    pub scope_id: String,
    pub context: MemoryContext,
}

impl MemoryRequest {
    pub fn new(key: impl Into<String>, scope: &MemoryScope, context: MemoryContext) -> Self {
        Self {
            key: key.into(),
            data: None,
            scope: scope.scope,
            scope_id: scope.scope_id.clone(),
            context,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorSetRequest {
    pub key: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: Value,
    pub scope: MemoryScopeKind,
    pub scope_id: String,
    pub context: MemoryContext,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorSearchRequest {
    pub query_embedding: Vec<f32>,
    pub top_k: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Value>,
    pub scope: MemoryScopeKind,
    pub scope_id: String,
    pub context: MemoryContext,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMatch {
    pub key: String,
    pub score: f32,
    #[serde(default)]
    pub metadata: Value,
}

// ============================================================================
// CREDENTIALS & NOTES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialContext {
    pub execution_id: String,
    pub workflow_id: String,
    pub run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_execution_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    pub agent_node_id: String,
    pub reasoner_name: String,
    pub timestamp: Timestamp,
}

impl From<&ExecutionContext> for CredentialContext {
    fn from(ctx: &ExecutionContext) -> Self {
        Self {
            execution_id: ctx.execution_id.clone(),
            workflow_id: ctx.workflow_id.clone(),
            run_id: ctx.run_id.clone(),
            parent_execution_id: ctx.parent_execution_id.clone(),
            session_id: ctx.session_id.clone(),
            actor_id: ctx.actor_id.clone(),
            agent_node_id: ctx.agent_node_id.clone(),
            reasoner_name: ctx.reasoner_name.clone(),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Request to mint a verifiable credential for one execution.
/// `input_data` and `output_data` are base64 of the canonical payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRequest {
    pub execution_context: CredentialContext,
    pub input_data: String,
    pub output_data: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_did: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionNote {
    pub message: String,
    #[serde(default)]
    pub tags: Vec<String>,
}
