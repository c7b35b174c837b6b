//! AgentField Core - Agent Runtime Data Model
//!
//! Pure data structures shared by every crate in the workspace: execution
//! lineage, capability descriptors, workflow events and memory scopes.
//! This crate performs no I/O - the runtime lives in `agentfield-agent`.

pub mod canonical;
pub mod capability;
pub mod context;
pub mod error;
pub mod event;
pub mod identity;
pub mod memory;
pub mod target;

pub use canonical::{canonical_json, canonicalize};
pub use capability::{
    default_schema, CapabilityDescriptor, CapabilityKind, DeploymentType,
};
pub use context::{headers, ExecutionContext, LineageMetadata};
pub use error::{ConfigError, CoreResult, TargetError};
pub use event::{ExecutionStatus, ExecutionStatusUpdate, WorkflowEvent};
pub use identity::{
    new_execution_id, new_run_id, ExecutionId, RunId, Timestamp, WorkflowId,
};
pub use memory::{
    key_matches, MemoryAction, MemoryChangeEvent, MemoryScope, MemoryScopeKind, GLOBAL_SCOPE_ID,
};
pub use target::TargetRef;
