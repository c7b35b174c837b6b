//! Identity types for executions and runs

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Identifier of a single capability invocation.
pub type ExecutionId = String;

/// Identifier shared by every execution of one top-level workflow instance.
pub type RunId = String;

/// Identifier of a workflow. Equals the run id unless a node boundary
/// assigned a different one.
pub type WorkflowId = String;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new run id.
///
/// Ids are opaque to the control plane; the UUIDv7 body keeps them unique
/// across processes and roughly sortable by creation time.
pub fn new_run_id() -> RunId {
    format!("run_{}", Uuid::now_v7().simple())
}

/// Generate a new execution id.
pub fn new_execution_id() -> ExecutionId {
    format!("exec_{}", Uuid::now_v7().simple())
}
