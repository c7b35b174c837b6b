//! Workflow events and execution status payloads

use crate::context::ExecutionContext;
use crate::identity::{ExecutionId, RunId, Timestamp, WorkflowId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Execution lifecycle status as reported to the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Succeeded,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observability record of an execution's lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub execution_id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub run_id: RunId,
    pub reasoner_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub agent_node_id: String,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_execution_id: Option<ExecutionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_workflow_id: Option<WorkflowId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl WorkflowEvent {
    pub fn for_context(ctx: &ExecutionContext, status: ExecutionStatus) -> Self {
        Self {
            execution_id: ctx.execution_id.clone(),
            workflow_id: ctx.workflow_id.clone(),
            run_id: ctx.run_id.clone(),
            reasoner_id: ctx.reasoner_name.clone(),
            event_type: ctx.reasoner_name.clone(),
            agent_node_id: ctx.agent_node_id.clone(),
            status,
            parent_execution_id: ctx.parent_execution_id.clone(),
            parent_workflow_id: ctx.parent_workflow_id.clone(),
            input_data: None,
            result: None,
            error: None,
            duration_ms: None,
        }
    }

    pub fn with_input(mut self, input: Value) -> Self {
        self.input_data = Some(input);
        self
    }

    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}

/// Terminal status callback for an execution accepted in async mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStatusUpdate {
    pub execution_id: ExecutionId,
    pub run_id: RunId,
    pub reasoner_name: String,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
    pub started_at: Timestamp,
    pub completed_at: Timestamp,
}

impl ExecutionStatusUpdate {
    pub fn succeeded(ctx: &ExecutionContext, result: Value) -> Self {
        Self::terminal(ctx, ExecutionStatus::Succeeded, Some(result), None)
    }

    pub fn failed(ctx: &ExecutionContext, error: impl Into<String>) -> Self {
        Self::terminal(ctx, ExecutionStatus::Failed, None, Some(error.into()))
    }

    fn terminal(
        ctx: &ExecutionContext,
        status: ExecutionStatus,
        result: Option<Value>,
        error: Option<String>,
    ) -> Self {
        Self {
            execution_id: ctx.execution_id.clone(),
            run_id: ctx.run_id.clone(),
            reasoner_name: ctx.reasoner_name.clone(),
            status,
            result,
            error,
            duration_ms: ctx.elapsed_ms(),
            started_at: ctx.started_at,
            completed_at: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_shape() {
        let ctx = ExecutionContext::root("node", "greet");
        let event = WorkflowEvent::for_context(&ctx, ExecutionStatus::Succeeded)
            .with_result(json!({"ok": true}))
            .with_duration(12);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["status"], "succeeded");
        assert_eq!(value["type"], "greet");
        assert_eq!(value["duration_ms"], 12);
        assert!(value.get("error").is_none());
        assert!(value.get("parent_execution_id").is_none());
    }

    #[test]
    fn test_failed_update_has_error_and_no_result() {
        let ctx = ExecutionContext::root("node", "greet");
        let update = ExecutionStatusUpdate::failed(&ctx, "boom");
        assert_eq!(update.status, ExecutionStatus::Failed);
        assert!(update.status.is_terminal());
        assert_eq!(update.error.as_deref(), Some("boom"));
        assert!(update.result.is_none());
        assert!(update.completed_at >= update.started_at);
    }
}
