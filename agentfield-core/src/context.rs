//! Execution lineage
//!
//! An [`ExecutionContext`] is the runtime's record of where an invocation
//! sits in a workflow tree. Every execution owns exactly one, derived either
//! from inbound request metadata at a node boundary or from the caller's own
//! context for an in-process call.
//!
//! Lineage invariants held by every constructor in this module:
//!
//! - a child shares its parent's `run_id`
//! - `child.parent_execution_id == Some(parent.execution_id)`
//! - `child.depth == parent.depth + 1`
//! - a root has no parent and depth 0

use crate::identity::{new_execution_id, new_run_id, ExecutionId, RunId, Timestamp, WorkflowId};
use serde::{Deserialize, Serialize};

/// Header names used to carry lineage across node boundaries.
pub mod headers {
    pub const RUN_ID: &str = "X-Run-ID";
    pub const WORKFLOW_ID: &str = "X-Workflow-ID";
    pub const EXECUTION_ID: &str = "X-Execution-ID";
    pub const PARENT_EXECUTION_ID: &str = "X-Parent-Execution-ID";
    pub const PARENT_WORKFLOW_ID: &str = "X-Parent-Workflow-ID";
    pub const ROOT_WORKFLOW_ID: &str = "X-Root-Workflow-ID";
    pub const SESSION_ID: &str = "X-Session-ID";
    pub const ACTOR_ID: &str = "X-Actor-ID";
    pub const WORKFLOW_DEPTH: &str = "X-Workflow-Depth";
}

// ============================================================================
// LINEAGE METADATA
// ============================================================================

/// Loosely-typed lineage fields as they arrive on the wire.
///
/// Populated from request headers and from an `execution_context` body
/// object. Keys are matched without regard to case, `x-` prefixes,
/// underscores or dashes, so `X-Run-ID`, `run_id` and `runId` are the
/// same field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageMetadata {
    pub run_id: Option<String>,
    pub workflow_id: Option<String>,
    pub execution_id: Option<String>,
    pub parent_execution_id: Option<String>,
    pub parent_workflow_id: Option<String>,
    pub root_workflow_id: Option<String>,
    pub session_id: Option<String>,
    pub actor_id: Option<String>,
    pub depth: Option<u32>,
}

fn normalize_key(key: &str) -> String {
    let lower = key.trim().to_ascii_lowercase();
    let stripped = lower.strip_prefix("x-").unwrap_or(&lower);
    stripped.chars().filter(|c| *c != '_' && *c != '-').collect()
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl LineageMetadata {
    /// Build metadata from key/value pairs. Unknown keys are ignored, empty
    /// values are treated as absent and the first occurrence of a key wins.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut meta = Self::default();
        for (key, value) in pairs {
            meta.set_if_absent(key, value);
        }
        meta
    }

    /// Build metadata from a JSON object such as a body's `execution_context`.
    /// Non-string scalars are stringified; nested values are ignored.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let mut meta = Self::default();
        if let Some(obj) = value.as_object() {
            for (key, raw) in obj {
                let text = match raw {
                    serde_json::Value::String(s) => s.clone(),
                    serde_json::Value::Number(n) => n.to_string(),
                    serde_json::Value::Bool(b) => b.to_string(),
                    _ => continue,
                };
                meta.set_if_absent(key, &text);
            }
        }
        meta
    }

    fn set_if_absent(&mut self, key: &str, value: &str) {
        let Some(value) = non_empty(value) else {
            return;
        };
        let slot = match normalize_key(key).as_str() {
            "runid" => &mut self.run_id,
            "workflowid" => &mut self.workflow_id,
            "executionid" => &mut self.execution_id,
            "parentexecutionid" => &mut self.parent_execution_id,
            "parentworkflowid" => &mut self.parent_workflow_id,
            "rootworkflowid" => &mut self.root_workflow_id,
            "sessionid" => &mut self.session_id,
            "actorid" => &mut self.actor_id,
            "workflowdepth" | "depth" => {
                if self.depth.is_none() {
                    self.depth = value.parse().ok();
                }
                return;
            }
            _ => return,
        };
        if slot.is_none() {
            *slot = Some(value);
        }
    }

    /// Fill every absent field from `other`. Present fields are kept.
    pub fn merge_missing(&mut self, other: LineageMetadata) {
        fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
            if slot.is_none() {
                *slot = value;
            }
        }
        fill(&mut self.run_id, other.run_id);
        fill(&mut self.workflow_id, other.workflow_id);
        fill(&mut self.execution_id, other.execution_id);
        fill(&mut self.parent_execution_id, other.parent_execution_id);
        fill(&mut self.parent_workflow_id, other.parent_workflow_id);
        fill(&mut self.root_workflow_id, other.root_workflow_id);
        fill(&mut self.session_id, other.session_id);
        fill(&mut self.actor_id, other.actor_id);
        fill(&mut self.depth, other.depth);
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ============================================================================
// EXECUTION CONTEXT
// ============================================================================

/// Lineage of one execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub execution_id: ExecutionId,
    pub run_id: RunId,
    pub workflow_id: WorkflowId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_execution_id: Option<ExecutionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_workflow_id: Option<WorkflowId>,
    pub root_workflow_id: WorkflowId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<String>,
    pub depth: u32,
    pub agent_node_id: String,
    pub reasoner_name: String,
    pub started_at: Timestamp,
}

impl ExecutionContext {
    /// Start a brand new workflow tree.
    pub fn root(agent_node_id: impl Into<String>, reasoner_name: impl Into<String>) -> Self {
        let run_id = new_run_id();
        Self {
            execution_id: new_execution_id(),
            workflow_id: run_id.clone(),
            root_workflow_id: run_id.clone(),
            run_id,
            parent_execution_id: None,
            parent_workflow_id: None,
            session_id: None,
            actor_id: None,
            depth: 0,
            agent_node_id: agent_node_id.into(),
            reasoner_name: reasoner_name.into(),
            started_at: chrono::Utc::now(),
        }
    }

    /// Derive the context of an in-process call made from this execution.
    pub fn derive_child(
        &self,
        agent_node_id: impl Into<String>,
        reasoner_name: impl Into<String>,
    ) -> Self {
        Self {
            execution_id: new_execution_id(),
            run_id: self.run_id.clone(),
            workflow_id: self.workflow_id.clone(),
            parent_execution_id: Some(self.execution_id.clone()),
            parent_workflow_id: Some(self.workflow_id.clone()),
            root_workflow_id: self.root_workflow_id.clone(),
            session_id: self.session_id.clone(),
            actor_id: self.actor_id.clone(),
            depth: self.depth + 1,
            agent_node_id: agent_node_id.into(),
            reasoner_name: reasoner_name.into(),
            started_at: chrono::Utc::now(),
        }
    }

    /// Derive a child of `parent`, or a fresh root when there is no parent.
    pub fn derive_or_root(
        parent: Option<&ExecutionContext>,
        agent_node_id: impl Into<String>,
        reasoner_name: impl Into<String>,
    ) -> Self {
        match parent {
            Some(parent) => parent.derive_child(agent_node_id, reasoner_name),
            None => Self::root(agent_node_id, reasoner_name),
        }
    }

    /// Build the context of an execution received at a node boundary.
    ///
    /// Missing ids are generated. The workflow defaults to the run and the
    /// root workflow defaults to the workflow. A provided execution id is
    /// kept verbatim so the control plane can correlate callbacks with it.
    pub fn from_lineage(
        meta: &LineageMetadata,
        agent_node_id: impl Into<String>,
        reasoner_name: impl Into<String>,
    ) -> Self {
        let run_id = meta.run_id.clone().unwrap_or_else(new_run_id);
        let workflow_id = meta.workflow_id.clone().unwrap_or_else(|| run_id.clone());
        let root_workflow_id = meta
            .root_workflow_id
            .clone()
            .unwrap_or_else(|| workflow_id.clone());
        let parent_workflow_id = meta.parent_workflow_id.clone().or_else(|| {
            meta.parent_execution_id
                .as_ref()
                .map(|_| root_workflow_id.clone())
        });
        let depth = meta
            .depth
            .unwrap_or(u32::from(meta.parent_execution_id.is_some()));
        Self {
            execution_id: meta.execution_id.clone().unwrap_or_else(new_execution_id),
            run_id,
            workflow_id,
            parent_execution_id: meta.parent_execution_id.clone(),
            parent_workflow_id,
            root_workflow_id,
            session_id: meta.session_id.clone(),
            actor_id: meta.actor_id.clone(),
            depth,
            agent_node_id: agent_node_id.into(),
            reasoner_name: reasoner_name.into(),
            started_at: chrono::Utc::now(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_execution_id.is_none()
    }

    /// Headers attached to an outbound call made from this execution.
    /// The callee sees this execution as its parent.
    pub fn outbound_headers(&self) -> Vec<(&'static str, String)> {
        let mut out = vec![
            (headers::RUN_ID, self.run_id.clone()),
            (headers::PARENT_EXECUTION_ID, self.execution_id.clone()),
            (headers::WORKFLOW_ID, self.workflow_id.clone()),
            (headers::ROOT_WORKFLOW_ID, self.root_workflow_id.clone()),
            (headers::WORKFLOW_DEPTH, (self.depth + 1).to_string()),
        ];
        if let Some(session) = &self.session_id {
            out.push((headers::SESSION_ID, session.clone()));
        }
        if let Some(actor) = &self.actor_id {
            out.push((headers::ACTOR_ID, actor.clone()));
        }
        out
    }

    /// Lineage metadata describing this execution itself.
    pub fn to_lineage(&self) -> LineageMetadata {
        LineageMetadata {
            run_id: Some(self.run_id.clone()),
            workflow_id: Some(self.workflow_id.clone()),
            execution_id: Some(self.execution_id.clone()),
            parent_execution_id: self.parent_execution_id.clone(),
            parent_workflow_id: self.parent_workflow_id.clone(),
            root_workflow_id: Some(self.root_workflow_id.clone()),
            session_id: self.session_id.clone(),
            actor_id: self.actor_id.clone(),
            depth: Some(self.depth),
        }
    }

    /// Milliseconds elapsed since the execution started.
    pub fn elapsed_ms(&self) -> u64 {
        let elapsed = chrono::Utc::now() - self.started_at;
        u64::try_from(elapsed.num_milliseconds()).unwrap_or(0)
    }
}
