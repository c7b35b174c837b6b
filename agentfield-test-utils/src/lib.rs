//! AgentField Test Utilities
//!
//! Shared test infrastructure for the AgentField workspace:
//! - A recording in-memory control plane
//! - Proptest generators for lineage and invocation data
//! - Pre-built agents for common scenarios
//! - Assertions over recorded workflow events

pub use agentfield_agent::{
    Agent, AgentConfig, AgentError, AgentResult, CallbackPolicy, ControlPlane,
};
pub use agentfield_core::{
    ExecutionContext, ExecutionStatus, ExecutionStatusUpdate, LineageMetadata, MemoryAction,
    MemoryChangeEvent, WorkflowEvent,
};

use agentfield_agent::control_plane::{
    AuditFilters, CredentialRequest, ExecutionNote, MemoryRequest, NodeRegistration,
    RemoteExecuteRequest, RemoteExecuteResponse, ShutdownNotice, StatusUpdate, VectorMatch,
    VectorSearchRequest, VectorSetRequest,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

// ============================================================================
// RECORDING CONTROL PLANE
// ============================================================================

/// Everything a [`RecordingControlPlane`] has been sent.
#[derive(Debug, Default, Clone)]
pub struct Recorded {
    pub registrations: Vec<NodeRegistration>,
    pub status_updates: Vec<(String, StatusUpdate)>,
    pub shutdowns: Vec<(String, ShutdownNotice)>,
    pub remote_requests: Vec<RemoteExecuteRequest>,
    pub events: Vec<WorkflowEvent>,
    /// Every callback attempt, successful or not, with the time it was made.
    pub callback_attempts: Vec<(Instant, ExecutionStatusUpdate)>,
    pub completions: Vec<ExecutionStatusUpdate>,
    pub notes: Vec<(String, ExecutionNote)>,
    pub memory_requests: Vec<MemoryRequest>,
    pub vector_sets: Vec<VectorSetRequest>,
    pub vector_searches: Vec<VectorSearchRequest>,
    pub credential_requests: Vec<CredentialRequest>,
    pub audit_requests: Vec<AuditFilters>,
    /// Memory event streams handed out, including rejected attempts.
    pub memory_subscribe_attempts: usize,
}

#[derive(Debug, Default)]
struct Behavior {
    fail_registration: bool,
    fail_status_updates: bool,
    callback_failures_remaining: u32,
    remote_responses: HashMap<String, RemoteExecuteResponse>,
    memory: HashMap<(String, String, String), Value>,
    memory_subscribe_failures_remaining: u32,
    memory_streams: Vec<mpsc::Sender<MemoryChangeEvent>>,
    memory_event_seq: u64,
}

/// In-memory [`ControlPlane`] that records every call.
///
/// Remote executions succeed with `{target, input}` unless a response was
/// configured with [`RecordingControlPlane::respond_to`].
#[derive(Debug, Default)]
pub struct RecordingControlPlane {
    recorded: Mutex<Recorded>,
    behavior: Mutex<Behavior>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RecordingControlPlane {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_registration(&self) {
        lock(&self.behavior).fail_registration = true;
    }

    pub fn fail_status_updates(&self) {
        lock(&self.behavior).fail_status_updates = true;
    }

    /// Reject the next `times` completion callbacks.
    pub fn fail_callbacks(&self, times: u32) {
        lock(&self.behavior).callback_failures_remaining = times;
    }

    pub fn respond_to(&self, target: impl Into<String>, response: RemoteExecuteResponse) {
        lock(&self.behavior)
            .remote_responses
            .insert(target.into(), response);
    }

    pub fn recorded(&self) -> Recorded {
        lock(&self.recorded).clone()
    }

    pub fn events(&self) -> Vec<WorkflowEvent> {
        lock(&self.recorded).events.clone()
    }

    pub fn completions(&self) -> Vec<ExecutionStatusUpdate> {
        lock(&self.recorded).completions.clone()
    }

    /// Poll until at least `count` workflow events arrived or `timeout`
    /// elapsed, then return what was recorded.
    pub async fn wait_for_events(&self, count: usize, timeout: Duration) -> Vec<WorkflowEvent> {
        let _ = tokio::time::timeout(timeout, async {
            while lock(&self.recorded).events.len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        self.events()
    }

    /// Poll until at least `count` completion callbacks were accepted.
    pub async fn wait_for_completions(
        &self,
        count: usize,
        timeout: Duration,
    ) -> Vec<ExecutionStatusUpdate> {
        let _ = tokio::time::timeout(timeout, async {
            while lock(&self.recorded).completions.len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        self.completions()
    }

    /// Poll until at least `count` callback attempts were made.
    pub async fn wait_for_callback_attempts(
        &self,
        count: usize,
        timeout: Duration,
    ) -> Vec<(Instant, ExecutionStatusUpdate)> {
        let _ = tokio::time::timeout(timeout, async {
            while lock(&self.recorded).callback_attempts.len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        lock(&self.recorded).callback_attempts.clone()
    }

    /// Reject the next `times` memory event subscriptions.
    pub fn fail_memory_subscriptions(&self, times: u32) {
        lock(&self.behavior).memory_subscribe_failures_remaining = times;
    }

    /// Drop every open memory event stream, as a lost connection would.
    pub fn close_memory_streams(&self) {
        lock(&self.behavior).memory_streams.clear();
    }

    /// Deliver `event` to every open memory event stream.
    pub async fn publish_memory_event(&self, event: MemoryChangeEvent) {
        let streams = {
            let mut behavior = lock(&self.behavior);
            behavior.memory_streams.retain(|tx| !tx.is_closed());
            behavior.memory_streams.clone()
        };
        for tx in streams {
            let _ = tx.send(event.clone()).await;
        }
    }

    /// Poll until at least `count` open memory event streams exist.
    pub async fn wait_for_memory_streams(&self, count: usize, timeout: Duration) -> usize {
        let open = || {
            lock(&self.behavior)
                .memory_streams
                .iter()
                .filter(|tx| !tx.is_closed())
                .count()
        };
        let _ = tokio::time::timeout(timeout, async {
            while open() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        open()
    }

    fn change_event(
        &self,
        request: &MemoryRequest,
        action: MemoryAction,
        previous_data: Option<Value>,
    ) -> MemoryChangeEvent {
        let seq = {
            let mut behavior = lock(&self.behavior);
            behavior.memory_event_seq += 1;
            behavior.memory_event_seq
        };
        MemoryChangeEvent {
            id: format!("mem_evt_{}", seq),
            scope: request.scope,
            scope_id: request.scope_id.clone(),
            key: request.key.clone(),
            action,
            data: request.data.clone(),
            previous_data,
            metadata: json!({
                "agent_id": request.context.agent_node_id,
                "workflow_id": request.context.workflow_id,
            }),
            timestamp: chrono::Utc::now(),
        }
    }

    fn memory_key(request: &MemoryRequest) -> (String, String, String) {
        (
            request.scope.to_string(),
            request.scope_id.clone(),
            request.key.clone(),
        )
    }
}

#[async_trait]
impl ControlPlane for RecordingControlPlane {
    async fn register_node(&self, registration: &NodeRegistration) -> AgentResult<()> {
        lock(&self.recorded).registrations.push(registration.clone());
        if lock(&self.behavior).fail_registration {
            return Err(AgentError::Registration("rejected by test".to_string()));
        }
        Ok(())
    }

    async fn update_status(&self, node_id: &str, update: &StatusUpdate) -> AgentResult<()> {
        lock(&self.recorded)
            .status_updates
            .push((node_id.to_string(), update.clone()));
        if lock(&self.behavior).fail_status_updates {
            return Err(AgentError::ControlPlane {
                operation: "update_status",
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        Ok(())
    }

    async fn notify_shutdown(&self, node_id: &str, notice: &ShutdownNotice) -> AgentResult<()> {
        lock(&self.recorded)
            .shutdowns
            .push((node_id.to_string(), notice.clone()));
        Ok(())
    }

    async fn execute(&self, request: &RemoteExecuteRequest) -> AgentResult<RemoteExecuteResponse> {
        lock(&self.recorded).remote_requests.push(request.clone());
        if let Some(response) = lock(&self.behavior).remote_responses.get(&request.target) {
            return Ok(response.clone());
        }
        Ok(RemoteExecuteResponse {
            status: "succeeded".to_string(),
            result: Some(json!({ "target": request.target, "input": request.input })),
            ..Default::default()
        })
    }

    async fn send_workflow_event(&self, event: &WorkflowEvent) -> AgentResult<()> {
        lock(&self.recorded).events.push(event.clone());
        Ok(())
    }

    async fn post_execution_status(&self, update: &ExecutionStatusUpdate) -> AgentResult<()> {
        lock(&self.recorded)
            .callback_attempts
            .push((Instant::now(), update.clone()));

        {
            let mut behavior = lock(&self.behavior);
            if behavior.callback_failures_remaining > 0 {
                behavior.callback_failures_remaining -= 1;
                return Err(AgentError::ControlPlane {
                    operation: "post_execution_status",
                    status: 503,
                    message: "callback rejected by test".to_string(),
                });
            }
        }

        lock(&self.recorded).completions.push(update.clone());
        Ok(())
    }

    async fn add_execution_note(
        &self,
        execution_id: &str,
        note: &ExecutionNote,
    ) -> AgentResult<()> {
        lock(&self.recorded)
            .notes
            .push((execution_id.to_string(), note.clone()));
        Ok(())
    }

    async fn memory_get(&self, request: &MemoryRequest) -> AgentResult<Option<Value>> {
        lock(&self.recorded).memory_requests.push(request.clone());
        Ok(lock(&self.behavior)
            .memory
            .get(&Self::memory_key(request))
            .cloned())
    }

    async fn memory_set(&self, request: &MemoryRequest) -> AgentResult<()> {
        lock(&self.recorded).memory_requests.push(request.clone());
        let data = request.data.clone().unwrap_or(Value::Null);
        let previous = lock(&self.behavior)
            .memory
            .insert(Self::memory_key(request), data);
        let event = self.change_event(request, MemoryAction::Set, previous);
        self.publish_memory_event(event).await;
        Ok(())
    }

    async fn memory_delete(&self, request: &MemoryRequest) -> AgentResult<()> {
        lock(&self.recorded).memory_requests.push(request.clone());
        let previous = lock(&self.behavior)
            .memory
            .remove(&Self::memory_key(request));
        let event = self.change_event(request, MemoryAction::Delete, previous);
        self.publish_memory_event(event).await;
        Ok(())
    }

    async fn subscribe_memory_events(&self) -> AgentResult<mpsc::Receiver<MemoryChangeEvent>> {
        lock(&self.recorded).memory_subscribe_attempts += 1;
        let mut behavior = lock(&self.behavior);
        if behavior.memory_subscribe_failures_remaining > 0 {
            behavior.memory_subscribe_failures_remaining -= 1;
            return Err(AgentError::Transport {
                target: "memory_events".to_string(),
                message: "refused by test".to_string(),
            });
        }
        let (tx, rx) = mpsc::channel(64);
        behavior.memory_streams.push(tx);
        Ok(rx)
    }

    async fn memory_vector_set(&self, request: &VectorSetRequest) -> AgentResult<()> {
        lock(&self.recorded).vector_sets.push(request.clone());
        Ok(())
    }

    async fn memory_vector_search(
        &self,
        request: &VectorSearchRequest,
    ) -> AgentResult<Vec<VectorMatch>> {
        let stored = {
            let mut recorded = lock(&self.recorded);
            recorded.vector_searches.push(request.clone());
            recorded
                .vector_sets
                .iter()
                .filter(|v| v.scope == request.scope && v.scope_id == request.scope_id)
                .map(|v| VectorMatch {
                    key: v.key.clone(),
                    score: 1.0,
                    metadata: v.metadata.clone(),
                })
                .take(request.top_k)
                .collect()
        };
        Ok(stored)
    }

    async fn issue_credential(&self, request: &CredentialRequest) -> AgentResult<Value> {
        lock(&self.recorded).credential_requests.push(request.clone());
        Ok(json!({
            "vc_id": format!("vc-{}", request.execution_context.execution_id),
            "status": request.status,
        }))
    }

    async fn export_audit_trail(&self, filters: &AuditFilters) -> AgentResult<Value> {
        lock(&self.recorded).audit_requests.push(filters.clone());
        Ok(json!({ "execution_vcs": [], "total_count": 0 }))
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for lineage and invocation data.

    use super::*;
    use proptest::prelude::*;

    /// Node ids as operators write them: lowercase, digits and dashes.
    pub fn arb_node_id() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9-]{0,15}"
    }

    /// Capability names: never contain `.` or `/`.
    pub fn arb_capability_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,15}"
    }

    pub fn arb_opaque_id() -> impl Strategy<Value = String> {
        "[a-z]{2,5}_[0-9a-f]{8,16}"
    }

    /// Inbound lineage with any subset of fields present.
    pub fn arb_lineage_metadata() -> impl Strategy<Value = LineageMetadata> {
        (
            proptest::option::of(arb_opaque_id()),
            proptest::option::of(arb_opaque_id()),
            proptest::option::of(arb_opaque_id()),
            proptest::option::of(arb_opaque_id()),
            proptest::option::of(arb_opaque_id()),
            proptest::option::of(0u32..32),
        )
            .prop_map(
                |(run_id, workflow_id, parent_execution_id, session_id, actor_id, depth)| {
                    LineageMetadata {
                        run_id,
                        workflow_id,
                        parent_execution_id,
                        session_id,
                        actor_id,
                        depth,
                        ..Default::default()
                    }
                },
            )
    }

    /// Small flat JSON objects used as capability input.
    pub fn arb_json_input() -> impl Strategy<Value = Value> {
        proptest::collection::btree_map("[a-z]{1,8}", any::<i64>(), 0..5).prop_map(|map| {
            Value::Object(map.into_iter().map(|(k, v)| (k, json!(v))).collect())
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built agents for common testing scenarios.

    use super::*;
    use agentfield_agent::AgentRouter;

    pub const CONTROL_PLANE_URL: &str = "http://control-plane.test";

    /// Config for a node attached to a control plane. Async callbacks are
    /// enabled; lease renewal is disabled.
    pub fn connected_config(node_id: &str) -> AgentConfig {
        AgentConfig::new(node_id)
            .with_server(CONTROL_PLANE_URL)
            .with_lease_interval(Duration::ZERO)
    }

    /// `greet` builds a greeting; `relay` forwards its input to `greet`;
    /// `fail` always errors; `panic` panics.
    pub fn demo_agent(config: AgentConfig, control_plane: Arc<RecordingControlPlane>) -> Agent {
        let text = AgentRouter::new("text").skill("upper", |_agent, input| async move {
            let text = input.get("text").and_then(Value::as_str).unwrap_or_default();
            Ok(json!({ "text": text.to_uppercase() }))
        });

        Agent::builder(config)
            .control_plane(control_plane)
            .reasoner("greet", |_agent, input| async move {
                let name = input
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| AgentError::handler("'name' is required"))?;
                Ok(json!({ "greeting": format!("Hello, {}!", name) }))
            })
            .reasoner("relay", |agent, input| async move {
                agent.call("greet", input).await
            })
            .reasoner("fail", |_agent, _input| async move {
                Err::<Value, _>(AgentError::handler("boom"))
            })
            .reasoner("panic", |_agent, _input| async move {
                if true {
                    panic!("handler exploded");
                }
                Ok(Value::Null)
            })
            .reasoner("whoami", |agent, _input| async move {
                let ctx = agent
                    .current_context()
                    .ok_or_else(|| AgentError::internal("no context"))?;
                Ok(json!({
                    "execution_id": ctx.execution_id,
                    "run_id": ctx.run_id,
                    "workflow_id": ctx.workflow_id,
                    "parent_execution_id": ctx.parent_execution_id,
                    "session_id": ctx.session_id,
                    "depth": ctx.depth,
                }))
            })
            .include_router(text)
            .build()
            .unwrap_or_else(|e| panic!("demo agent failed to build: {}", e))
    }

    /// A connected demo agent and its recording control plane.
    pub fn connected_demo_agent(node_id: &str) -> (Agent, Arc<RecordingControlPlane>) {
        let control_plane = RecordingControlPlane::new();
        let agent = demo_agent(connected_config(node_id), Arc::clone(&control_plane));
        (agent, control_plane)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over recorded workflow events.

    use super::*;

    /// Events for `execution_id` in recorded order.
    pub fn events_for<'a>(events: &'a [WorkflowEvent], execution_id: &str) -> Vec<&'a WorkflowEvent> {
        events
            .iter()
            .filter(|e| e.execution_id == execution_id)
            .collect()
    }

    /// Terminal events (succeeded or failed) for capability `name`.
    pub fn terminal_events<'a>(events: &'a [WorkflowEvent], name: &str) -> Vec<&'a WorkflowEvent> {
        events
            .iter()
            .filter(|e| e.reasoner_id == name && e.status.is_terminal())
            .collect()
    }

    /// Assert exactly one terminal event for `name` and return it.
    #[track_caller]
    pub fn assert_single_terminal<'a>(
        events: &'a [WorkflowEvent],
        name: &str,
        status: ExecutionStatus,
    ) -> &'a WorkflowEvent {
        let terminal = terminal_events(events, name);
        assert_eq!(
            terminal.len(),
            1,
            "Expected one terminal event for {}, got: {:?}",
            name,
            terminal
        );
        assert_eq!(terminal[0].status, status, "Wrong terminal status for {}", name);
        terminal[0]
    }
}

// ============================================================================
// TESTS
// ============================================================================
