//! Memory and credential facades against the recording control plane

use agentfield_agent::control_plane::AuditFilters;
use agentfield_agent::{propagation, AgentError};
use agentfield_core::{ExecutionContext, ExecutionStatus, MemoryScopeKind, GLOBAL_SCOPE_ID};
use agentfield_test_utils::fixtures::connected_demo_agent;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::json;
use std::time::Duration;

// ============================================================================
// MEMORY
// ============================================================================

#[tokio::test]
async fn test_memory_round_trip_in_workflow_scope() {
    let (agent, cp) = connected_demo_agent("node-a");
    let mut ctx = ExecutionContext::root("node-a", "greet");
    ctx.session_id = Some("sess_1".to_string());
    let workflow_id = ctx.workflow_id.clone();
    let execution_id = ctx.execution_id.clone();

    let memory = agent.memory();
    let (stored, exists_after_delete) = propagation::scope(ctx, async move {
        memory.set("counter", json!(3)).await?;
        let stored = memory.get("counter").await?;
        memory.delete("counter").await?;
        let exists = memory.exists("counter").await?;
        Ok::<_, AgentError>((stored, exists))
    })
    .await
    .unwrap();

    assert_eq!(stored, Some(json!(3)));
    assert!(!exists_after_delete);

    let requests = cp.recorded().memory_requests;
    let set = &requests[0];
    assert_eq!(set.scope, MemoryScopeKind::Workflow);
    assert_eq!(set.scope_id, workflow_id);
    assert_eq!(set.data, Some(json!(3)));
    assert_eq!(set.context.agent_node_id, "node-a");
    assert_eq!(set.context.session_id.as_deref(), Some("sess_1"));
    assert_eq!(set.context.execution_id.as_deref(), Some(execution_id.as_str()));
}

#[tokio::test]
async fn test_memory_outside_execution_uses_global_scope() {
    let (agent, cp) = connected_demo_agent("node-a");
    agent.memory().set("k", json!("v")).await.unwrap();
    assert_eq!(agent.memory().global().get_or("k", json!(null)).await.unwrap(), json!("v"));

    let request = &cp.recorded().memory_requests[0];
    assert_eq!(request.scope, MemoryScopeKind::Global);
    assert_eq!(request.scope_id, GLOBAL_SCOPE_ID);
}

#[tokio::test]
async fn test_explicit_scopes_partition_data() {
    let (agent, _cp) = connected_demo_agent("node-a");
    let memory = agent.memory();

    memory.session("s1").set("k", json!(1)).await.unwrap();
    memory.actor("a1").set("k", json!(2)).await.unwrap();

    assert_eq!(memory.session("s1").get("k").await.unwrap(), Some(json!(1)));
    assert_eq!(memory.actor("a1").get("k").await.unwrap(), Some(json!(2)));
    assert_eq!(memory.session("s2").get("k").await.unwrap(), None);
    assert_eq!(memory.workflow("wf").get_or("k", json!(0)).await.unwrap(), json!(0));
}

#[tokio::test]
async fn test_vector_store_and_search_share_scope() {
    let (agent, cp) = connected_demo_agent("node-a");
    let memory = agent.memory().session("s1");

    memory
        .set_vector("doc-1", vec![0.1, 0.2], json!({"title": "one"}))
        .await
        .unwrap();
    let matches = memory.search_vector(vec![0.1, 0.2], 5, None).await.unwrap();

    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].key, "doc-1");
    assert_eq!(matches[0].metadata["title"], "one");
    assert_eq!(cp.recorded().vector_searches[0].top_k, 5);
}

// ============================================================================
// CREDENTIALS
// ============================================================================

#[tokio::test]
async fn test_credential_request_binds_lineage_and_encodes_payloads() {
    let (agent, cp) = connected_demo_agent("node-a");
    agent.credentials().enable();
    let ctx = ExecutionContext::root("node-a", "greet");
    let execution_id = ctx.execution_id.clone();

    let credentials = agent.credentials();
    let input = json!({"b": 1, "a": 2});
    let output = json!("done");
    let vc = propagation::scope(ctx, async move {
        credentials
            .issue(Some(&input), Some(&output), ExecutionStatus::Succeeded, None)
            .await
    })
    .await
    .unwrap();
    assert_eq!(vc["vc_id"], format!("vc-{}", execution_id));

    let request = &cp.recorded().credential_requests[0];
    assert_eq!(request.execution_context.execution_id, execution_id);
    assert_eq!(request.execution_context.agent_node_id, "node-a");
    assert_eq!(request.status, "succeeded");
    assert_eq!(request.input_data, STANDARD.encode(r#"{"a":2,"b":1}"#));
    assert_eq!(request.output_data, STANDARD.encode("done"));
}

#[tokio::test]
async fn test_credentials_disabled_by_default() {
    let (agent, cp) = connected_demo_agent("node-a");
    let ctx = ExecutionContext::root("node-a", "greet");
    let credentials = agent.credentials();

    let result = propagation::scope(ctx, async move {
        credentials
            .issue(None, None, ExecutionStatus::Succeeded, None)
            .await
    })
    .await;
    assert!(matches!(result, Err(AgentError::CredentialsDisabled)));
    assert!(cp.recorded().credential_requests.is_empty());
}

#[tokio::test]
async fn test_issue_outside_execution_fails() {
    let (agent, _cp) = connected_demo_agent("node-a");
    agent.credentials().enable();
    let result = agent
        .credentials()
        .issue(None, None, ExecutionStatus::Succeeded, None)
        .await;
    assert!(matches!(result, Err(AgentError::Internal(_))));
}

#[tokio::test]
async fn test_audit_export_passes_filters() {
    let (agent, cp) = connected_demo_agent("node-a");
    agent.credentials().enable();

    let filters = AuditFilters {
        workflow_id: Some("wf_1".to_string()),
        limit: Some(10),
        ..Default::default()
    };
    let trail = agent.credentials().export_audit_trail(&filters).await.unwrap();
    assert_eq!(trail["total_count"], 0);
    assert_eq!(cp.recorded().audit_requests, vec![filters]);
}

// ============================================================================
// NOTES
// ============================================================================

#[tokio::test]
async fn test_note_is_attached_to_current_execution() {
    let (agent, cp) = connected_demo_agent("node-a");
    let ctx = ExecutionContext::root("node-a", "greet");
    let execution_id = ctx.execution_id.clone();

    let noter = agent.clone();
    propagation::scope(ctx, async move { noter.note("halfway", &["progress"]) }).await;

    let mut notes = Vec::new();
    for _ in 0..100 {
        notes = cp.recorded().notes;
        if !notes.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].0, execution_id);
    assert_eq!(notes[0].1.message, "halfway");
    assert_eq!(notes[0].1.tags, vec!["progress"]);
}

#[tokio::test]
async fn test_note_outside_execution_is_dropped() {
    let (agent, cp) = connected_demo_agent("node-a");
    agent.note("nobody listens", &[]);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(cp.recorded().notes.is_empty());
}
