//! Local and remote dispatch through `Agent::call`

use agentfield_agent::control_plane::RemoteExecuteResponse;
use agentfield_agent::{propagation, Agent, AgentConfig, AgentError, HttpControlPlane};
use agentfield_core::{headers, ExecutionContext, ExecutionStatus};
use agentfield_test_utils::assertions::{assert_single_terminal, events_for, terminal_events};
use agentfield_test_utils::fixtures::connected_demo_agent;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(2);

// ============================================================================
// LOCAL CALLS
// ============================================================================

#[tokio::test]
async fn test_greet_without_context_starts_root() {
    let (agent, cp) = connected_demo_agent("node-a");

    let result = agent.call("greet", json!({"name": "X"})).await.unwrap();
    assert_eq!(result, json!({"greeting": "Hello, X!"}));

    let events = cp.wait_for_events(2, WAIT).await;
    let done = assert_single_terminal(&events, "greet", ExecutionStatus::Succeeded);
    assert!(done.run_id.starts_with("run_"));
    assert!(done.parent_execution_id.is_none());
    assert_eq!(done.workflow_id, done.run_id);
    assert_eq!(done.result, Some(json!({"greeting": "Hello, X!"})));
    assert!(done.duration_ms.is_some());

    let lifecycle = events_for(&events, &done.execution_id);
    assert_eq!(lifecycle.len(), 2);
    assert!(lifecycle
        .iter()
        .any(|e| e.status == ExecutionStatus::Running && e.input_data == Some(json!({"name": "X"}))));
}

#[tokio::test]
async fn test_relay_shares_run_and_links_parent() {
    let (agent, cp) = connected_demo_agent("node-a");

    let result = agent.call("relay", json!({"name": "Y"})).await.unwrap();
    assert_eq!(result["greeting"], "Hello, Y!");

    let events = cp.wait_for_events(4, WAIT).await;
    let relay = assert_single_terminal(&events, "relay", ExecutionStatus::Succeeded);
    let greet = assert_single_terminal(&events, "greet", ExecutionStatus::Succeeded);

    assert_eq!(greet.run_id, relay.run_id);
    assert_eq!(greet.workflow_id, relay.workflow_id);
    assert_eq!(
        greet.parent_execution_id.as_deref(),
        Some(relay.execution_id.as_str())
    );
    assert_ne!(greet.execution_id, relay.execution_id);
}

#[tokio::test]
async fn test_failing_handler_reports_failed_and_reraises() {
    let (agent, cp) = connected_demo_agent("node-a");

    let err = agent.call("fail", json!({})).await.unwrap_err();
    assert!(matches!(err, AgentError::Handler { ref message, .. } if message == "boom"));

    let events = cp.wait_for_events(2, WAIT).await;
    let failed = assert_single_terminal(&events, "fail", ExecutionStatus::Failed);
    assert_eq!(failed.error.as_deref(), Some("boom"));
    assert!(failed.result.is_none());
}

#[tokio::test]
async fn test_nested_failure_propagates_through_relay() {
    let (agent, cp) = connected_demo_agent("node-a");

    let err = agent.call("relay", json!({})).await.unwrap_err();
    assert!(matches!(err, AgentError::Handler { .. }));

    let events = cp.wait_for_events(4, WAIT).await;
    assert_single_terminal(&events, "greet", ExecutionStatus::Failed);
    assert_single_terminal(&events, "relay", ExecutionStatus::Failed);
}

#[tokio::test]
async fn test_call_inside_execution_derives_child() {
    let (agent, _cp) = connected_demo_agent("node-a");
    let parent = ExecutionContext::root("node-a", "outer");
    let parent_id = parent.execution_id.clone();
    let run_id = parent.run_id.clone();

    let caller = agent.clone();
    let seen = propagation::scope(parent, async move {
        caller.call("whoami", json!({})).await
    })
    .await
    .unwrap();

    assert_eq!(seen["run_id"], run_id.as_str());
    assert_eq!(seen["parent_execution_id"], parent_id.as_str());
    assert_eq!(seen["depth"], 1);
}

#[tokio::test]
async fn test_sibling_calls_get_distinct_execution_ids() {
    let (agent, _cp) = connected_demo_agent("node-a");
    let parent = ExecutionContext::root("node-a", "outer");

    let caller = agent.clone();
    let (a, b) = propagation::scope(parent, async move {
        let a = caller.call("whoami", json!({})).await?;
        let b = caller.call("whoami", json!({})).await?;
        Ok::<_, AgentError>((a, b))
    })
    .await
    .unwrap();

    assert_ne!(a["execution_id"], b["execution_id"]);
    assert_eq!(a["run_id"], b["run_id"]);
    assert_eq!(a["workflow_id"], b["workflow_id"]);
}

#[tokio::test]
async fn test_own_node_qualifier_is_local() {
    let (agent, cp) = connected_demo_agent("node-a");

    let result = agent.call("node-a.greet", json!({"name": "Z"})).await.unwrap();
    assert_eq!(result["greeting"], "Hello, Z!");
    assert!(cp.recorded().remote_requests.is_empty());
}

#[tokio::test]
async fn test_unknown_local_target_is_not_found() {
    let (agent, _cp) = connected_demo_agent("node-a");
    let err = agent.call("missing", json!({})).await.unwrap_err();
    assert!(matches!(err, AgentError::CapabilityNotFound { ref name } if name == "missing"));
}

#[tokio::test]
async fn test_malformed_target_is_rejected() {
    let (agent, _cp) = connected_demo_agent("node-a");
    assert!(matches!(
        agent.call("a.b.c", json!({})).await,
        Err(AgentError::InvalidTarget(_))
    ));
}

#[tokio::test]
async fn test_execute_runs_without_events() {
    let (agent, cp) = connected_demo_agent("node-a");

    let seen = agent.execute("whoami", json!({})).await.unwrap();
    assert_eq!(seen["depth"], 0);
    assert!(seen["parent_execution_id"].is_null());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(cp.events().is_empty());
}

// ============================================================================
// REMOTE CALLS
// ============================================================================

#[tokio::test]
async fn test_remote_call_carries_lineage_headers() {
    let (agent, cp) = connected_demo_agent("node-a");
    let parent = ExecutionContext::root("node-a", "outer");
    let parent_id = parent.execution_id.clone();
    let run_id = parent.run_id.clone();

    let caller = agent.clone();
    let result = propagation::scope(parent, async move {
        caller.call("node-b.greet", json!({"name": "R"})).await
    })
    .await
    .unwrap();
    assert_eq!(result["target"], "node-b.greet");

    let requests = cp.recorded().remote_requests;
    assert_eq!(requests.len(), 1);
    let header = |name: &str| {
        requests[0]
            .headers
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.clone())
    };
    assert_eq!(header(headers::RUN_ID), Some(run_id));
    assert_eq!(header(headers::PARENT_EXECUTION_ID), Some(parent_id));
    assert_eq!(requests[0].input, json!({"name": "R"}));

    // Remote calls emit no local events.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(terminal_events(&cp.events(), "greet").is_empty());
}

#[tokio::test]
async fn test_remote_call_outside_execution_sends_fresh_run() {
    let (agent, cp) = connected_demo_agent("node-a");
    agent.call("node-b.greet", json!({})).await.unwrap();

    let requests = cp.recorded().remote_requests;
    assert_eq!(requests[0].headers.len(), 1);
    assert_eq!(requests[0].headers[0].0, headers::RUN_ID);
    assert!(requests[0].headers[0].1.starts_with("run_"));
}

#[tokio::test]
async fn test_remote_failure_status_is_remote_execution_error() {
    let (agent, cp) = connected_demo_agent("node-a");
    cp.respond_to(
        "node-b.greet",
        RemoteExecuteResponse {
            status: "failed".to_string(),
            error_message: Some("upstream exploded".to_string()),
            ..Default::default()
        },
    );

    let err = agent.call("node-b.greet", json!({})).await.unwrap_err();
    assert!(matches!(
        err,
        AgentError::RemoteExecution { ref message, .. } if message == "upstream exploded"
    ));
    assert_eq!(cp.recorded().remote_requests.len(), 1, "no retry");
}

#[tokio::test]
async fn test_remote_non_succeeded_status_is_error() {
    let (agent, cp) = connected_demo_agent("node-a");
    cp.respond_to(
        "node-b.greet",
        RemoteExecuteResponse {
            status: "running".to_string(),
            ..Default::default()
        },
    );
    assert!(matches!(
        agent.call("node-b.greet", json!({})).await,
        Err(AgentError::RemoteExecution { .. })
    ));
}

#[tokio::test]
async fn test_remote_call_without_control_plane_is_unavailable() {
    let agent = Agent::builder(AgentConfig::new("node-a")).build().unwrap();
    assert!(matches!(
        agent.call("node-b.greet", json!({})).await,
        Err(AgentError::ControlPlaneUnavailable { .. })
    ));
}

#[tokio::test]
async fn test_unreachable_control_plane_is_transport_error_within_timeout() {
    let client = HttpControlPlane::new("http://127.0.0.1:1", None, Duration::from_secs(2)).unwrap();
    let agent = Agent::builder(AgentConfig::new("node-a"))
        .control_plane(Arc::new(client))
        .build()
        .unwrap();

    let started = Instant::now();
    let err = agent.call("node-b.greet", json!({})).await.unwrap_err();
    assert!(matches!(err, AgentError::Transport { .. }));
    assert!(started.elapsed() < Duration::from_secs(5));
}

fn http_agent(base_url: &str, request_timeout: Duration) -> Agent {
    let client = HttpControlPlane::new(base_url, None, request_timeout).unwrap();
    Agent::builder(AgentConfig::new("node-a"))
        .control_plane(Arc::new(client))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_silent_control_plane_times_out_as_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    // Accept connections and never answer.
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let agent = http_agent(&format!("http://{}", addr), Duration::from_millis(200));
    let started = Instant::now();
    let err = agent.call("node-b.greet", json!({})).await.unwrap_err();

    assert!(matches!(err, AgentError::Transport { ref target, .. } if target == "node-b.greet"));
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
}

#[tokio::test]
async fn test_empty_execute_response_is_remote_execution_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route("/api/v1/execute/:target", post(|| async { StatusCode::OK }));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let agent = http_agent(&format!("http://{}", addr), Duration::from_secs(2));
    let err = agent.call("node-b.greet", json!({})).await.unwrap_err();
    assert!(matches!(
        err,
        AgentError::RemoteExecution { status: Some(200), ref target, .. } if target == "node-b.greet"
    ));
}
