//! Asynchronous inbound executions and completion callbacks

#[path = "support/http.rs"]
mod http_support;

use agentfield_agent::reporter::deliver_completion;
use agentfield_agent::{AgentError, CallbackPolicy};
use agentfield_core::{DeploymentType, ExecutionContext, ExecutionStatus, ExecutionStatusUpdate};
use agentfield_test_utils::fixtures::{connected_config, demo_agent};
use agentfield_test_utils::RecordingControlPlane;
use axum::http::StatusCode;
use http_support::{post_json, send};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(2);

fn fast_policy(max_attempts: u32) -> CallbackPolicy {
    CallbackPolicy {
        max_attempts,
        base_delay: Duration::from_millis(10),
        attempt_timeout: Duration::from_secs(1),
    }
}

#[tokio::test]
async fn test_accepted_execution_id_matches_callback() {
    let cp = RecordingControlPlane::new();
    let agent = demo_agent(connected_config("node-a"), Arc::clone(&cp));

    let (status, body) = send(
        &agent,
        post_json(
            "/reasoners/greet",
            &json!({"name": "X"}),
            &[("X-Execution-ID", "exec_cp_1"), ("X-Run-ID", "run_cp_1")],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "processing");
    assert_eq!(body["execution_id"], "exec_cp_1");
    assert_eq!(body["run_id"], "run_cp_1");
    assert_eq!(body["reasoner_name"], "greet");

    let completions = cp.wait_for_completions(1, WAIT).await;
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].execution_id, "exec_cp_1");
    assert_eq!(completions[0].status, ExecutionStatus::Succeeded);
    assert_eq!(completions[0].result, Some(json!({"greeting": "Hello, X!"})));
    assert!(completions[0].completed_at >= completions[0].started_at);
}

#[tokio::test]
async fn test_failed_background_execution_reports_error() {
    let cp = RecordingControlPlane::new();
    let agent = demo_agent(connected_config("node-a"), Arc::clone(&cp));

    let (status, _) = send(
        &agent,
        post_json("/execute/fail", &json!({}), &[("X-Execution-ID", "exec_f")]),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let completions = cp.wait_for_completions(1, WAIT).await;
    assert_eq!(completions[0].status, ExecutionStatus::Failed);
    assert_eq!(completions[0].error.as_deref(), Some("boom"));
}

#[tokio::test]
async fn test_panicking_handler_is_reported_not_propagated() {
    let cp = RecordingControlPlane::new();
    let agent = demo_agent(connected_config("node-a"), Arc::clone(&cp));

    let (status, _) = send(
        &agent,
        post_json("/reasoners/panic", &json!({}), &[("X-Execution-ID", "exec_p")]),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let completions = cp.wait_for_completions(1, WAIT).await;
    assert_eq!(completions[0].status, ExecutionStatus::Failed);
    let error = completions[0].error.clone().unwrap_or_default();
    assert!(error.starts_with("panic:"), "got {error}");
    assert!(error.contains("handler exploded"));

    // The node keeps serving.
    let (status, _) = send(&agent, post_json("/reasoners/greet", &json!({"name": "A"}), &[])).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_without_execution_id_runs_inline() {
    let cp = RecordingControlPlane::new();
    let agent = demo_agent(connected_config("node-a"), Arc::clone(&cp));

    let (status, body) =
        send(&agent, post_json("/reasoners/greet", &json!({"name": "X"}), &[])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["greeting"], "Hello, X!");
    assert!(cp.recorded().callback_attempts.is_empty());
}

#[tokio::test]
async fn test_serverless_deployment_always_runs_inline() {
    let cp = RecordingControlPlane::new();
    let config = connected_config("node-a").with_deployment_type(DeploymentType::Serverless);
    let agent = demo_agent(config, Arc::clone(&cp));

    let (status, body) = send(
        &agent,
        post_json("/reasoners/greet", &json!({"name": "X"}), &[("X-Execution-ID", "exec_s")]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["greeting"], "Hello, X!");
}

#[tokio::test]
async fn test_callback_retries_until_accepted() {
    let cp = RecordingControlPlane::new();
    cp.fail_callbacks(2);
    let agent = demo_agent(
        connected_config("node-a").with_callback_policy(fast_policy(5)),
        Arc::clone(&cp),
    );

    let (status, _) = send(
        &agent,
        post_json("/reasoners/greet", &json!({"name": "X"}), &[("X-Execution-ID", "exec_r")]),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let completions = cp.wait_for_completions(1, WAIT).await;
    assert_eq!(completions.len(), 1);
    assert_eq!(cp.recorded().callback_attempts.len(), 3);
}

// ============================================================================
// BACKOFF
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_backoff_delays_strictly_increase_and_give_up() {
    let cp = RecordingControlPlane::new();
    cp.fail_callbacks(u32::MAX);
    let policy = CallbackPolicy {
        max_attempts: 4,
        base_delay: Duration::from_secs(1),
        attempt_timeout: Duration::from_secs(30),
    };
    let ctx = ExecutionContext::root("node-a", "greet");
    let update = ExecutionStatusUpdate::succeeded(&ctx, json!({}));

    let err = deliver_completion(&*cp, &update, &policy)
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::CallbackDelivery { attempts: 4, .. }));

    let attempts = cp.recorded().callback_attempts;
    assert_eq!(attempts.len(), 4);
    let gaps: Vec<Duration> = attempts
        .windows(2)
        .map(|pair| pair[1].0.duration_since(pair[0].0))
        .collect();
    let expected = [1, 2, 4].map(Duration::from_secs);
    for (gap, want) in gaps.iter().zip(expected) {
        assert!(*gap >= want, "gap {gap:?} shorter than {want:?}");
        assert!(*gap < want + Duration::from_millis(100), "gap {gap:?} too long");
    }
    assert!(gaps.windows(2).all(|pair| pair[1] > pair[0]));
    assert!(cp.completions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_background_callback_stays_contained() {
    let cp = RecordingControlPlane::new();
    cp.fail_callbacks(u32::MAX);
    let agent = demo_agent(
        connected_config("node-a").with_callback_policy(CallbackPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(30),
        }),
        Arc::clone(&cp),
    );

    let (status, _) = send(
        &agent,
        post_json("/reasoners/greet", &json!({"name": "X"}), &[("X-Execution-ID", "exec_x")]),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let attempts = cp
        .wait_for_callback_attempts(3, Duration::from_secs(60))
        .await;
    assert_eq!(attempts.len(), 3);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(cp.recorded().callback_attempts.len(), 3);
    assert!(cp.completions().is_empty());

    let (status, _) = send(&agent, post_json("/reasoners/greet", &json!({"name": "Y"}), &[])).await;
    assert_eq!(status, StatusCode::OK);
}
