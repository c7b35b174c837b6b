//! Registration, readiness and lease renewal

use agentfield_agent::control_plane::NodePhase;
use agentfield_agent::{lease, Agent, AgentConfig, AgentError};
use agentfield_test_utils::fixtures::{connected_config, demo_agent};
use agentfield_test_utils::RecordingControlPlane;
use std::sync::Arc;
use std::time::Duration;

fn leased_agent(interval_secs: u64) -> (Agent, Arc<RecordingControlPlane>) {
    let cp = RecordingControlPlane::new();
    let config = connected_config("node-a").with_lease_interval(Duration::from_secs(interval_secs));
    (demo_agent(config, Arc::clone(&cp)), cp)
}

#[tokio::test]
async fn test_registration_carries_manifest() {
    let (agent, cp) = leased_agent(0);
    let handle = lease::start(&agent).await.unwrap();
    assert!(handle.is_registered());

    let recorded = cp.recorded();
    assert_eq!(recorded.registrations.len(), 1);
    let registration = &recorded.registrations[0];
    assert_eq!(registration.id, "node-a");
    assert_eq!(registration.base_url, "http://localhost:8001");
    assert!(registration.reasoners.iter().any(|r| r.id == "greet"));
    assert!(registration.skills.iter().any(|s| s.id == "text_upper"));

    // Marked ready exactly once.
    assert_eq!(recorded.status_updates.len(), 1);
    assert_eq!(recorded.status_updates[0].1.phase, NodePhase::Ready);
}

#[tokio::test]
async fn test_zero_interval_disables_renewal() {
    let (agent, _cp) = leased_agent(0);
    let handle = lease::start(&agent).await.unwrap();
    assert!(!handle.is_renewing());
}

#[tokio::test(start_paused = true)]
async fn test_lease_renews_on_interval_until_shutdown() {
    let (agent, cp) = leased_agent(10);
    let handle = lease::start(&agent).await.unwrap();
    assert!(handle.is_renewing());

    tokio::time::sleep(Duration::from_secs(25)).await;
    let snapshot = handle.shutdown(&agent).await;
    assert_eq!(snapshot.renewals_sent, 2);
    assert_eq!(snapshot.renewal_failures, 0);

    let recorded = cp.recorded();
    // Ready, two renewals, then offline.
    assert_eq!(recorded.status_updates.len(), 4);
    assert_eq!(recorded.shutdowns.len(), 1);
    assert_eq!(recorded.shutdowns[0].1.reason, "shutdown");

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(cp.recorded().status_updates.len(), 4);
}

#[tokio::test]
async fn test_shutdown_marks_node_offline_before_notice() {
    let (agent, cp) = leased_agent(0);
    let handle = lease::start(&agent).await.unwrap();
    handle.shutdown(&agent).await;

    let recorded = cp.recorded();
    let phases: Vec<NodePhase> = recorded.status_updates.iter().map(|(_, u)| u.phase).collect();
    assert_eq!(phases, vec![NodePhase::Ready, NodePhase::Offline]);
    assert_eq!(recorded.status_updates[1].1.health_score, 0);
    assert_eq!(recorded.shutdowns.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_renewal_failures_are_not_fatal() {
    let (agent, cp) = leased_agent(10);
    cp.fail_status_updates();
    let handle = lease::start(&agent).await.unwrap();

    tokio::time::sleep(Duration::from_secs(35)).await;
    let snapshot = handle.shutdown(&agent).await;
    assert_eq!(snapshot.renewals_sent, 3);
    assert_eq!(snapshot.renewal_failures, 3);
}

#[tokio::test]
async fn test_registration_failure_is_fatal() {
    let (agent, cp) = leased_agent(0);
    cp.fail_registration();
    let err = lease::start(&agent).await.unwrap_err();
    assert!(matches!(err, AgentError::Registration(_)));
}

#[tokio::test]
async fn test_registration_failure_tolerated_in_dev_mode() {
    let cp = RecordingControlPlane::new();
    cp.fail_registration();
    let config = connected_config("node-a").with_dev_mode(true);
    let agent = demo_agent(config, Arc::clone(&cp));

    let handle = lease::start(&agent).await.unwrap();
    assert!(!handle.is_registered());
    assert!(cp.recorded().status_updates.is_empty());

    handle.shutdown(&agent).await;
    assert!(cp.recorded().shutdowns.is_empty());
}

#[tokio::test]
async fn test_standalone_node_skips_registration() {
    let agent = Agent::builder(AgentConfig::new("solo")).build().unwrap();
    let handle = lease::start(&agent).await.unwrap();
    assert!(!handle.is_registered());
    assert!(!handle.is_renewing());
}
