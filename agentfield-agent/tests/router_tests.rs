//! Router namespacing and merge into an agent

use agentfield_agent::{Agent, AgentConfig, AgentError, AgentRouter, CapabilityOptions};
use agentfield_core::CapabilityKind;
use serde_json::{json, Value};

fn simulation_agent() -> Agent {
    let simulation = AgentRouter::new("simulation")
        .reasoner("run", |_agent, input| async move {
            Ok(json!({ "ran": input.get("steps").and_then(Value::as_u64).unwrap_or(1) }))
        })
        .skill_with(
            "reset",
            CapabilityOptions::new().description("Reset state").tag("admin"),
            |_agent, _input| async move { Ok(json!({ "reset": true })) },
        );

    Agent::builder(AgentConfig::new("sim-node"))
        .include_router(simulation)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_prefixed_name_is_registered_not_bare_name() {
    let agent = simulation_agent();
    assert!(agent.registry().contains("simulation_run"));
    assert!(!agent.registry().contains("run"));

    let result = agent.call("simulation_run", json!({"steps": 3})).await.unwrap();
    assert_eq!(result["ran"], 3);

    assert!(matches!(
        agent.call("run", json!({})).await,
        Err(AgentError::CapabilityNotFound { .. })
    ));
}

#[tokio::test]
async fn test_dotted_address_uses_prefixed_name() {
    let agent = simulation_agent();
    let result = agent.call("sim-node.simulation_run", json!({})).await.unwrap();
    assert_eq!(result["ran"], 1);
}

#[test]
fn test_router_keeps_kind_and_options() {
    let agent = simulation_agent();
    let reset = agent.registry().get("simulation_reset").unwrap();
    assert_eq!(reset.kind(), CapabilityKind::Skill);
    assert_eq!(reset.descriptor().description.as_deref(), Some("Reset state"));
    assert_eq!(reset.descriptor().tags, vec!["admin"]);
}

#[test]
fn test_two_routers_with_distinct_prefixes_coexist() {
    let a = AgentRouter::new("alpha").reasoner("run", |_a, i| async move { Ok(i) });
    let b = AgentRouter::new("beta").reasoner("run", |_a, i| async move { Ok(i) });
    let agent = Agent::builder(AgentConfig::new("node"))
        .include_router(a)
        .include_router(b)
        .build()
        .unwrap();
    let names: Vec<&str> = agent.registry().all().map(|c| c.name()).collect();
    assert_eq!(names, vec!["alpha_run", "beta_run"]);
}

#[test]
fn test_same_prefix_twice_is_rejected() {
    let a = AgentRouter::new("alpha").reasoner("run", |_a, i| async move { Ok(i) });
    let b = AgentRouter::new("alpha").skill("run", |_a, i| async move { Ok(i) });
    let result = Agent::builder(AgentConfig::new("node"))
        .include_router(a)
        .include_router(b)
        .build();
    assert!(matches!(result, Err(AgentError::DuplicateCapability { .. })));
}
