//! AgentField Agent Entry Point
//!
//! Runs a demo node from `AGENTFIELD_*` environment variables: a `greet`
//! reasoner, a `relay` reasoner that calls it, a `text_*` skill group and a
//! listener logging changes to `greetings.*` memory keys.

use agentfield_agent::{
    init_tracing, lease, memory_events, Agent, AgentConfig, AgentError, AgentResult, AgentRouter,
    CapabilityOptions, TelemetryConfig,
};
use serde_json::{json, Value};

#[tokio::main]
async fn main() -> AgentResult<()> {
    init_tracing(&TelemetryConfig::default())?;

    let config = AgentConfig::from_env()?;
    let agent = build_agent(config)?;

    let lease = lease::start(&agent).await?;
    let listener_handle = memory_events::start(&agent);

    let addr = agent.config().bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AgentError::internal(format!("Failed to bind {}: {}", addr, e)))?;

    agent
        .serve_with_shutdown(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received, draining requests");
        })
        .await?;

    listener_handle.shutdown().await;
    lease.shutdown(&agent).await;
    Ok(())
}

fn build_agent(config: AgentConfig) -> AgentResult<Agent> {
    let text = AgentRouter::new("text")
        .skill("upper", |_agent, input| async move {
            let text = required_str(&input, "text")?;
            Ok(json!({ "text": text.to_uppercase() }))
        })
        .skill("word_count", |_agent, input| async move {
            let text = required_str(&input, "text")?;
            Ok(json!({ "count": text.split_whitespace().count() }))
        });

    let agent = Agent::builder(config)
        .reasoner_with(
            "greet",
            CapabilityOptions::new()
                .description("Greets someone by name")
                .input_schema(json!({
                    "type": "object",
                    "properties": { "name": { "type": "string" } },
                    "required": ["name"],
                })),
            |_agent, input| async move {
                let name = required_str(&input, "name")?;
                Ok(json!({ "greeting": format!("Hello, {}!", name) }))
            },
        )
        .reasoner_with(
            "relay",
            CapabilityOptions::new().description("Forwards to greet"),
            |agent, input| async move { agent.call("greet", input).await },
        )
        .include_router(text)
        .build()?;

    agent
        .memory()
        .on_change(["greetings.*"], |event| async move {
            tracing::info!(key = %event.key, action = ?event.action, "Greeting memory changed");
            Ok(())
        });
    Ok(agent)
}

fn required_str<'a>(input: &'a Value, field: &str) -> AgentResult<&'a str> {
    input
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| AgentError::handler(format!("'{}' is required", field)))
}
