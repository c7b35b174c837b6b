//! Completion reporting
//!
//! Workflow events are detached, best-effort posts. Executions accepted in
//! async mode run on their own task and report a terminal status through the
//! per-execution callback with bounded exponential backoff.

use crate::agent::Agent;
use crate::config::CallbackPolicy;
use crate::control_plane::ControlPlane;
use crate::error::{AgentError, AgentResult};
use crate::propagation;
use crate::registry::Capability;
use agentfield_core::{ExecutionContext, ExecutionStatusUpdate, WorkflowEvent};
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;

/// Post `event` on a detached task. Failures are logged and dropped.
pub(crate) fn emit_event(agent: &Agent, event: WorkflowEvent) {
    let Some(control_plane) = agent.control_plane().cloned() else {
        return;
    };
    tokio::spawn(async move {
        if let Err(e) = control_plane.send_workflow_event(&event).await {
            tracing::warn!(
                execution_id = %event.execution_id,
                run_id = %event.run_id,
                status = %event.status,
                error = %e,
                "Dropped workflow event"
            );
        }
    });
}

/// Run an accepted execution to completion and report the outcome.
///
/// Handler panics are caught and reported as failures; nothing escapes
/// this task.
pub(crate) async fn run_detached(
    agent: Agent,
    capability: Capability,
    ctx: ExecutionContext,
    input: serde_json::Value,
) {
    let invocation = propagation::scope(ctx.clone(), capability.invoke(agent.clone(), input));

    let update = match AssertUnwindSafe(invocation).catch_unwind().await {
        Ok(Ok(result)) => ExecutionStatusUpdate::succeeded(&ctx, result),
        Ok(Err(err)) => {
            tracing::warn!(
                execution_id = %ctx.execution_id,
                error = %err,
                "Background execution failed"
            );
            ExecutionStatusUpdate::failed(&ctx, err.to_string())
        }
        Err(panic) => {
            let message = format!("panic: {}", panic_message(panic.as_ref()));
            tracing::error!(
                execution_id = %ctx.execution_id,
                error = %message,
                "Background execution panicked"
            );
            ExecutionStatusUpdate::failed(&ctx, message)
        }
    };

    let Some(control_plane) = agent.control_plane() else {
        return;
    };
    if let Err(e) = deliver_completion(control_plane.as_ref(), &update, &agent.config().callback).await
    {
        tracing::error!(
            execution_id = %update.execution_id,
            run_id = %update.run_id,
            error = %e,
            "Completion callback abandoned"
        );
    }
}

/// Deliver a terminal status, retrying with exponential backoff.
pub async fn deliver_completion(
    control_plane: &dyn ControlPlane,
    update: &ExecutionStatusUpdate,
    policy: &CallbackPolicy,
) -> AgentResult<()> {
    let mut last_error = String::new();

    for attempt in 1..=policy.max_attempts {
        let outcome =
            tokio::time::timeout(policy.attempt_timeout, control_plane.post_execution_status(update))
                .await;

        match outcome {
            Ok(Ok(())) => {
                tracing::debug!(
                    execution_id = %update.execution_id,
                    status = %update.status,
                    attempt = attempt,
                    "Completion delivered"
                );
                return Ok(());
            }
            Ok(Err(e)) => last_error = e.to_string(),
            Err(_) => {
                last_error = format!("timed out after {}ms", policy.attempt_timeout.as_millis())
            }
        }

        tracing::warn!(
            execution_id = %update.execution_id,
            attempt = attempt,
            max_attempts = policy.max_attempts,
            error = %last_error,
            "Completion callback attempt failed"
        );

        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.delay_after(attempt)).await;
        }
    }

    Err(AgentError::CallbackDelivery {
        execution_id: update.execution_id.clone(),
        attempts: policy.max_attempts,
        message: last_error,
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
