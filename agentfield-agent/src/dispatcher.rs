//! Dispatch
//!
//! Outbound: [`Agent::call`] resolves a target once into local or remote.
//! Local calls derive a child context, emit lifecycle events around the
//! handler and re-raise its error. Remote calls go through the control
//! plane with lineage headers and are never retried.
//!
//! Inbound: [`Agent::dispatch`] runs a normalized invocation either inline
//! or, when the control plane assigned an execution id and a callback is
//! configured, on a background task that reports completion later.

use crate::agent::Agent;
use crate::control_plane::RemoteExecuteRequest;
use crate::error::{AgentError, AgentResult};
use crate::normalizer::Invocation;
use crate::propagation;
use crate::reporter;
use agentfield_core::{
    headers, new_run_id, ExecutionContext, ExecutionStatus, TargetRef, WorkflowEvent,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a 202 response for an execution accepted in async mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptedExecution {
    pub status: String,
    pub execution_id: String,
    pub run_id: String,
    pub reasoner_name: String,
}

impl AcceptedExecution {
    fn for_context(ctx: &ExecutionContext) -> Self {
        Self {
            status: "processing".to_string(),
            execution_id: ctx.execution_id.clone(),
            run_id: ctx.run_id.clone(),
            reasoner_name: ctx.reasoner_name.clone(),
        }
    }
}

/// Outcome of an inbound dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Completed(Value),
    Accepted(AcceptedExecution),
}

/// Whether an inbound surface may answer before the handler finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Accept and report through the status callback when possible.
    AllowAsync,
    /// Always run inline.
    Synchronous,
}

impl Agent {
    // ========================================================================
    // OUTBOUND
    // ========================================================================

    /// Invoke a capability by target, from inside a handler or from outside
    /// any execution.
    ///
    /// `"name"` or `"{own_node_id}.name"` runs in-process; `"other.name"`
    /// goes through the control plane.
    pub async fn call(&self, target: &str, input: Value) -> AgentResult<Value> {
        match TargetRef::parse(target, self.node_id())? {
            TargetRef::Local(name) => self.call_local(&name, input).await,
            remote @ TargetRef::Remote { .. } => self.call_remote(&remote, input).await,
        }
    }

    async fn call_local(&self, name: &str, input: Value) -> AgentResult<Value> {
        let capability = self.registry().get(name)?.clone();
        let parent = propagation::current();
        let ctx = ExecutionContext::derive_or_root(parent.as_ref(), self.node_id(), name);

        tracing::debug!(
            execution_id = %ctx.execution_id,
            run_id = %ctx.run_id,
            parent_execution_id = ?ctx.parent_execution_id,
            depth = ctx.depth,
            target = name,
            "Local call"
        );

        reporter::emit_event(
            self,
            WorkflowEvent::for_context(&ctx, ExecutionStatus::Running).with_input(input.clone()),
        );

        let outcome =
            propagation::scope(ctx.clone(), capability.invoke(self.clone(), input.clone())).await;
        let duration_ms = ctx.elapsed_ms();

        let event = match &outcome {
            Ok(result) => WorkflowEvent::for_context(&ctx, ExecutionStatus::Succeeded)
                .with_result(result.clone()),
            Err(err) => {
                tracing::debug!(
                    execution_id = %ctx.execution_id,
                    error = %err,
                    "Local call failed"
                );
                WorkflowEvent::for_context(&ctx, ExecutionStatus::Failed)
                    .with_error(err.to_string())
            }
        };
        reporter::emit_event(self, event.with_input(input).with_duration(duration_ms));

        outcome
    }

    async fn call_remote(&self, target: &TargetRef, input: Value) -> AgentResult<Value> {
        let control_plane = self.require_control_plane("execute")?;
        let qualified = target.qualified(self.node_id());

        let headers = match propagation::current() {
            Some(ctx) => ctx.outbound_headers(),
            None => vec![(headers::RUN_ID, new_run_id())],
        };

        tracing::debug!(target = %qualified, "Remote call");

        let response = control_plane
            .execute(&RemoteExecuteRequest {
                target: qualified.clone(),
                input,
                headers,
            })
            .await?;

        if let Some(message) = response.error_message.filter(|m| !m.trim().is_empty()) {
            return Err(AgentError::RemoteExecution {
                target: qualified,
                status: None,
                message,
            });
        }
        if !response.status.eq_ignore_ascii_case(ExecutionStatus::Succeeded.as_str()) {
            return Err(AgentError::RemoteExecution {
                target: qualified,
                status: None,
                message: format!("execution status {}", response.status),
            });
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    /// Run a local capability inline under a fresh root context. No events
    /// are emitted.
    pub async fn execute(&self, name: &str, input: Value) -> AgentResult<Value> {
        let capability = self.registry().get(name)?.clone();
        let ctx = ExecutionContext::root(self.node_id(), name);
        propagation::scope(ctx, capability.invoke(self.clone(), input)).await
    }

    // ========================================================================
    // INBOUND
    // ========================================================================

    /// Dispatch an invocation received at this node's boundary.
    pub async fn dispatch(
        &self,
        invocation: Invocation,
        mode: DispatchMode,
    ) -> AgentResult<DispatchOutcome> {
        let name = match TargetRef::parse(&invocation.target, self.node_id())? {
            TargetRef::Local(name) => name,
            TargetRef::Remote { .. } => return Err(AgentError::not_found(invocation.target)),
        };

        let capability = self.registry().get(&name)?.clone();
        if let Some(kind) = invocation.target_type {
            if capability.kind() != kind {
                return Err(AgentError::not_found(name));
            }
        }

        let ctx = ExecutionContext::from_lineage(&invocation.metadata, self.node_id(), &name);

        let accept_async = mode == DispatchMode::AllowAsync
            && self.config().async_callbacks_enabled()
            && invocation.metadata.execution_id.is_some()
            && self.control_plane().is_some();

        if accept_async {
            let accepted = AcceptedExecution::for_context(&ctx);
            tracing::info!(
                execution_id = %ctx.execution_id,
                run_id = %ctx.run_id,
                target = %name,
                "Execution accepted"
            );
            tokio::spawn(reporter::run_detached(
                self.clone(),
                capability,
                ctx,
                invocation.input,
            ));
            return Ok(DispatchOutcome::Accepted(accepted));
        }

        tracing::debug!(
            execution_id = %ctx.execution_id,
            run_id = %ctx.run_id,
            target = %name,
            "Executing inline"
        );
        let result = propagation::scope(ctx, capability.invoke(self.clone(), invocation.input))
            .await?;
        Ok(DispatchOutcome::Completed(result))
    }
}
