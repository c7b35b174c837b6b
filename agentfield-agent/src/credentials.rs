//! Verifiable credential facade
//!
//! Issuance is off unless `AGENTFIELD_DID_ENABLED` is set or
//! [`CredentialFacade::enable`] is called. Payloads are sent as base64 of
//! their canonical JSON so the control plane can hash them reproducibly.

use crate::agent::Agent;
use crate::control_plane::{AuditFilters, CredentialContext, CredentialRequest};
use crate::error::{AgentError, AgentResult};
use agentfield_core::{canonical_json, ExecutionStatus};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct CredentialFacade {
    agent: Agent,
}

impl CredentialFacade {
    pub(crate) fn new(agent: Agent) -> Self {
        Self { agent }
    }

    pub fn is_enabled(&self) -> bool {
        self.agent.credentials_enabled()
    }

    pub fn enable(&self) {
        self.agent.set_credentials_enabled(true);
    }

    pub fn disable(&self) {
        self.agent.set_credentials_enabled(false);
    }

    fn ensure_enabled(&self) -> AgentResult<()> {
        if self.is_enabled() {
            Ok(())
        } else {
            Err(AgentError::CredentialsDisabled)
        }
    }

    /// Mint a credential for the current execution.
    pub async fn issue(
        &self,
        input: Option<&Value>,
        output: Option<&Value>,
        status: ExecutionStatus,
        error_message: Option<String>,
    ) -> AgentResult<Value> {
        self.ensure_enabled()?;
        let ctx = self
            .agent
            .current_context()
            .ok_or_else(|| AgentError::internal("credential issuance requires an active execution"))?;
        let control_plane = self.agent.require_control_plane("issue_credential")?;

        let request = CredentialRequest {
            execution_context: CredentialContext::from(&ctx),
            input_data: encode_payload(input),
            output_data: encode_payload(output),
            status: status.to_string(),
            error_message,
            duration_ms: ctx.elapsed_ms(),
        };

        tracing::debug!(execution_id = %ctx.execution_id, status = %status, "Issuing credential");
        control_plane.issue_credential(&request).await
    }

    pub async fn export_audit_trail(&self, filters: &AuditFilters) -> AgentResult<Value> {
        self.ensure_enabled()?;
        let control_plane = self.agent.require_control_plane("export_audit_trail")?;
        control_plane.export_audit_trail(filters).await
    }
}

/// Base64 of a payload: strings as-is, other values as canonical JSON,
/// absent payloads as the empty string.
pub fn encode_payload(value: Option<&Value>) -> String {
    match value {
        None => String::new(),
        Some(Value::String(s)) => STANDARD.encode(s.as_bytes()),
        Some(other) => STANDARD.encode(canonical_json(other).as_bytes()),
    }
}
