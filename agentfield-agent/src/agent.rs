//! Agent assembly and shared state
//!
//! An [`Agent`] is a cheap-to-clone handle over the node's frozen registry,
//! configuration and control-plane client. Handlers receive it so they can
//! make nested calls and reach the memory and credential facades.

use crate::config::AgentConfig;
use crate::constants::{SDK_NAME, SDK_VERSION};
use crate::control_plane::{
    CommunicationConfig, ControlPlane, ExecutionNote, HttpControlPlane, NodeRegistration,
};
use crate::credentials::CredentialFacade;
use crate::error::{AgentError, AgentResult};
use crate::memory::MemoryFacade;
use crate::memory_events::SubscriptionSet;
use crate::propagation;
use crate::registry::{CapabilityOptions, CapabilityRegistry, PendingCapability};
use crate::router::AgentRouter;
use agentfield_core::{CapabilityDescriptor, CapabilityKind, DeploymentType, ExecutionContext};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

// ============================================================================
// DISCOVERY MANIFEST
// ============================================================================

/// Capability manifest served at `/discover`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryManifest {
    pub node_id: String,
    pub version: String,
    pub deployment_type: DeploymentType,
    pub reasoners: Vec<CapabilityDescriptor>,
    pub skills: Vec<CapabilityDescriptor>,
}

// ============================================================================
// AGENT
// ============================================================================

struct AgentInner {
    config: AgentConfig,
    registry: CapabilityRegistry,
    control_plane: Option<Arc<dyn ControlPlane>>,
    credentials_enabled: AtomicBool,
    memory_subscriptions: SubscriptionSet,
    started_at: Instant,
}

#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("node_id", &self.inner.config.node_id)
            .field("capabilities", &self.inner.registry.len())
            .field("control_plane", &self.inner.control_plane.is_some())
            .finish()
    }
}

impl Agent {
    pub fn builder(config: AgentConfig) -> AgentBuilder {
        AgentBuilder::new(config)
    }

    pub fn config(&self) -> &AgentConfig {
        &self.inner.config
    }

    pub fn node_id(&self) -> &str {
        &self.inner.config.node_id
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.inner.registry
    }

    pub fn control_plane(&self) -> Option<&Arc<dyn ControlPlane>> {
        self.inner.control_plane.as_ref()
    }

    pub(crate) fn require_control_plane(
        &self,
        operation: &'static str,
    ) -> AgentResult<&Arc<dyn ControlPlane>> {
        self.control_plane()
            .ok_or(AgentError::ControlPlaneUnavailable { operation })
    }

    /// Context of the invocation currently running on this task.
    pub fn current_context(&self) -> Option<ExecutionContext> {
        propagation::current()
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.inner.started_at.elapsed().as_secs()
    }

    pub fn memory(&self) -> MemoryFacade {
        MemoryFacade::new(self.clone())
    }

    pub(crate) fn memory_subscriptions(&self) -> &SubscriptionSet {
        &self.inner.memory_subscriptions
    }

    pub fn credentials(&self) -> CredentialFacade {
        CredentialFacade::new(self.clone())
    }

    pub(crate) fn credentials_enabled(&self) -> bool {
        self.inner.credentials_enabled.load(Ordering::Acquire)
    }

    pub(crate) fn set_credentials_enabled(&self, enabled: bool) {
        self.inner
            .credentials_enabled
            .store(enabled, Ordering::Release);
    }

    /// Attach a note to the current execution. Delivery is fire-and-forget;
    /// outside an execution or without a control plane this is a no-op.
    pub fn note(&self, message: impl Into<String>, tags: &[&str]) {
        let Some(ctx) = self.current_context() else {
            tracing::debug!("Note dropped: no active execution");
            return;
        };
        let Some(control_plane) = self.control_plane().cloned() else {
            return;
        };
        let note = ExecutionNote {
            message: message.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        };
        tokio::spawn(async move {
            if let Err(e) = control_plane
                .add_execution_note(&ctx.execution_id, &note)
                .await
            {
                tracing::warn!(
                    execution_id = %ctx.execution_id,
                    error = %e,
                    "Failed to send execution note"
                );
            }
        });
    }

    pub fn discovery_manifest(&self) -> DiscoveryManifest {
        let config = self.config();
        DiscoveryManifest {
            node_id: config.node_id.clone(),
            version: config.version.clone(),
            deployment_type: config.deployment_type,
            reasoners: self.registry().descriptors(CapabilityKind::Reasoner),
            skills: self.registry().descriptors(CapabilityKind::Skill),
        }
    }

    pub fn registration_payload(&self) -> NodeRegistration {
        let config = self.config();
        let manifest = self.discovery_manifest();
        let now = chrono::Utc::now();
        let environment = if config.dev_mode { "development" } else { "production" };
        NodeRegistration {
            id: config.node_id.clone(),
            team_id: config.team_id.clone(),
            base_url: config.base_url(),
            version: config.version.clone(),
            reasoners: manifest.reasoners,
            skills: manifest.skills,
            communication_config: CommunicationConfig {
                protocols: vec!["http".to_string()],
                heartbeat_interval: format!("{}s", config.lease_interval.as_secs()),
            },
            health_status: "healthy".to_string(),
            last_heartbeat: now,
            registered_at: now,
            metadata: json!({
                "deployment": {
                    "type": config.deployment_type,
                    "environment": environment,
                },
                "sdk": { "language": SDK_NAME, "version": SDK_VERSION },
            }),
            deployment_type: config.deployment_type,
        }
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Assembles an [`Agent`]. Name collisions are rejected by [`build`].
///
/// [`build`]: AgentBuilder::build
pub struct AgentBuilder {
    config: AgentConfig,
    pending: Vec<PendingCapability>,
    control_plane: Option<Arc<dyn ControlPlane>>,
}

impl AgentBuilder {
    pub fn new(config: AgentConfig) -> Self {
        Self {
            config,
            pending: Vec::new(),
            control_plane: None,
        }
    }

    pub fn reasoner<F, Fut>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Agent, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AgentResult<Value>> + Send + 'static,
    {
        self.reasoner_with(name, CapabilityOptions::default(), handler)
    }

    pub fn reasoner_with<F, Fut>(
        mut self,
        name: impl Into<String>,
        options: CapabilityOptions,
        handler: F,
    ) -> Self
    where
        F: Fn(Agent, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AgentResult<Value>> + Send + 'static,
    {
        self.pending.push(PendingCapability::new(
            CapabilityKind::Reasoner,
            name,
            options,
            handler,
        ));
        self
    }

    pub fn skill<F, Fut>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Agent, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AgentResult<Value>> + Send + 'static,
    {
        self.skill_with(name, CapabilityOptions::default(), handler)
    }

    pub fn skill_with<F, Fut>(
        mut self,
        name: impl Into<String>,
        options: CapabilityOptions,
        handler: F,
    ) -> Self
    where
        F: Fn(Agent, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AgentResult<Value>> + Send + 'static,
    {
        self.pending.push(PendingCapability::new(
            CapabilityKind::Skill,
            name,
            options,
            handler,
        ));
        self
    }

    pub fn include_router(mut self, router: AgentRouter) -> Self {
        self.pending.extend(router.into_pending());
        self
    }

    /// Use `control_plane` instead of an HTTP client built from config.
    pub fn control_plane(mut self, control_plane: Arc<dyn ControlPlane>) -> Self {
        self.control_plane = Some(control_plane);
        self
    }

    pub fn build(self) -> AgentResult<Agent> {
        self.config.validate()?;

        let mut registry = CapabilityRegistry::new();
        for pending in self.pending {
            registry.register(pending)?;
        }

        let control_plane = match self.control_plane {
            Some(cp) => Some(cp),
            None => HttpControlPlane::from_config(&self.config)?
                .map(|cp| Arc::new(cp) as Arc<dyn ControlPlane>),
        };

        tracing::debug!(
            node_id = %self.config.node_id,
            capabilities = registry.len(),
            standalone = control_plane.is_none(),
            "Agent assembled"
        );

        let credentials_enabled = AtomicBool::new(self.config.did_enabled);
        Ok(Agent {
            inner: Arc::new(AgentInner {
                config: self.config,
                registry,
                control_plane,
                credentials_enabled,
                memory_subscriptions: SubscriptionSet::default(),
                started_at: Instant::now(),
            }),
        })
    }
}
