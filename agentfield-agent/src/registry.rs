//! Capability registry
//!
//! Capabilities are registered once while the agent is assembled. After
//! [`crate::AgentBuilder::build`] the registry is frozen behind an `Arc` and
//! only read.

use crate::agent::Agent;
use crate::error::{AgentError, AgentResult};
use agentfield_core::{CapabilityDescriptor, CapabilityKind, TargetError};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

// ============================================================================
// HANDLERS
// ============================================================================

pub type HandlerFuture = Pin<Box<dyn Future<Output = AgentResult<Value>> + Send + 'static>>;

/// Type-erased capability handler.
///
/// Implemented for every `Fn(Agent, Value) -> impl Future<Output =
/// AgentResult<Value>>`, so plain async closures can be registered.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, agent: Agent, input: Value) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(Agent, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AgentResult<Value>> + Send + 'static,
{
    fn call(&self, agent: Agent, input: Value) -> HandlerFuture {
        Box::pin(self(agent, input))
    }
}

// ============================================================================
// OPTIONS
// ============================================================================

/// Declared metadata for a capability.
#[derive(Debug, Clone, Default)]
pub struct CapabilityOptions {
    pub description: Option<String>,
    pub input_schema: Option<Value>,
    pub output_schema: Option<Value>,
    pub tags: Vec<String>,
    pub cli_enabled: bool,
    pub mcp_enabled: bool,
}

impl CapabilityOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    pub fn output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn cli(mut self) -> Self {
        self.cli_enabled = true;
        self
    }

    pub fn mcp(mut self) -> Self {
        self.mcp_enabled = true;
        self
    }

    fn into_descriptor(self, name: String, kind: CapabilityKind) -> CapabilityDescriptor {
        let mut descriptor = CapabilityDescriptor::new(name, kind);
        descriptor.description = self.description;
        if let Some(schema) = self.input_schema {
            descriptor.input_schema = schema;
        }
        if let Some(schema) = self.output_schema {
            descriptor.output_schema = schema;
        }
        descriptor.tags = self.tags;
        descriptor.cli_enabled = self.cli_enabled;
        descriptor.mcp_enabled = self.mcp_enabled;
        descriptor
    }
}

/// A capability waiting to be registered by the builder.
pub(crate) struct PendingCapability {
    pub(crate) kind: CapabilityKind,
    pub(crate) name: String,
    pub(crate) handler: Arc<dyn Handler>,
    pub(crate) options: CapabilityOptions,
}

impl PendingCapability {
    pub(crate) fn new<F, Fut>(
        kind: CapabilityKind,
        name: impl Into<String>,
        options: CapabilityOptions,
        handler: F,
    ) -> Self
    where
        F: Fn(Agent, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AgentResult<Value>> + Send + 'static,
    {
        Self {
            kind,
            name: name.into(),
            handler: Arc::new(handler),
            options,
        }
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// A registered capability.
#[derive(Clone)]
pub struct Capability {
    descriptor: CapabilityDescriptor,
    handler: Arc<dyn Handler>,
}

impl Capability {
    pub fn name(&self) -> &str {
        &self.descriptor.id
    }

    pub fn kind(&self) -> CapabilityKind {
        self.descriptor.kind
    }

    pub fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    pub fn invoke(&self, agent: Agent, input: Value) -> HandlerFuture {
        self.handler.call(agent, input)
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    entries: HashMap<String, Capability>,
    order: Vec<String>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&mut self, pending: PendingCapability) -> AgentResult<()> {
        let PendingCapability {
            kind,
            name,
            handler,
            options,
        } = pending;

        if name.trim().is_empty() {
            return Err(TargetError::Empty.into());
        }
        if name.contains('.') || name.contains('/') {
            return Err(TargetError::Malformed {
                raw: name,
                reason: "capability names must not contain '.' or '/'".to_string(),
            }
            .into());
        }
        if self.entries.contains_key(&name) {
            return Err(AgentError::DuplicateCapability { name });
        }

        let capability = Capability {
            descriptor: options.into_descriptor(name.clone(), kind),
            handler,
        };
        self.order.push(name.clone());
        self.entries.insert(name, capability);
        Ok(())
    }

    pub fn get(&self, name: &str) -> AgentResult<&Capability> {
        self.entries
            .get(name)
            .ok_or_else(|| AgentError::not_found(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// All capabilities in registration order.
    pub fn all(&self) -> impl Iterator<Item = &Capability> {
        self.order.iter().filter_map(|name| self.entries.get(name))
    }

    pub fn descriptors(&self, kind: CapabilityKind) -> Vec<CapabilityDescriptor> {
        self.all()
            .filter(|c| c.kind() == kind)
            .map(|c| c.descriptor.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
