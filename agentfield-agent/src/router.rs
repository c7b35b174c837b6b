//! Namespaced capability groups
//!
//! An [`AgentRouter`] collects capabilities under a prefix. Including it in
//! an agent registers each one as `{prefix}_{name}`, which the control plane
//! addresses as `{node_id}.{prefix}_{name}`.

use crate::agent::Agent;
use crate::error::AgentResult;
use crate::registry::{CapabilityOptions, PendingCapability};
use agentfield_core::CapabilityKind;
use serde_json::Value;
use std::future::Future;

pub struct AgentRouter {
    prefix: String,
    entries: Vec<PendingCapability>,
}

impl AgentRouter {
    pub fn new(prefix: impl AsRef<str>) -> Self {
        Self {
            prefix: sanitize_prefix(prefix.as_ref()),
            entries: Vec::new(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
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
        self.entries.push(PendingCapability::new(
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
        self.entries.push(PendingCapability::new(
            CapabilityKind::Skill,
            name,
            options,
            handler,
        ));
        self
    }

    /// Registered names after prefixing.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| prefixed_name(&self.prefix, &e.name))
            .collect()
    }

    pub(crate) fn into_pending(self) -> Vec<PendingCapability> {
        let prefix = self.prefix;
        self.entries
            .into_iter()
            .map(|mut entry| {
                entry.name = prefixed_name(&prefix, &entry.name);
                entry
            })
            .collect()
    }
}

/// Reduce a prefix to `[A-Za-z0-9_]`, collapsing separators into `_`.
pub fn sanitize_prefix(prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

fn prefixed_name(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}_{name}")
    }
}
