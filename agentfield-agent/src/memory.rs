//! Scoped memory facade
//!
//! Resolves a [`MemoryScope`] from the current execution and the configured
//! default kind, then delegates to the control plane's memory service.
//! Change subscriptions are served by [`crate::memory_events`].

use crate::agent::Agent;
use crate::control_plane::{
    MemoryContext, MemoryRequest, VectorMatch, VectorSearchRequest, VectorSetRequest,
};
use crate::error::AgentResult;
use crate::memory_events::{ChangeHandler, Subscription};
use agentfield_core::{MemoryChangeEvent, MemoryScope, MemoryScopeKind};
use futures_util::FutureExt;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct MemoryFacade {
    agent: Agent,
    explicit: Option<MemoryScope>,
}

impl MemoryFacade {
    pub(crate) fn new(agent: Agent) -> Self {
        Self {
            agent,
            explicit: None,
        }
    }

    fn with_scope(&self, scope: MemoryScope) -> Self {
        Self {
            agent: self.agent.clone(),
            explicit: Some(scope),
        }
    }

    pub fn session(&self, session_id: impl Into<String>) -> Self {
        self.with_scope(MemoryScope::explicit(MemoryScopeKind::Session, session_id))
    }

    pub fn actor(&self, actor_id: impl Into<String>) -> Self {
        self.with_scope(MemoryScope::explicit(MemoryScopeKind::Actor, actor_id))
    }

    pub fn workflow(&self, workflow_id: impl Into<String>) -> Self {
        self.with_scope(MemoryScope::explicit(MemoryScopeKind::Workflow, workflow_id))
    }

    pub fn global(&self) -> Self {
        self.with_scope(MemoryScope::global())
    }

    /// Scope the next operation will use.
    pub fn scope(&self) -> MemoryScope {
        match &self.explicit {
            Some(scope) => scope.clone(),
            None => MemoryScope::resolve(
                self.agent.config().memory_scope,
                self.agent.current_context().as_ref(),
                self.agent.node_id(),
            ),
        }
    }

    fn context(&self) -> MemoryContext {
        MemoryContext::new(self.agent.node_id(), self.agent.current_context().as_ref())
    }

    fn request(&self, key: &str) -> MemoryRequest {
        MemoryRequest::new(key, &self.scope(), self.context())
    }

    pub async fn get(&self, key: &str) -> AgentResult<Option<Value>> {
        let control_plane = self.agent.require_control_plane("memory_get")?;
        control_plane.memory_get(&self.request(key)).await
    }

    pub async fn get_or(&self, key: &str, default: Value) -> AgentResult<Value> {
        Ok(self.get(key).await?.unwrap_or(default))
    }

    pub async fn exists(&self, key: &str) -> AgentResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    pub async fn set(&self, key: &str, data: Value) -> AgentResult<()> {
        let control_plane = self.agent.require_control_plane("memory_set")?;
        let request = self.request(key).with_data(data);
        tracing::debug!(key = key, scope = %request.scope, "Memory set");
        control_plane.memory_set(&request).await
    }

    pub async fn delete(&self, key: &str) -> AgentResult<()> {
        let control_plane = self.agent.require_control_plane("memory_delete")?;
        control_plane.memory_delete(&self.request(key)).await
    }

    /// Run `handler` for every change to a key matching any of `patterns`.
    ///
    /// A facade bound to an explicit scope (`session(..)`, `global()`, ...)
    /// only hears changes in that partition; the unscoped facade hears all
    /// of them. Handlers run once [`crate::memory_events::start`] is called.
    pub fn on_change<I, S, F, Fut>(&self, patterns: I, handler: F)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(MemoryChangeEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AgentResult<()>> + Send + 'static,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        tracing::debug!(patterns = ?patterns, scope = ?self.explicit, "Memory subscription added");
        let handler: ChangeHandler = Arc::new(move |event| handler(event).boxed());
        self.agent
            .memory_subscriptions()
            .add(Subscription::new(patterns, self.explicit.clone(), handler));
    }

    pub async fn set_vector(
        &self,
        key: &str,
        embedding: Vec<f32>,
        metadata: Value,
    ) -> AgentResult<()> {
        let control_plane = self.agent.require_control_plane("memory_vector_set")?;
        let scope = self.scope();
        control_plane
            .memory_vector_set(&VectorSetRequest {
                key: key.to_string(),
                embedding,
                metadata,
                scope: scope.scope,
                scope_id: scope.scope_id,
                context: self.context(),
            })
            .await
    }

    pub async fn search_vector(
        &self,
        query_embedding: Vec<f32>,
        top_k: usize,
        filters: Option<Value>,
    ) -> AgentResult<Vec<VectorMatch>> {
        let control_plane = self.agent.require_control_plane("memory_vector_search")?;
        let scope = self.scope();
        control_plane
            .memory_vector_search(&VectorSearchRequest {
                query_embedding,
                top_k,
                filters,
                scope: scope.scope,
                scope_id: scope.scope_id,
                context: self.context(),
            })
            .await
    }
}
