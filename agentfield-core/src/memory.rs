//! Memory scope resolution and change events
//!
//! Memory is stored by the control plane and partitioned by scope. The
//! runtime only decides which scope partition a read or write lands in,
//! and which subscribers a [`MemoryChangeEvent`] is delivered to.

use crate::context::ExecutionContext;
use crate::error::ConfigError;
use crate::identity::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub const GLOBAL_SCOPE_ID: &str = "global";

/// Which partition of memory an operation addresses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryScopeKind {
    Global,
    Agent,
    Session,
    Actor,
    #[default]
    Workflow,
}

impl MemoryScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Agent => "agent",
            Self::Session => "session",
            Self::Actor => "actor",
            Self::Workflow => "workflow",
        }
    }
}

impl fmt::Display for MemoryScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryScopeKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "global" => Ok(Self::Global),
            "agent" | "node" => Ok(Self::Agent),
            "session" => Ok(Self::Session),
            "actor" | "user" => Ok(Self::Actor),
            "workflow" | "run" => Ok(Self::Workflow),
            other => Err(ConfigError::invalid(
                "memory_scope",
                other,
                "expected global, agent, session, actor or workflow",
            )),
        }
    }
}

/// A resolved scope: its kind plus the id of the partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryScope {
    pub scope: MemoryScopeKind,
    pub scope_id: String,
}

impl MemoryScope {
    pub fn global() -> Self {
        Self {
            scope: MemoryScopeKind::Global,
            scope_id: GLOBAL_SCOPE_ID.to_string(),
        }
    }

    /// Resolve `kind` against the current execution.
    ///
    /// When the execution carries no id for the requested scope (no
    /// session, no actor, or no execution at all) the global scope is used.
    pub fn resolve(
        kind: MemoryScopeKind,
        ctx: Option<&ExecutionContext>,
        agent_node_id: &str,
    ) -> Self {
        let scope_id = match kind {
            MemoryScopeKind::Global => None,
            MemoryScopeKind::Agent => Some(agent_node_id.to_string()),
            MemoryScopeKind::Session => ctx.and_then(|c| c.session_id.clone()),
            MemoryScopeKind::Actor => ctx.and_then(|c| c.actor_id.clone()),
            MemoryScopeKind::Workflow => ctx.map(|c| c.workflow_id.clone()),
        };
        match scope_id {
            Some(scope_id) if !scope_id.is_empty() => Self {
                scope: kind,
                scope_id,
            },
            _ => Self::global(),
        }
    }

    /// Scope bound to an explicit id, bypassing resolution.
    pub fn explicit(kind: MemoryScopeKind, scope_id: impl Into<String>) -> Self {
        Self {
            scope: kind,
            scope_id: scope_id.into(),
        }
    }
}

// ============================================================================
// CHANGE EVENTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryAction {
    Set,
    Delete,
}

/// A write or delete observed by the control plane's memory service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryChangeEvent {
    pub id: String,
    pub scope: MemoryScopeKind,
    pub scope_id: String,
    pub key: String,
    pub action: MemoryAction,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub previous_data: Option<Value>,
    /// Writer lineage: `agent_id`, `workflow_id` and friends.
    #[serde(default)]
    pub metadata: Value,
    pub timestamp: Timestamp,
}

impl MemoryChangeEvent {
    pub fn in_scope(&self, scope: &MemoryScope) -> bool {
        self.scope == scope.scope && self.scope_id == scope.scope_id
    }
}

/// Match a memory key against a subscription pattern.
///
/// `*` matches any run of characters, dots included, so
/// `prefs.*` covers `prefs.theme` and `prefs.ui.theme`. Everything else
/// matches literally.
pub fn key_matches(pattern: &str, key: &str) -> bool {
    let pattern = pattern.as_bytes();
    let key = key.as_bytes();
    let (mut p, mut k) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while k < key.len() {
        if p < pattern.len() && pattern[p] == b'*' {
            backtrack = Some((p, k));
            p += 1;
        } else if p < pattern.len() && pattern[p] == key[k] {
            p += 1;
            k += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            k = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|&c| c == b'*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_scope_uses_workflow_id() {
        let ctx = ExecutionContext::root("node", "greet");
        let scope = MemoryScope::resolve(MemoryScopeKind::Workflow, Some(&ctx), "node");
        assert_eq!(scope.scope, MemoryScopeKind::Workflow);
        assert_eq!(scope.scope_id, ctx.workflow_id);
    }

    #[test]
    fn test_missing_session_falls_back_to_global() {
        let ctx = ExecutionContext::root("node", "greet");
        let scope = MemoryScope::resolve(MemoryScopeKind::Session, Some(&ctx), "node");
        assert_eq!(scope, MemoryScope::global());
    }

    #[test]
    fn test_no_context_falls_back_to_global() {
        assert_eq!(
            MemoryScope::resolve(MemoryScopeKind::Workflow, None, "node"),
            MemoryScope::global()
        );
        let agent = MemoryScope::resolve(MemoryScopeKind::Agent, None, "node");
        assert_eq!(agent.scope_id, "node");
    }

    #[test]
    fn test_key_patterns() {
        assert!(key_matches("prefs.exact", "prefs.exact"));
        assert!(!key_matches("prefs.exact", "prefs.exactly"));
        assert!(key_matches("prefs.*", "prefs.theme"));
        assert!(key_matches("prefs.*", "prefs.ui.theme"));
        assert!(!key_matches("prefs.*", "settings.theme"));
        assert!(key_matches("settings.*.primary", "settings.layout.primary"));
        assert!(!key_matches("settings.*.primary", "settings.layout.secondary"));
        assert!(key_matches("features.*.flag.*", "features.beta.flag.rollout"));
        assert!(key_matches("*", "anything"));
        assert!(!key_matches("", "anything"));
    }

    #[test]
    fn test_change_event_wire_shape() {
        let event: MemoryChangeEvent = serde_json::from_value(serde_json::json!({
            "id": "evt_1",
            "scope": "session",
            "scope_id": "s1",
            "key": "prefs.theme",
            "action": "delete",
            "previous_data": "dark",
            "timestamp": "2025-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(event.action, MemoryAction::Delete);
        assert_eq!(event.data, None);
        assert_eq!(event.previous_data, Some(serde_json::json!("dark")));
        assert!(event.in_scope(&MemoryScope::explicit(MemoryScopeKind::Session, "s1")));
        assert!(!event.in_scope(&MemoryScope::global()));
    }

    #[test]
    fn test_scope_kind_aliases() {
        assert_eq!("run".parse(), Ok(MemoryScopeKind::Workflow));
        assert_eq!("Session".parse(), Ok(MemoryScopeKind::Session));
        assert!("tenant".parse::<MemoryScopeKind>().is_err());
    }
}
