//! Capability target addressing

use crate::error::TargetError;
use std::fmt;

/// A parsed capability target.
///
/// `"name"` addresses a capability on this node. `"node.name"` addresses a
/// capability on another node, unless `node` is this node's own id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetRef {
    Local(String),
    Remote { node_id: String, name: String },
}

impl TargetRef {
    pub fn parse(raw: &str, own_node_id: &str) -> Result<Self, TargetError> {
        let trimmed = raw.trim().trim_start_matches('/');
        if trimmed.is_empty() {
            return Err(TargetError::Empty);
        }

        let Some((node, name)) = trimmed.split_once('.') else {
            return Ok(Self::Local(trimmed.to_string()));
        };

        if name.is_empty() {
            return Err(TargetError::Malformed {
                raw: raw.to_string(),
                reason: "missing capability name after '.'".to_string(),
            });
        }
        if name.contains('.') {
            return Err(TargetError::Malformed {
                raw: raw.to_string(),
                reason: "expected at most one '.' separator".to_string(),
            });
        }

        if node.is_empty() || node == own_node_id {
            Ok(Self::Local(name.to_string()))
        } else {
            Ok(Self::Remote {
                node_id: node.to_string(),
                name: name.to_string(),
            })
        }
    }

    /// Capability name without the node qualifier.
    pub fn name(&self) -> &str {
        match self {
            Self::Local(name) => name,
            Self::Remote { name, .. } => name,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    /// Fully-qualified `node.name` form as the control plane expects it.
    pub fn qualified(&self, own_node_id: &str) -> String {
        match self {
            Self::Local(name) => format!("{own_node_id}.{name}"),
            Self::Remote { node_id, name } => format!("{node_id}.{name}"),
        }
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(name) => write!(f, "{name}"),
            Self::Remote { node_id, name } => write!(f, "{node_id}.{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unqualified_is_local() {
        assert_eq!(
            TargetRef::parse("greet", "node-a"),
            Ok(TargetRef::Local("greet".into()))
        );
    }

    #[test]
    fn test_own_prefix_is_local() {
        let target = TargetRef::parse("node-a.greet", "node-a").unwrap();
        assert!(target.is_local());
        assert_eq!(target.name(), "greet");
    }

    #[test]
    fn test_other_node_is_remote() {
        let target = TargetRef::parse("node-b.greet", "node-a").unwrap();
        assert_eq!(
            target,
            TargetRef::Remote {
                node_id: "node-b".into(),
                name: "greet".into()
            }
        );
        assert_eq!(target.qualified("node-a"), "node-b.greet");
    }

    #[test]
    fn test_empty_and_malformed() {
        assert_eq!(TargetRef::parse("  ", "n"), Err(TargetError::Empty));
        assert!(matches!(
            TargetRef::parse("node.", "n"),
            Err(TargetError::Malformed { .. })
        ));
        assert!(matches!(
            TargetRef::parse("a.b.c", "n"),
            Err(TargetError::Malformed { .. })
        ));
    }

    #[test]
    fn test_leading_slash_is_ignored() {
        assert_eq!(
            TargetRef::parse("/greet", "n"),
            Ok(TargetRef::Local("greet".into()))
        );
    }
}
