//! Invocation normalization
//!
//! Every inbound surface (HTTP routes, path-addressed routes and generic
//! serverless events) is reduced to one [`Invocation`] before dispatch.
//!
//! Target resolution order: explicit parameter, path segment, query
//! parameter, body field. A request with no resolvable target fails with
//! [`AgentError::MissingTarget`]; the normalizer never guesses.

use crate::error::{AgentError, AgentResult};
use agentfield_core::{CapabilityKind, LineageMetadata};
use axum::http::HeaderMap;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Body keys that address the invocation rather than carry its input.
const ROUTING_KEYS: &[&str] = &[
    "target",
    "reasoner",
    "skill",
    "type",
    "target_type",
    "path",
    "rawpath",
    "execution_context",
    "executioncontext",
];

const TARGET_KEYS: &[&str] = &["target", "reasoner", "skill"];

/// A request reduced to what the dispatcher needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub target: String,
    pub target_type: Option<CapabilityKind>,
    pub input: Value,
    pub metadata: LineageMetadata,
}

// ============================================================================
// HTTP
// ============================================================================

/// Inbound HTTP request parts.
#[derive(Debug, Clone, Copy)]
pub struct HttpRequest<'a> {
    /// Target fixed by the caller, e.g. a route parameter.
    pub explicit_target: Option<&'a str>,
    pub path: &'a str,
    pub query: &'a HashMap<String, String>,
    pub headers: &'a HeaderMap,
    pub body: &'a Value,
}

pub fn normalize_http(request: HttpRequest<'_>) -> AgentResult<Invocation> {
    let (path_target, path_kind) = target_from_path(request.path);

    let addressed = request
        .explicit_target
        .and_then(non_empty)
        .or(path_target)
        .or_else(|| {
            TARGET_KEYS
                .iter()
                .find_map(|k| request.query.get(*k).and_then(|v| non_empty(v)))
        });
    let (target, target_type) = match addressed {
        Some(target) => (target, path_kind),
        None => body_address(request.body).ok_or(AgentError::MissingTarget)?,
    };

    let mut metadata = LineageMetadata::from_pairs(
        request
            .headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v))),
    );
    if let Some(ctx) = execution_context_field(request.body) {
        metadata.merge_missing(LineageMetadata::from_json(ctx));
    }

    Ok(Invocation {
        target: target.to_string(),
        target_type,
        input: extract_input(request.body),
        metadata,
    })
}

// ============================================================================
// SERVERLESS EVENTS
// ============================================================================

/// Normalize a generic serverless event map.
///
/// The target comes from `path`/`rawPath` (`/execute/{name}`,
/// `/reasoners/{name}`, `/skills/{name}`) or from a body field. Lineage
/// comes from the event's `execution_context` object.
pub fn normalize_event(event: &Value) -> AgentResult<Invocation> {
    let path = field(event, "path")
        .or_else(|| field(event, "rawpath"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let (path_target, path_kind) = target_from_path(path);

    let (target, target_type) = match path_target {
        Some(target) => (target, path_kind),
        None => body_address(event).ok_or(AgentError::MissingTarget)?,
    };

    let metadata = execution_context_field(event)
        .map(LineageMetadata::from_json)
        .unwrap_or_default();

    Ok(Invocation {
        target: target.to_string(),
        target_type,
        input: extract_input(event),
        metadata,
    })
}

// ============================================================================
// HELPERS
// ============================================================================

fn normalize_key(key: &str) -> String {
    key.to_ascii_lowercase().replace('-', "_")
}

fn compact_key(key: &str) -> String {
    normalize_key(key).replace('_', "")
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Case- and separator-insensitive object lookup.
fn field<'a>(body: &'a Value, key: &str) -> Option<&'a Value> {
    let wanted = compact_key(key);
    body.as_object()?
        .iter()
        .find(|(k, _)| compact_key(k) == wanted)
        .map(|(_, v)| v)
}

fn execution_context_field(body: &Value) -> Option<&Value> {
    field(body, "execution_context").filter(|v| v.is_object())
}

fn target_from_body(body: &Value) -> Option<&str> {
    TARGET_KEYS
        .iter()
        .find_map(|k| field(body, k).and_then(Value::as_str).and_then(non_empty))
}

/// Target named by the body itself, with the body's `type` as its kind.
/// A `type` field on a body that does not name its target is plain input.
fn body_address(body: &Value) -> Option<(&str, Option<CapabilityKind>)> {
    target_from_body(body).map(|target| (target, kind_from_body(body)))
}

fn kind_from_body(body: &Value) -> Option<CapabilityKind> {
    let raw = field(body, "target_type").or_else(|| field(body, "type"))?;
    match raw.as_str()?.trim().to_ascii_lowercase().as_str() {
        "reasoner" | "reasoners" => Some(CapabilityKind::Reasoner),
        "skill" | "skills" => Some(CapabilityKind::Skill),
        _ => None,
    }
}

/// Extract `(name, kind)` from `/execute/{name}`, `/reasoners/{name}` or
/// `/skills/{name}`. A bare `/execute` yields no target.
fn target_from_path(path: &str) -> (Option<&str>, Option<CapabilityKind>) {
    let path = path.split('?').next().unwrap_or_default();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    for window in segments.windows(2) {
        let kind = match window[0] {
            "reasoners" => Some(CapabilityKind::Reasoner),
            "skills" => Some(CapabilityKind::Skill),
            "execute" => None,
            _ => continue,
        };
        return (non_empty(window[1]), kind);
    }
    (None, None)
}

/// Input: the explicit `input`/`data` field, else the body minus routing
/// keys. Non-object explicit inputs are wrapped as `{value: ..}`.
pub fn extract_input(body: &Value) -> Value {
    let Some(obj) = body.as_object() else {
        return match body {
            Value::Null => Value::Object(Map::new()),
            other => serde_json::json!({ "value": other }),
        };
    };

    if let Some(explicit) = field(body, "input").or_else(|| field(body, "data")) {
        return match explicit {
            Value::Object(_) => explicit.clone(),
            Value::Null => Value::Object(Map::new()),
            other => serde_json::json!({ "value": other }),
        };
    }

    let filtered: Map<String, Value> = obj
        .iter()
        .filter(|(k, _)| {
            let key = normalize_key(k);
            !ROUTING_KEYS.contains(&key.as_str()) && !ROUTING_KEYS.contains(&compact_key(k).as_str())
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    Value::Object(filtered)
}
