//! Property-Based Tests for Invocation Normalization
//!
//! **Property: Body Addressing**
//!
//! A body naming its target carries every other field through as input,
//! minus the routing keys.
//!
//! **Property: Header Round-Trip**
//!
//! Headers emitted by an outbound call normalize into metadata that builds
//! a valid child of the caller on the receiving node.

use agentfield_agent::normalizer::{normalize_http, HttpRequest};
use agentfield_core::ExecutionContext;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use proptest::prelude::*;
use serde_json::{Map, Value};
use std::collections::HashMap;

// ============================================================================
// PROPERTY TEST STRATEGIES
// ============================================================================

const RESERVED: &[&str] = &[
    "target", "reasoner", "skill", "type", "targettype", "path", "rawpath", "input", "data",
];

fn field_name_strategy() -> impl Strategy<Value = String> {
    "[a-z]{3,10}".prop_filter("routing keys are not input", |k| {
        !RESERVED.contains(&k.as_str())
    })
}

fn fields_strategy() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map(field_name_strategy(), any::<i64>(), 0..6).prop_map(|fields| {
        fields
            .into_iter()
            .map(|(k, v)| (k, Value::from(v)))
            .collect()
    })
}

fn header_map(pairs: &[(&'static str, String)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        let name = HeaderName::from_bytes(name.as_bytes()).unwrap();
        map.insert(name, HeaderValue::from_str(value).unwrap());
    }
    map
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #[test]
    fn prop_body_target_strips_routing_keys(
        name in "[a-z][a-z0-9_]{0,15}",
        fields in fields_strategy(),
    ) {
        let mut body = fields.clone();
        body.insert("target".to_string(), Value::from(name.clone()));
        let body = Value::Object(body);

        let query = HashMap::new();
        let headers = HeaderMap::new();
        let inv = normalize_http(HttpRequest {
            explicit_target: None,
            path: "/execute",
            query: &query,
            headers: &headers,
            body: &body,
        })
        .unwrap();

        prop_assert_eq!(inv.target, name);
        prop_assert_eq!(inv.input, Value::Object(fields));
        prop_assert!(inv.metadata.is_empty());
    }

    #[test]
    fn prop_outbound_headers_rebuild_child(
        session in prop::option::of("[a-z0-9]{4,8}"),
        hops in 0u32..5,
    ) {
        let mut caller = ExecutionContext::root("node-a", "outer");
        caller.session_id = session.clone();
        for i in 0..hops {
            caller = caller.derive_child("node-a", format!("hop_{i}"));
        }

        let headers = header_map(&caller.outbound_headers());
        let query = HashMap::new();
        let body = Value::Null;
        let inv = normalize_http(HttpRequest {
            explicit_target: Some("greet"),
            path: "/execute/greet",
            query: &query,
            headers: &headers,
            body: &body,
        })
        .unwrap();

        let callee = ExecutionContext::from_lineage(&inv.metadata, "node-b", "greet");
        prop_assert_eq!(&callee.run_id, &caller.run_id);
        prop_assert_eq!(&callee.workflow_id, &caller.workflow_id);
        prop_assert_eq!(callee.parent_execution_id.as_deref(), Some(caller.execution_id.as_str()));
        prop_assert_eq!(callee.depth, caller.depth + 1);
        prop_assert_eq!(callee.session_id, session);
        prop_assert_ne!(&callee.execution_id, &caller.execution_id);
    }
}
