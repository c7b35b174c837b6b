//! Execution endpoints
//!
//! `POST /execute`, `/execute/{name}`, `/reasoners/{name}` and
//! `/skills/{name}` all normalize into one invocation and share a handler.
//! Lineage arrives in `X-*` headers; the body is optional JSON.

use crate::agent::Agent;
use crate::dispatcher::{DispatchMode, DispatchOutcome};
use crate::error::{AgentError, AgentResult};
use crate::normalizer::{self, HttpRequest};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::Value;
use std::collections::HashMap;

/// POST /execute
pub async fn execute(
    State(agent): State<Agent>,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> AgentResult<Response> {
    run(&agent, None, &uri, &query, &headers, &body).await
}

/// POST /execute/{name}, /reasoners/{name}, /skills/{name}
pub async fn execute_named(
    State(agent): State<Agent>,
    Path(name): Path<String>,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> AgentResult<Response> {
    run(&agent, Some(&name), &uri, &query, &headers, &body).await
}

async fn run(
    agent: &Agent,
    explicit_target: Option<&str>,
    uri: &Uri,
    query: &HashMap<String, String>,
    headers: &HeaderMap,
    body: &Bytes,
) -> AgentResult<Response> {
    let body = parse_body(body)?;
    let invocation = normalizer::normalize_http(HttpRequest {
        explicit_target,
        path: uri.path(),
        query,
        headers,
        body: &body,
    })?;

    match agent.dispatch(invocation, DispatchMode::AllowAsync).await? {
        DispatchOutcome::Completed(result) => Ok((StatusCode::OK, Json(result)).into_response()),
        DispatchOutcome::Accepted(accepted) => {
            Ok((StatusCode::ACCEPTED, Json(accepted)).into_response())
        }
    }
}

fn parse_body(bytes: &Bytes) -> AgentResult<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes).map_err(AgentError::from)
}

pub fn create_router() -> Router<Agent> {
    Router::new()
        .route("/execute", post(execute))
        .route("/execute/:name", post(execute_named))
        .route("/reasoners/:name", post(execute_named))
        .route("/skills/:name", post(execute_named))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_body_empty_is_null() {
        assert_eq!(parse_body(&Bytes::new()).unwrap(), Value::Null);
        assert_eq!(parse_body(&Bytes::from_static(b"  \n")).unwrap(), Value::Null);
    }

    #[test]
    fn test_parse_body_invalid_json_is_bad_request() {
        let err = parse_body(&Bytes::from_static(b"{not json")).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
