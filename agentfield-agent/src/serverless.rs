//! Serverless entry point
//!
//! A function-style deployment hands the runtime one event map per
//! invocation. Events are always executed synchronously.

use crate::agent::Agent;
use crate::dispatcher::{DispatchMode, DispatchOutcome};
use crate::normalizer;
use axum::http::StatusCode;
use serde_json::{json, Value};

/// Rewrites a platform-specific event into the generic
/// `{path?, target?, input?, execution_context?}` shape.
pub type EventAdapter<'a> = &'a (dyn Fn(Value) -> Value + Send + Sync);

impl Agent {
    /// Handle one serverless event and return the status and JSON body the
    /// platform should respond with.
    pub async fn handle_serverless_event(
        &self,
        event: Value,
        adapter: Option<EventAdapter<'_>>,
    ) -> (StatusCode, Value) {
        let event = match adapter {
            Some(adapt) => adapt(event),
            None => event,
        };

        let invocation = match normalizer::normalize_event(&event) {
            Ok(invocation) => invocation,
            Err(e) => return (e.status_code(), json!({ "error": e.to_string() })),
        };

        match self.dispatch(invocation, DispatchMode::Synchronous).await {
            Ok(DispatchOutcome::Completed(result)) => (StatusCode::OK, wrap_result(result)),
            Ok(DispatchOutcome::Accepted(accepted)) => (
                StatusCode::ACCEPTED,
                serde_json::to_value(accepted).unwrap_or(Value::Null),
            ),
            Err(e) => {
                tracing::warn!(code = %e.code(), error = %e, "Serverless invocation failed");
                (e.status_code(), json!({ "error": e.to_string() }))
            }
        }
    }
}

fn wrap_result(result: Value) -> Value {
    match result {
        Value::Object(_) => result,
        other => json!({ "result": other }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_result() {
        assert_eq!(wrap_result(json!({"a": 1})), json!({"a": 1}));
        assert_eq!(wrap_result(json!(3)), json!({"result": 3}));
        assert_eq!(wrap_result(json!(["x"])), json!({"result": ["x"]}));
    }
}
