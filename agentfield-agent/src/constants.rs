//! Centralized constants for the agent runtime.

pub use agentfield_core::headers;

// ============================================================================
// DEFAULTS
// ============================================================================

pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8001;
pub const DEFAULT_TEAM_ID: &str = "default";
pub const DEFAULT_LEASE_INTERVAL_SECS: u64 = 120;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_EVENT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_LEASE_TIMEOUT_SECS: u64 = 5;

pub const DEFAULT_CALLBACK_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_CALLBACK_BASE_DELAY_SECS: u64 = 1;
pub const DEFAULT_CALLBACK_ATTEMPT_TIMEOUT_SECS: u64 = 30;

pub const MEMORY_EVENTS_RECONNECT_INITIAL_MS: u64 = 500;
pub const MEMORY_EVENTS_RECONNECT_MAX_MS: u64 = 30_000;
/// Buffered change events per subscription stream.
pub const MEMORY_EVENTS_BUFFER: usize = 256;

/// Identifies this runtime in registration metadata.
pub const SDK_NAME: &str = "rust";
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// CONTROL-PLANE ENDPOINTS
// ============================================================================

pub const NODE_REGISTER_PATH: &str = "/api/v1/nodes/register";
pub const EXECUTE_PATH: &str = "/api/v1/execute";
pub const WORKFLOW_EVENTS_PATH: &str = "/api/v1/workflow/executions/events";
pub const EXECUTIONS_PATH: &str = "/api/v1/executions";
pub const EXECUTION_NOTE_PATH: &str = "/api/v1/executions/note";
pub const MEMORY_GET_PATH: &str = "/api/v1/memory/get";
pub const MEMORY_SET_PATH: &str = "/api/v1/memory/set";
pub const MEMORY_DELETE_PATH: &str = "/api/v1/memory/delete";
pub const MEMORY_VECTOR_SET_PATH: &str = "/api/v1/memory/vector/set";
pub const MEMORY_VECTOR_SEARCH_PATH: &str = "/api/v1/memory/vector/search";
pub const MEMORY_EVENTS_WS_PATH: &str = "/api/v1/memory/events/ws";
pub const CREDENTIAL_ISSUE_PATH: &str = "/api/v1/execution/vc";
pub const AUDIT_EXPORT_PATH: &str = "/api/v1/did/export/vcs";

pub fn node_status_path(node_id: &str) -> String {
    format!("/api/v1/nodes/{node_id}/status")
}

pub fn node_shutdown_path(node_id: &str) -> String {
    format!("/api/v1/nodes/{node_id}/shutdown")
}

pub fn execution_status_path(execution_id: &str) -> String {
    format!("{EXECUTIONS_PATH}/{execution_id}/status")
}

pub fn execute_target_path(target: &str) -> String {
    format!("{EXECUTE_PATH}/{}", target.trim_start_matches('/'))
}

/// Websocket URL for an `http(s)://` control-plane base URL.
pub fn websocket_url(base_url: &str, path: &str) -> String {
    let base = if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base_url.to_string()
    };
    format!("{base}{path}")
}
