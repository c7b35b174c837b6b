//! Agent Configuration Module
//!
//! Configuration is loaded from `AGENTFIELD_*` environment variables with
//! development-friendly defaults, or assembled programmatically with the
//! `with_*` setters.

use crate::constants::{
    DEFAULT_BIND_HOST, DEFAULT_CALLBACK_ATTEMPT_TIMEOUT_SECS, DEFAULT_CALLBACK_BASE_DELAY_SECS,
    DEFAULT_CALLBACK_MAX_ATTEMPTS, DEFAULT_EVENT_TIMEOUT_SECS, DEFAULT_LEASE_INTERVAL_SECS,
    DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_TEAM_ID,
};
use agentfield_core::{ConfigError, CoreResult, DeploymentType, MemoryScopeKind};
use std::time::Duration;

// ============================================================================
// CALLBACK POLICY
// ============================================================================

/// Retry policy for async completion callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackPolicy {
    pub max_attempts: u32,
    /// Delay after the first failed attempt. Doubles after each failure.
    pub base_delay: Duration,
    pub attempt_timeout: Duration,
}

impl Default for CallbackPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_CALLBACK_MAX_ATTEMPTS,
            base_delay: Duration::from_secs(DEFAULT_CALLBACK_BASE_DELAY_SECS),
            attempt_timeout: Duration::from_secs(DEFAULT_CALLBACK_ATTEMPT_TIMEOUT_SECS),
        }
    }
}

impl CallbackPolicy {
    /// Delay slept after failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << shift)
    }
}

// ============================================================================
// AGENT CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub node_id: String,
    pub version: String,
    pub team_id: String,

    /// Control-plane base URL. Without it the node runs standalone: no
    /// registration, no events, no async callbacks.
    pub server_url: Option<String>,

    pub bind_host: String,
    pub port: u16,

    /// URL the control plane uses to reach this node.
    pub public_url: Option<String>,

    pub token: Option<String>,
    pub deployment_type: DeploymentType,

    /// Zero disables lease renewal.
    pub lease_interval: Duration,

    /// Tolerate registration failure and keep serving.
    pub dev_mode: bool,

    pub did_enabled: bool,
    pub memory_scope: MemoryScopeKind,
    pub request_timeout: Duration,
    pub event_timeout: Duration,
    pub callback: CallbackPolicy,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            node_id: String::new(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            team_id: DEFAULT_TEAM_ID.to_string(),
            server_url: None,
            bind_host: DEFAULT_BIND_HOST.to_string(),
            port: DEFAULT_PORT,
            public_url: None,
            token: None,
            deployment_type: DeploymentType::LongRunning,
            lease_interval: Duration::from_secs(DEFAULT_LEASE_INTERVAL_SECS),
            dev_mode: false,
            did_enabled: false,
            memory_scope: MemoryScopeKind::Workflow,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            event_timeout: Duration::from_secs(DEFAULT_EVENT_TIMEOUT_SECS),
            callback: CallbackPolicy::default(),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_flag(key: &str) -> bool {
    env_string(key)
        .map(|s| matches!(s.to_lowercase().as_str(), "true" | "1" | "yes" | "on"))
        .unwrap_or(false)
}

impl AgentConfig {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            ..Default::default()
        }
    }

    /// Create AgentConfig from environment variables.
    ///
    /// Environment variables:
    /// - `AGENTFIELD_NODE_ID`: Node identity (required)
    /// - `AGENTFIELD_VERSION`: Advertised version (default: crate version)
    /// - `AGENTFIELD_TEAM_ID`: Team the node registers under (default: "default")
    /// - `AGENTFIELD_SERVER`: Control-plane base URL (default: none)
    /// - `AGENTFIELD_BIND_HOST`: Listen host (default: 0.0.0.0)
    /// - `PORT` / `AGENTFIELD_PORT`: Listen port (default: 8001)
    /// - `AGENTFIELD_PUBLIC_URL`: Advertised base URL (default: http://localhost:{port})
    /// - `AGENTFIELD_TOKEN`: Bearer token for control-plane calls
    /// - `AGENTFIELD_DEPLOYMENT_TYPE`: long_running or serverless (default: long_running)
    /// - `AGENTFIELD_LEASE_INTERVAL_SECS`: Lease renewal period, 0 disables (default: 120)
    /// - `AGENTFIELD_DEV_MODE`: Tolerate registration failure (default: false)
    /// - `AGENTFIELD_DID_ENABLED`: Enable credential issuance (default: false)
    /// - `AGENTFIELD_MEMORY_SCOPE`: Default memory scope (default: workflow)
    /// - `AGENTFIELD_REQUEST_TIMEOUT_SECS`: Control-plane call timeout (default: 15)
    /// - `AGENTFIELD_EVENT_TIMEOUT_SECS`: Workflow event timeout (default: 5)
    pub fn from_env() -> CoreResult<Self> {
        let defaults = Self::default();

        let node_id = env_string("AGENTFIELD_NODE_ID").ok_or_else(|| {
            ConfigError::MissingRequired {
                field: "AGENTFIELD_NODE_ID".to_string(),
            }
        })?;

        let port = match env_string("PORT").or_else(|| env_string("AGENTFIELD_PORT")) {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| ConfigError::invalid("port", raw.clone(), e.to_string()))?,
            None => defaults.port,
        };

        let deployment_type = match env_string("AGENTFIELD_DEPLOYMENT_TYPE") {
            Some(raw) => raw.parse()?,
            None => defaults.deployment_type,
        };

        let memory_scope = match env_string("AGENTFIELD_MEMORY_SCOPE") {
            Some(raw) => raw.parse()?,
            None => defaults.memory_scope,
        };

        let lease_interval = env_string("AGENTFIELD_LEASE_INTERVAL_SECS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.lease_interval);

        let request_timeout = env_string("AGENTFIELD_REQUEST_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        let event_timeout = env_string("AGENTFIELD_EVENT_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.event_timeout);

        let config = Self {
            node_id,
            version: env_string("AGENTFIELD_VERSION").unwrap_or(defaults.version),
            team_id: env_string("AGENTFIELD_TEAM_ID").unwrap_or(defaults.team_id),
            server_url: env_string("AGENTFIELD_SERVER"),
            bind_host: env_string("AGENTFIELD_BIND_HOST").unwrap_or(defaults.bind_host),
            port,
            public_url: env_string("AGENTFIELD_PUBLIC_URL"),
            token: env_string("AGENTFIELD_TOKEN"),
            deployment_type,
            lease_interval,
            dev_mode: env_flag("AGENTFIELD_DEV_MODE"),
            did_enabled: env_flag("AGENTFIELD_DID_ENABLED"),
            memory_scope,
            request_timeout,
            event_timeout,
            callback: defaults.callback,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.node_id.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "node_id".to_string(),
            });
        }
        if self.node_id.contains('.') || self.node_id.contains('/') {
            return Err(ConfigError::invalid(
                "node_id",
                self.node_id.clone(),
                "must not contain '.' or '/'",
            ));
        }
        for (field, url) in [("server_url", &self.server_url), ("public_url", &self.public_url)] {
            if let Some(url) = url {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(ConfigError::invalid(field, url.clone(), "expected http(s) URL"));
                }
            }
        }
        if self.callback.max_attempts == 0 {
            return Err(ConfigError::invalid(
                "callback.max_attempts",
                "0",
                "at least one attempt is required",
            ));
        }
        Ok(())
    }

    // ========================================================================
    // Builder-style setters
    // ========================================================================

    pub fn with_server(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_bind(mut self, host: impl Into<String>, port: u16) -> Self {
        self.bind_host = host.into();
        self.port = port;
        self
    }

    pub fn with_public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = Some(url.into());
        self
    }

    pub fn with_deployment_type(mut self, deployment_type: DeploymentType) -> Self {
        self.deployment_type = deployment_type;
        self
    }

    pub fn with_lease_interval(mut self, interval: Duration) -> Self {
        self.lease_interval = interval;
        self
    }

    pub fn with_dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }

    pub fn with_did_enabled(mut self, enabled: bool) -> Self {
        self.did_enabled = enabled;
        self
    }

    pub fn with_memory_scope(mut self, scope: MemoryScopeKind) -> Self {
        self.memory_scope = scope;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_callback_policy(mut self, policy: CallbackPolicy) -> Self {
        self.callback = policy;
        self
    }

    // ========================================================================
    // Derived values
    // ========================================================================

    /// Base URL advertised to the control plane.
    pub fn base_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://localhost:{}", self.port),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }

    /// Whether inbound executions with a control-plane execution id are
    /// accepted immediately and reported through the status callback.
    pub fn async_callbacks_enabled(&self) -> bool {
        self.deployment_type == DeploymentType::LongRunning && self.server_url.is_some()
    }

    pub fn lease_enabled(&self) -> bool {
        !self.lease_interval.is_zero()
    }
}
