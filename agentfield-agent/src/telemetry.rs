//! Tracing subscriber initialization

use crate::error::{AgentError, AgentResult};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "agentfield_agent=debug,tower_http=info,info";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Filter used when `RUST_LOG` is unset
    pub default_filter: String,
    pub format: LogFormat,
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            default_filter: DEFAULT_FILTER.to_string(),
            format: match std::env::var("AGENTFIELD_LOG_FORMAT").as_deref() {
                Ok("pretty") | Ok("text") => LogFormat::Pretty,
                _ => LogFormat::Json,
            },
            service_name: std::env::var("AGENTFIELD_SERVICE_NAME")
                .unwrap_or_else(|_| "agentfield-agent".to_string()),
        }
    }
}

/// Install the global tracing subscriber.
///
/// Calling this a second time leaves the first subscriber in place.
pub fn init_tracing(config: &TelemetryConfig) -> AgentResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_filter))
        .map_err(|e| AgentError::internal(format!("Invalid log filter: {}", e)))?;

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match config.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };

    match result {
        Ok(()) => {
            tracing::info!(
                service_name = %config.service_name,
                format = ?config.format,
                "Telemetry initialized"
            );
        }
        Err(e) => {
            tracing::debug!(error = %e, "Tracing subscriber already installed");
        }
    }
    Ok(())
}
