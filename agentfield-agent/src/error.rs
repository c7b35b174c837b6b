//! Error Types for the Agent Runtime
//!
//! This module defines error handling for the runtime, including:
//! - AgentError enum covering every failure a dispatch can surface
//! - ErrorCode enum for categorizing errors on the wire
//! - IntoResponse implementation for Axum HTTP responses
//!
//! Errors are rendered as `{error, code, details?}` with the mapped status.

use agentfield_core::{ConfigError, TargetError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Wire-level error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Invocation Errors (400, 404, 409)
    // ========================================================================
    /// No capability could be determined for the request
    MissingTarget,

    /// Target string could not be parsed
    InvalidTarget,

    /// Request body could not be decoded
    InvalidInput,

    /// No capability registered under the requested name
    CapabilityNotFound,

    /// Two capabilities were registered under one name
    DuplicateCapability,

    /// Credential issuance requested while disabled
    CredentialsDisabled,

    // ========================================================================
    // Execution Errors (500, 502)
    // ========================================================================
    /// The capability handler returned an error
    HandlerError,

    /// A network call could not be completed
    TransportError,

    /// A remote capability ran and reported failure
    RemoteExecutionError,

    /// The control plane rejected a request
    ControlPlaneError,

    // ========================================================================
    // Lifecycle Errors (500, 503)
    // ========================================================================
    /// Node registration failed
    RegistrationError,

    /// An async completion callback was never accepted
    CallbackDeliveryFailure,

    /// No control plane is configured
    ControlPlaneUnavailable,

    /// Invalid configuration
    ConfigError,

    /// Internal runtime error
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::MissingTarget | ErrorCode::InvalidTarget | ErrorCode::InvalidInput => {
                StatusCode::BAD_REQUEST
            }

            ErrorCode::CapabilityNotFound => StatusCode::NOT_FOUND,
            ErrorCode::DuplicateCapability => StatusCode::CONFLICT,
            ErrorCode::CredentialsDisabled => StatusCode::FORBIDDEN,

            ErrorCode::TransportError
            | ErrorCode::RemoteExecutionError
            | ErrorCode::ControlPlaneError => StatusCode::BAD_GATEWAY,

            ErrorCode::RegistrationError | ErrorCode::ControlPlaneUnavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            ErrorCode::HandlerError
            | ErrorCode::CallbackDeliveryFailure
            | ErrorCode::ConfigError
            | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::MissingTarget => "Missing target or reasoner",
            ErrorCode::InvalidTarget => "Invalid target",
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::CapabilityNotFound => "Capability not found",
            ErrorCode::DuplicateCapability => "Capability already registered",
            ErrorCode::CredentialsDisabled => "Credential issuance is disabled",
            ErrorCode::HandlerError => "Capability handler failed",
            ErrorCode::TransportError => "Network call failed",
            ErrorCode::RemoteExecutionError => "Remote execution failed",
            ErrorCode::ControlPlaneError => "Control plane rejected the request",
            ErrorCode::RegistrationError => "Node registration failed",
            ErrorCode::CallbackDeliveryFailure => "Completion callback was not delivered",
            ErrorCode::ControlPlaneUnavailable => "No control plane configured",
            ErrorCode::ConfigError => "Invalid configuration",
            ErrorCode::InternalError => "Internal error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// AGENT ERROR
// ============================================================================

/// Every error the runtime can surface to a caller.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("missing target or reasoner")]
    MissingTarget,

    #[error(transparent)]
    InvalidTarget(#[from] TargetError),

    #[error("capability '{name}' not found")]
    CapabilityNotFound { name: String },

    #[error("capability '{name}' is already registered")]
    DuplicateCapability { name: String },

    /// Raised by capability code. Carries the message reported upstream.
    #[error("{message}")]
    Handler {
        message: String,
        details: Option<Value>,
    },

    #[error("transport error calling {target}: {message}")]
    Transport { target: String, message: String },

    #[error("remote execution of {target} failed: {message}")]
    RemoteExecution {
        target: String,
        status: Option<u16>,
        message: String,
    },

    #[error("control plane {operation} returned {status}: {message}")]
    ControlPlane {
        operation: &'static str,
        status: u16,
        message: String,
    },

    #[error("node registration failed: {0}")]
    Registration(String),

    #[error("completion callback for {execution_id} not delivered after {attempts} attempts: {message}")]
    CallbackDelivery {
        execution_id: String,
        attempts: u32,
        message: String,
    },

    #[error("credential issuance is disabled")]
    CredentialsDisabled,

    #[error("no control plane configured for {operation}")]
    ControlPlaneUnavailable { operation: &'static str },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Internal(String),
}

impl AgentError {
    /// Error raised from capability code.
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler {
            message: message.into(),
            details: None,
        }
    }

    /// Error raised from capability code with structured details.
    pub fn handler_with_details(message: impl Into<String>, details: Value) -> Self {
        Self::Handler {
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn not_found(name: impl Into<String>) -> Self {
        Self::CapabilityNotFound { name: name.into() }
    }

    pub fn transport(target: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::Transport {
            target: target.into(),
            message: err.to_string(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AgentError::MissingTarget => ErrorCode::MissingTarget,
            AgentError::InvalidTarget(_) => ErrorCode::InvalidTarget,
            AgentError::CapabilityNotFound { .. } => ErrorCode::CapabilityNotFound,
            AgentError::DuplicateCapability { .. } => ErrorCode::DuplicateCapability,
            AgentError::Handler { .. } => ErrorCode::HandlerError,
            AgentError::Transport { .. } => ErrorCode::TransportError,
            AgentError::RemoteExecution { .. } => ErrorCode::RemoteExecutionError,
            AgentError::ControlPlane { .. } => ErrorCode::ControlPlaneError,
            AgentError::Registration(_) => ErrorCode::RegistrationError,
            AgentError::CallbackDelivery { .. } => ErrorCode::CallbackDeliveryFailure,
            AgentError::CredentialsDisabled => ErrorCode::CredentialsDisabled,
            AgentError::ControlPlaneUnavailable { .. } => ErrorCode::ControlPlaneUnavailable,
            AgentError::Config(_) => ErrorCode::ConfigError,
            AgentError::Serialization(_) => ErrorCode::InvalidInput,
            AgentError::Internal(_) => ErrorCode::InternalError,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.code().status_code()
    }

    fn details(&self) -> Option<&Value> {
        match self {
            AgentError::Handler { details, .. } => details.as_ref(),
            _ => None,
        }
    }

    /// JSON body used for HTTP error responses and failure reports.
    pub fn to_body(&self) -> Value {
        let mut body = serde_json::json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        if let (Some(details), Some(obj)) = (self.details(), body.as_object_mut()) {
            obj.insert("details".to_string(), details.clone());
        }
        body
    }
}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for AgentError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!(code = %self.code(), error = %self, "Request failed");
        }
        (status, Json(self.to_body())).into_response()
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for runtime operations and capability handlers.
pub type AgentResult<T> = Result<T, AgentError>;
