//! Capability descriptors and deployment modes

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

/// Whether a capability is a reasoner (AI-backed) or a skill (deterministic).
/// The runtime treats both identically; the kind only affects discovery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    #[default]
    Reasoner,
    Skill,
}

impl CapabilityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reasoner => "reasoner",
            Self::Skill => "skill",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the hosting process is deployed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentType {
    /// A persistent HTTP server that registers and keeps a lease.
    #[default]
    LongRunning,
    /// Invoked once per request by a function platform.
    Serverless,
}

impl DeploymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LongRunning => "long_running",
            Self::Serverless => "serverless",
        }
    }
}

impl fmt::Display for DeploymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "long_running" | "longrunning" | "server" => Ok(Self::LongRunning),
            "serverless" | "lambda" | "function" => Ok(Self::Serverless),
            other => Err(ConfigError::invalid(
                "deployment_type",
                other,
                "expected long_running or serverless",
            )),
        }
    }
}

/// Schema advertised when a capability declares none.
pub fn default_schema() -> Value {
    json!({ "type": "object", "additionalProperties": true })
}

/// Discovery-facing description of a registered capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub id: String,
    #[serde(skip)]
    pub kind: CapabilityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_schema")]
    pub input_schema: Value,
    #[serde(default = "default_schema")]
    pub output_schema: Value,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cli_enabled: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub mcp_enabled: bool,
}

impl CapabilityDescriptor {
    pub fn new(id: impl Into<String>, kind: CapabilityKind) -> Self {
        Self {
            id: id.into(),
            kind,
            description: None,
            input_schema: default_schema(),
            output_schema: default_schema(),
            tags: Vec::new(),
            cli_enabled: false,
            mcp_enabled: false,
        }
    }
}
