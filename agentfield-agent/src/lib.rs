//! AgentField Agent - Capability Execution Runtime
//!
//! Hosts named capabilities (reasoners and skills) for one agent node,
//! serves them over HTTP and reports their execution lineage to the
//! AgentField control plane.
//!
//! Handlers receive the [`Agent`] and their JSON input. Nested
//! [`Agent::call`]s inherit the caller's execution context through a
//! task-local, so a call tree shares one run id without manual plumbing.

pub mod agent;
pub mod config;
pub mod constants;
pub mod control_plane;
pub mod credentials;
pub mod dispatcher;
pub mod error;
pub mod lease;
pub mod memory;
pub mod memory_events;
pub mod normalizer;
pub mod propagation;
pub mod registry;
pub mod reporter;
pub mod router;
pub mod routes;
pub mod serverless;
pub mod telemetry;

// Re-export commonly used types
pub use agent::{Agent, AgentBuilder, DiscoveryManifest};
pub use config::{AgentConfig, CallbackPolicy};
pub use control_plane::{ControlPlane, HttpControlPlane};
pub use credentials::CredentialFacade;
pub use dispatcher::{AcceptedExecution, DispatchMode, DispatchOutcome};
pub use error::{AgentError, AgentResult, ErrorCode};
pub use lease::{LeaseHandle, LeaseSnapshot};
pub use memory::MemoryFacade;
pub use memory_events::{ChangeHandler, ListenerSnapshot, MemoryListenerHandle};
pub use normalizer::Invocation;
pub use registry::{Capability, CapabilityOptions, CapabilityRegistry};
pub use router::AgentRouter;
pub use routes::create_router;
pub use serverless::EventAdapter;
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};

pub use agentfield_core::{
    CapabilityKind, DeploymentType, ExecutionContext, ExecutionStatus, MemoryAction,
    MemoryChangeEvent, MemoryScope, MemoryScopeKind, TargetRef,
};
