//! Capability Registry, MCP client view, and Tool-Chain Engine
//! (spec §3-§4.6, §9).

pub mod chain;
pub mod error;
pub mod mcp;
pub mod registry;
pub mod types;

pub use chain::{Chain, Execution, ExecutionStatus, MapInvoker, RetryPolicy, Step, StepError, StepInvoker, ToolChainEngine};
pub use error::{CapabilityError, Result};
pub use mcp::{
    BreakerState, CircuitBreaker, ConnectionState, McpClient, McpTool, MockMcpClient, ServerAdapter, ServerConfig,
    Transport,
};
pub use registry::CapabilityRegistry;
pub use types::{
    Capability, CapabilityKind, CapabilitySource, MatchReport, Priority, Requirement, ScoredMatch, VarietyGap,
};
