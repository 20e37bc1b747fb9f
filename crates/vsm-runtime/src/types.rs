//! Types shared across the subsystem runtime: the operation envelope S1
//! dispatches, the handler interface capabilities are invoked through,
//! and the algedonic signal shape (spec §3, §4.5, §9).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RuntimeError;

/// `(capability-name, params, correlation_id)` — spec §3.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Operation {
    pub capability: String,
    pub params: serde_json::Value,
    pub correlation_id: String,
}

/// A batch of operations submitted to S1 in one call.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Coordination {
    pub operations: Vec<Operation>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum OperationOutcome {
    Ok(serde_json::Value),
    Error {
        error: String,
        missing_capability: Option<String>,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OperationResult {
    pub capability: String,
    pub correlation_id: String,
    pub outcome: OperationOutcome,
}

/// Spec §9: "Runtime-registered handler functions... an interface with a
/// single `invoke(params) -> result|error` method; capabilities carry a
/// pointer to an object implementing it, not a raw callable." Adapters
/// over external MCP servers implement this same interface, so S1 never
/// distinguishes a local handler from a remote one.
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    async fn invoke(&self, params: serde_json::Value) -> Result<serde_json::Value, RuntimeError>;
}

/// A handler built from a plain closure, for local capabilities that
/// don't need the adapter machinery `vsm-capability` builds for external
/// ones.
pub struct FnHandler<F>(pub F)
where
    F: Fn(serde_json::Value) -> Result<serde_json::Value, RuntimeError> + Send + Sync;

#[async_trait]
impl<F> CapabilityHandler for FnHandler<F>
where
    F: Fn(serde_json::Value) -> Result<serde_json::Value, RuntimeError> + Send + Sync,
{
    async fn invoke(&self, params: serde_json::Value) -> Result<serde_json::Value, RuntimeError> {
        (self.0)(params)
    }
}
