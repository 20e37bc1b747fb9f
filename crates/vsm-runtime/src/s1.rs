//! S1 — Operations (spec §4.5).
//!
//! Owns the registered capability handlers and executes coordinated
//! batches of operations against them, one batch at a time (this actor's
//! mailbox is its own serialization point — see spec §5).

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{CapabilityHandler, Coordination, OperationOutcome, OperationResult};

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct S1Metrics {
    pub executions: u64,
    pub successes: u64,
    pub failures: u64,
}

pub struct S1Operations {
    capabilities: HashMap<String, Arc<dyn CapabilityHandler>>,
    metrics: S1Metrics,
}

impl Default for S1Operations {
    fn default() -> Self {
        Self::new()
    }
}

impl S1Operations {
    pub fn new() -> Self {
        Self {
            capabilities: HashMap::new(),
            metrics: S1Metrics::default(),
        }
    }

    /// `register_capability(name, handler)` — idempotent overwrite.
    pub fn register_capability(&mut self, name: impl Into<String>, handler: Arc<dyn CapabilityHandler>) {
        self.capabilities.insert(name.into(), handler);
    }

    pub fn unregister_capability(&mut self, name: &str) {
        self.capabilities.remove(name);
    }

    pub fn metrics(&self) -> &S1Metrics {
        &self.metrics
    }

    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    /// `execute(coordination)`: for each operation, look up its handler
    /// by name; a missing capability or a handler failure yields an
    /// error entry for that operation only (spec §4.5 failure
    /// semantics) — other operations in the batch are unaffected. The
    /// result list preserves submission order (spec §8, invariant 6).
    pub async fn execute(&mut self, coordination: Coordination) -> Vec<OperationResult> {
        let mut results = Vec::with_capacity(coordination.operations.len());
        for op in coordination.operations {
            self.metrics.executions += 1;
            let outcome = match self.capabilities.get(&op.capability).cloned() {
                None => {
                    self.metrics.failures += 1;
                    warn!(kind = "missing_capability", capability = %op.capability, correlation_id = %op.correlation_id, "s1 dispatch miss");
                    OperationOutcome::Error {
                        error: format!("capability not registered: {}", op.capability),
                        missing_capability: Some(op.capability.clone()),
                    }
                }
                Some(handler) => match handler.invoke(op.params.clone()).await {
                    Ok(value) => {
                        self.metrics.successes += 1;
                        OperationOutcome::Ok(value)
                    }
                    Err(err) => {
                        self.metrics.failures += 1;
                        warn!(kind = %err.kind(), cause = %err, correlation_id = %op.correlation_id, "s1 handler failed");
                        OperationOutcome::Error {
                            error: err.to_string(),
                            missing_capability: None,
                        }
                    }
                },
            };
            results.push(OperationResult {
                capability: op.capability,
                correlation_id: op.correlation_id,
                outcome,
            });
        }
        results
    }
}
