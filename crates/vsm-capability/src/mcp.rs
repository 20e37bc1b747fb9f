//! MCP (external capability server) — client view (spec §6.1).
//!
//! The core only needs an opaque endpoint that can `initialize`, list
//! tools, and invoke one by name; the JSON-RPC wire framing itself is
//! out of scope (spec §1). Grounded on the teacher's
//! `mdcs-sdk::network::NetworkTransport` trait-and-`MemoryTransport`
//! pattern: an `async_trait` client trait with a connect/call shape, and
//! the only shipped implementation is an in-memory mock for tests.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{CapabilityError, Result};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transport {
    Stdio,
    Tcp,
    Websocket,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub transport: Transport,
    /// `command` for stdio, `host:port` for tcp, `url` for websocket.
    pub target: String,
    pub args: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Connection state machine (spec §6.1):
/// `disconnected -> connecting -> initialized -> ready <-> calling -> ready | -> degraded -> disconnected`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Initialized,
    Ready,
    Calling,
    Degraded,
}

impl ConnectionState {
    /// Whether `to` is a legal next state from `self`. Transitions not
    /// on this list are programmer errors, not runtime conditions.
    pub fn can_transition_to(self, to: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, to),
            (Disconnected, Connecting)
                | (Connecting, Initialized)
                | (Connecting, Disconnected)
                | (Initialized, Ready)
                | (Ready, Calling)
                | (Calling, Ready)
                | (Calling, Degraded)
                | (Ready, Degraded)
                | (Degraded, Ready)
                | (Degraded, Disconnected)
                | (_, Disconnected)
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Circuit breaker around one external server (spec §6.1): opens after
/// 5 consecutive failures within 30s, stays open 30s, then half-opens
/// and admits up to 3 probes; any probe success closes it.
pub struct CircuitBreaker {
    state: BreakerState,
    recent_failures: VecDeque<Instant>,
    opened_at: Option<Instant>,
    half_open_probes_used: u32,
    failure_threshold: usize,
    failure_window: Duration,
    open_duration: Duration,
    half_open_max_probes: u32,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self {
            state: BreakerState::Closed,
            recent_failures: VecDeque::new(),
            opened_at: None,
            half_open_probes_used: 0,
            failure_threshold: 5,
            failure_window: Duration::from_secs(30),
            open_duration: Duration::from_secs(30),
            half_open_max_probes: 3,
        }
    }
}

impl CircuitBreaker {
    pub fn state(&mut self) -> BreakerState {
        self.maybe_half_open();
        self.state
    }

    fn maybe_half_open(&mut self) {
        if self.state == BreakerState::Open {
            if let Some(opened_at) = self.opened_at {
                if opened_at.elapsed() >= self.open_duration {
                    self.state = BreakerState::HalfOpen;
                    self.half_open_probes_used = 0;
                }
            }
        }
    }

    /// Whether a call may proceed right now, per the breaker's state.
    pub fn allow_call(&mut self) -> bool {
        match self.state() {
            BreakerState::Closed => true,
            BreakerState::Open => false,
            BreakerState::HalfOpen => {
                if self.half_open_probes_used < self.half_open_max_probes {
                    self.half_open_probes_used += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&mut self) {
        self.recent_failures.clear();
        self.state = BreakerState::Closed;
        self.opened_at = None;
        self.half_open_probes_used = 0;
    }

    pub fn record_failure(&mut self) {
        let now = Instant::now();
        self.recent_failures.push_back(now);
        while let Some(front) = self.recent_failures.front() {
            if now.duration_since(*front) > self.failure_window {
                self.recent_failures.pop_front();
            } else {
                break;
            }
        }
        if self.state == BreakerState::HalfOpen {
            // A failed probe reopens immediately.
            self.state = BreakerState::Open;
            self.opened_at = Some(now);
            return;
        }
        if self.recent_failures.len() >= self.failure_threshold {
            self.state = BreakerState::Open;
            self.opened_at = Some(now);
        }
    }
}

/// A capability server: `initialize`, `tools/list`, `tools/call` (spec §6.1).
#[async_trait]
pub trait McpClient: Send + Sync {
    async fn initialize(&self) -> Result<()>;
    async fn list_tools(&self) -> Result<Vec<McpTool>>;
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value>;
}

/// In-memory mock client: the only `McpClient` this crate ships, used
/// for tests and for the adapter examples (spec §1: real transports are
/// out of scope). Fault injection lets tests drive the circuit breaker.
pub struct MockMcpClient {
    tools: Vec<McpTool>,
    responses: Mutex<std::collections::HashMap<String, Value>>,
    fail_next_calls: Mutex<u32>,
}

impl MockMcpClient {
    pub fn new(tools: Vec<McpTool>) -> Self {
        Self {
            tools,
            responses: Mutex::new(std::collections::HashMap::new()),
            fail_next_calls: Mutex::new(0),
        }
    }

    pub fn with_response(self, tool: impl Into<String>, response: Value) -> Self {
        self.responses.lock().insert(tool.into(), response);
        self
    }

    /// The next `n` calls to `call_tool` fail with `transient_transport`.
    pub fn fail_next(&self, n: u32) {
        *self.fail_next_calls.lock() = n;
    }
}

#[async_trait]
impl McpClient for MockMcpClient {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn list_tools(&self) -> Result<Vec<McpTool>> {
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value> {
        {
            let mut remaining = self.fail_next_calls.lock();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(CapabilityError::TransientTransport {
                    kind: "mock-injected".to_string(),
                });
            }
        }
        if !self.tools.iter().any(|t| t.name == name) {
            return Err(CapabilityError::NotFound(name.to_string()));
        }
        Ok(self
            .responses
            .lock()
            .get(name)
            .cloned()
            .unwrap_or_else(|| serde_json::json!({ "echo": arguments })))
    }
}

/// Validate `params` against a minimal JSON-Schema-shaped `schema`
/// (`required` + `properties.<k>.type`). Validation failures never
/// reach the remote server (spec §4.6).
pub fn validate_against_schema(schema: &Value, params: &Value) -> std::result::Result<(), CapabilityError> {
    let Some(required) = schema.get("required").and_then(Value::as_array) else {
        return Ok(());
    };
    for field in required {
        let Some(field) = field.as_str() else { continue };
        if params.get(field).is_none() {
            return Err(CapabilityError::ValidationFailed {
                field: field.to_string(),
                reason: "required field missing".to_string(),
            });
        }
    }
    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (field, spec) in properties {
            let Some(expected_type) = spec.get("type").and_then(Value::as_str) else {
                continue;
            };
            if let Some(value) = params.get(field) {
                if !matches_json_type(value, expected_type) {
                    return Err(CapabilityError::ValidationFailed {
                        field: field.clone(),
                        reason: format!("expected type {expected_type}"),
                    });
                }
            }
        }
    }
    Ok(())
}

fn matches_json_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        _ => true,
    }
}

/// Used by tests/log sites that want to note a degraded transition.
pub fn log_degraded(server: &str) {
    warn!(kind = "server_unavailable", server, "circuit opened after consecutive failures");
}

/// Wraps one remote tool behind the `CapabilityHandler` interface S1
/// invokes capabilities through (spec §9: "an interface with a single
/// `invoke(params) -> result|error` method"). Validates inputs against
/// the remote tool's schema before ever reaching the network, guards
/// calls with a circuit breaker, and transforms the raw tool result into
/// the capability result shape (spec §4.6 "Adapter creation").
pub struct ServerAdapter {
    server_name: String,
    tool_name: String,
    schema: Value,
    client: std::sync::Arc<dyn McpClient>,
    breaker: Mutex<CircuitBreaker>,
}

impl ServerAdapter {
    pub fn new(
        server_name: impl Into<String>,
        tool_name: impl Into<String>,
        schema: Value,
        client: std::sync::Arc<dyn McpClient>,
    ) -> Self {
        Self {
            server_name: server_name.into(),
            tool_name: tool_name.into(),
            schema,
            client,
            breaker: Mutex::new(CircuitBreaker::default()),
        }
    }
}

#[async_trait]
impl vsm_runtime::CapabilityHandler for ServerAdapter {
    async fn invoke(&self, params: Value) -> std::result::Result<Value, vsm_runtime::RuntimeError> {
        validate_against_schema(&self.schema, &params).map_err(|e| vsm_runtime::RuntimeError::InvalidOperation {
            reason: e.to_string(),
        })?;

        if !self.breaker.lock().allow_call() {
            log_degraded(&self.server_name);
            return Err(vsm_runtime::RuntimeError::Fatal {
                actor: self.server_name.clone(),
                cause: "circuit breaker open".to_string(),
            });
        }

        match self.client.call_tool(&self.tool_name, params).await {
            Ok(result) => {
                self.breaker.lock().record_success();
                Ok(serde_json::json!({ "tool": self.tool_name, "result": result }))
            }
            Err(err) => {
                self.breaker.lock().record_failure();
                Err(vsm_runtime::RuntimeError::HandlerFailed {
                    name: self.tool_name.clone(),
                    reason: err.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breaker_opens_after_threshold_failures() {
        let mut breaker = CircuitBreaker::default();
        for _ in 0..4 {
            breaker.record_failure();
            assert_eq!(breaker.state(), BreakerState::Closed);
        }
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.allow_call());
    }

    #[test]
    fn breaker_half_opens_after_window_and_closes_on_success() {
        let mut breaker = CircuitBreaker {
            open_duration: Duration::from_millis(1),
            ..CircuitBreaker::default()
        };
        for _ in 0..5 {
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), BreakerState::Open);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        assert!(breaker.allow_call());
        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_admits_at_most_three_probes() {
        let mut breaker = CircuitBreaker {
            open_duration: Duration::from_millis(1),
            ..CircuitBreaker::default()
        };
        for _ in 0..5 {
            breaker.record_failure();
        }
        std::thread::sleep(Duration::from_millis(5));
        assert!(breaker.allow_call());
        assert!(breaker.allow_call());
        assert!(breaker.allow_call());
        assert!(!breaker.allow_call());
    }

    #[test]
    fn validation_rejects_missing_required_field() {
        let schema = serde_json::json!({ "required": ["path"] });
        let err = validate_against_schema(&schema, &serde_json::json!({})).unwrap_err();
        assert_eq!(err.kind(), "validation_failed");
    }

    #[tokio::test]
    async fn adapter_rejects_invalid_input_before_reaching_remote() {
        use vsm_runtime::CapabilityHandler;
        let client: std::sync::Arc<dyn McpClient> = std::sync::Arc::new(MockMcpClient::new(vec![McpTool {
            name: "csv_data_processing_v2".into(),
            description: "process csv data".into(),
            input_schema: serde_json::json!({}),
        }]));
        let schema = serde_json::json!({ "required": ["path"] });
        let adapter = ServerAdapter::new("srv", "csv_data_processing_v2", schema, client.clone());
        let err = adapter.invoke(serde_json::json!({})).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_operation");
    }

    #[tokio::test]
    async fn adapter_opens_breaker_after_repeated_remote_failures() {
        use vsm_runtime::CapabilityHandler;
        let mock = std::sync::Arc::new(MockMcpClient::new(vec![McpTool {
            name: "flaky".into(),
            description: "".into(),
            input_schema: serde_json::json!({}),
        }]));
        mock.fail_next(10);
        let client: std::sync::Arc<dyn McpClient> = mock;
        let adapter = ServerAdapter::new("srv", "flaky", serde_json::json!({}), client);
        for _ in 0..5 {
            assert!(adapter.invoke(serde_json::json!({})).await.is_err());
        }
        let err = adapter.invoke(serde_json::json!({})).await.unwrap_err();
        assert_eq!(err.kind(), "fatal");
    }

    #[tokio::test]
    async fn mock_client_fault_injection() {
        let client = MockMcpClient::new(vec![McpTool {
            name: "csv_data_processing_v2".into(),
            description: "process csv data".into(),
            input_schema: serde_json::json!({}),
        }]);
        client.fail_next(1);
        let err = client.call_tool("csv_data_processing_v2", serde_json::json!({})).await.unwrap_err();
        assert_eq!(err.kind(), "transient_transport");
        let ok = client.call_tool("csv_data_processing_v2", serde_json::json!({"a":1})).await.unwrap();
        assert_eq!(ok, serde_json::json!({"echo": {"a":1}}));
    }
}
