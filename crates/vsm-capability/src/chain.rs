//! Tool-Chain Engine (spec §4.6): a chain is a total order of steps,
//! each seeing a threaded `context` of prior outputs, with optional
//! per-step conditions, transforms, and a retry policy for transient
//! errors. Grounded on the teacher's `mdcs-delta::anti_entropy`
//! retry/ack-tracking style, generalized from peer delta acknowledgment
//! to per-step invocation retry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use ulid::Ulid;

use crate::error::{CapabilityError, Result};

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 1_000,
        }
    }
}

pub type Condition = Arc<dyn Fn(&Value) -> bool + Send + Sync>;
pub type Transform = Arc<dyn Fn(Value) -> Value + Send + Sync>;

#[derive(Clone)]
pub struct Step {
    pub step_id: String,
    pub tool: String,
    pub args_template: Value,
    pub condition: Option<Condition>,
    pub transform: Option<Transform>,
    pub retry_policy: RetryPolicy,
}

impl Step {
    pub fn new(step_id: impl Into<String>, tool: impl Into<String>, args_template: Value) -> Self {
        Self {
            step_id: step_id.into(),
            tool: tool.into(),
            args_template,
            condition: None,
            transform: None,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }
}

#[derive(Clone)]
pub struct Chain {
    pub id: String,
    pub name: String,
    pub steps: Vec<Step>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepError {
    pub step_id: String,
    pub error: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    pub chain_id: String,
    pub status: ExecutionStatus,
    pub context: serde_json::Map<String, Value>,
    pub errors: Vec<StepError>,
    pub started_at: u64,
    pub completed_at: Option<u64>,
}

/// Whatever actually runs a step's tool. In a wired node this forwards
/// to S1's `execute` (so chain steps can target either local or
/// MCP-adapted capabilities uniformly); tests use `MapInvoker` instead.
#[async_trait]
pub trait StepInvoker: Send + Sync {
    async fn invoke(&self, tool: &str, args: Value) -> Result<Value>;
}

/// A `StepInvoker` backed by a fixed map of closures — useful for tests
/// and for chains composed entirely of in-process steps.
pub struct MapInvoker {
    handlers: HashMap<String, Box<dyn Fn(Value) -> Result<Value> + Send + Sync>>,
}

impl Default for MapInvoker {
    fn default() -> Self {
        Self::new()
    }
}

impl MapInvoker {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn with_handler(
        mut self,
        tool: impl Into<String>,
        handler: impl Fn(Value) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.handlers.insert(tool.into(), Box::new(handler));
        self
    }
}

#[async_trait]
impl StepInvoker for MapInvoker {
    async fn invoke(&self, tool: &str, args: Value) -> Result<Value> {
        match self.handlers.get(tool) {
            Some(handler) => handler(args),
            None => Err(CapabilityError::NotFound(tool.to_string())),
        }
    }
}

pub struct ToolChainEngine {
    invoker: Arc<dyn StepInvoker>,
    executions: HashMap<String, Execution>,
    clock: Arc<dyn Fn() -> u64 + Send + Sync>,
}

impl ToolChainEngine {
    pub fn new(invoker: Arc<dyn StepInvoker>) -> Self {
        Self {
            invoker,
            executions: HashMap::new(),
            clock: Arc::new(now_ms),
        }
    }

    #[cfg(test)]
    fn with_clock(invoker: Arc<dyn StepInvoker>, clock: Arc<dyn Fn() -> u64 + Send + Sync>) -> Self {
        Self {
            invoker,
            executions: HashMap::new(),
            clock,
        }
    }

    pub fn get_execution(&self, id: &str) -> Option<&Execution> {
        self.executions.get(id)
    }

    /// Runs every non-skipped step in order, threading `context`. A
    /// step whose retries are all exhausted records its error and
    /// execution continues (spec §9 open question, resolved: failures
    /// after the first are still recorded, per spec.md's explicit
    /// instruction). Final status is `Failed` iff any step recorded an
    /// error.
    pub async fn execute(&mut self, chain: &Chain, input: Value) -> Execution {
        let id = Ulid::new().to_string();
        let started_at = (self.clock)();
        let mut context = serde_json::Map::new();
        context.insert("input".to_string(), input);
        let mut errors = Vec::new();

        for step in &chain.steps {
            let context_value = Value::Object(context.clone());
            if let Some(condition) = &step.condition {
                if !condition(&context_value) {
                    continue;
                }
            }

            let args = resolve_args(&step.args_template, &context_value);
            match self.invoke_with_retry(step, args).await {
                Ok(result) => {
                    let result = match &step.transform {
                        Some(transform) => transform(result),
                        None => result,
                    };
                    context.insert(step.step_id.clone(), result);
                }
                Err(err) => {
                    warn!(kind = %err.kind(), cause = %err, step_id = %step.step_id, "chain step failed after retries");
                    errors.push(StepError {
                        step_id: step.step_id.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        let status = if errors.is_empty() {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Failed
        };
        let execution = Execution {
            id: id.clone(),
            chain_id: chain.id.clone(),
            status,
            context,
            errors,
            started_at,
            completed_at: Some((self.clock)()),
        };
        self.executions.insert(id, execution.clone());
        execution
    }

    async fn invoke_with_retry(&self, step: &Step, args: Value) -> Result<Value> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.invoker.invoke(&step.tool, args.clone()).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < step.retry_policy.max_attempts => {
                    tokio::time::sleep(Duration::from_millis(step.retry_policy.delay_ms)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as u64
}

/// Resolves `context.<path>` string references inside an args template
/// against the threaded context (spec §4.6: "args may reference
/// context.path substitutions"). Non-matching strings and all other
/// JSON values pass through unchanged.
fn resolve_args(template: &Value, context: &Value) -> Value {
    match template {
        Value::String(s) => match s.strip_prefix("context.") {
            Some(path) => resolve_path(context, path).unwrap_or(Value::Null),
            None => template.clone(),
        },
        Value::Object(map) => Value::Object(map.iter().map(|(k, v)| (k.clone(), resolve_args(v, context))).collect()),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve_args(v, context)).collect()),
        other => other.clone(),
    }
}

fn resolve_path(value: &Value, path: &str) -> Option<Value> {
    let mut current = value;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    Some(current.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn fast_clock() -> Arc<dyn Fn() -> u64 + Send + Sync> {
        let counter = Arc::new(AtomicU64::new(0));
        Arc::new(move || counter.fetch_add(1, Ordering::SeqCst))
    }

    #[tokio::test]
    async fn happy_path_threads_context_across_steps() {
        let invoker = Arc::new(
            MapInvoker::new()
                .with_handler("fetch", |_| Ok(serde_json::json!({ "filename": "a.csv" })))
                .with_handler("analyze", |args| Ok(serde_json::json!({ "analyzed": args }))),
        );
        let mut engine = ToolChainEngine::with_clock(invoker, fast_clock());
        let chain = Chain {
            id: "c1".into(),
            name: "fetch-analyze".into(),
            steps: vec![
                Step::new("fetch", "fetch", serde_json::json!({})),
                Step::new(
                    "analyze",
                    "analyze",
                    serde_json::json!({ "filename": "context.fetch.filename" }),
                ),
            ],
        };
        let execution = engine.execute(&chain, serde_json::json!({})).await;
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(execution.context["fetch"]["filename"], "a.csv");
        assert_eq!(execution.context["analyze"]["analyzed"]["filename"], "a.csv");
    }

    #[tokio::test]
    async fn condition_false_skips_step_contributing_nothing() {
        let invoker = Arc::new(MapInvoker::new().with_handler("maybe", |_| Ok(serde_json::json!("ran"))));
        let mut engine = ToolChainEngine::with_clock(invoker, fast_clock());
        let chain = Chain {
            id: "c1".into(),
            name: "conditional".into(),
            steps: vec![Step::new("maybe", "maybe", serde_json::json!({}))
                .with_condition(Arc::new(|_ctx| false))],
        };
        let execution = engine.execute(&chain, serde_json::json!({})).await;
        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert!(!execution.context.contains_key("maybe"));
    }

    #[tokio::test]
    async fn transform_postprocesses_before_context_write() {
        let invoker = Arc::new(MapInvoker::new().with_handler("raw", |_| Ok(serde_json::json!(2))));
        let mut engine = ToolChainEngine::with_clock(invoker, fast_clock());
        let chain = Chain {
            id: "c1".into(),
            name: "doubled".into(),
            steps: vec![Step::new("raw", "raw", serde_json::json!({}))
                .with_transform(Arc::new(|v| serde_json::json!(v.as_i64().unwrap() * 10)))],
        };
        let execution = engine.execute(&chain, serde_json::json!({})).await;
        assert_eq!(execution.context["raw"], 20);
    }

    // Scenario S-5 from the spec.
    #[tokio::test]
    async fn scenario_s5_failure_in_middle_step() {
        let invoker = Arc::new(
            MapInvoker::new()
                .with_handler("fetch", |_| Ok(serde_json::json!({ "ok": true })))
                .with_handler("transform", |_| {
                    Err(CapabilityError::TransientTransport {
                        kind: "always-fails".to_string(),
                    })
                })
                .with_handler("analyze", |_| Ok(serde_json::json!({ "done": true }))),
        );
        let mut engine = ToolChainEngine::with_clock(invoker, fast_clock());
        let chain = Chain {
            id: "c1".into(),
            name: "fetch-transform-analyze".into(),
            steps: vec![
                Step::new("fetch", "fetch", serde_json::json!({})),
                Step::new("transform", "transform", serde_json::json!({}))
                    .with_retry_policy(RetryPolicy { max_attempts: 2, delay_ms: 1 }),
                Step::new("analyze", "analyze", serde_json::json!({})),
            ],
        };
        let execution = engine.execute(&chain, serde_json::json!({})).await;
        assert!(execution.context.contains_key("fetch"));
        assert!(execution.context.contains_key("analyze"));
        assert!(!execution.context.contains_key("transform"));
        assert_eq!(execution.errors.len(), 1);
        assert_eq!(execution.errors[0].step_id, "transform");
        assert_eq!(execution.status, ExecutionStatus::Failed);
    }

    #[tokio::test]
    async fn get_execution_is_independently_observable() {
        let invoker = Arc::new(MapInvoker::new().with_handler("a", |_| Ok(serde_json::json!("v"))));
        let mut engine = ToolChainEngine::with_clock(invoker, fast_clock());
        let chain = Chain {
            id: "c1".into(),
            name: "single".into(),
            steps: vec![Step::new("a", "a", serde_json::json!({}))],
        };
        let execution = engine.execute(&chain, serde_json::json!({})).await;
        let fetched = engine.get_execution(&execution.id).unwrap();
        assert_eq!(fetched.id, execution.id);
    }
}
