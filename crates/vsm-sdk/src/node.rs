//! The embedding facade: one `Node` owns one instance of every lower
//! layer and exposes the handful of operations an application actually
//! needs. Modeled directly on the teacher's `mdcs_sdk::Client` (the
//! same "one struct, one config, a handful of high-level verbs" shape),
//! renamed `Client` -> `Node`.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex as SyncMutex;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use ulid::Ulid;

use vsm_bus::{Bus, Channel, Envelope, Payload};
use vsm_capability::{
    Capability, CapabilityRegistry, CapabilityKind, Chain, Execution, MatchReport, Requirement, ScoredMatch,
    StepInvoker, ToolChainEngine, VarietyGap,
};
use vsm_crdt::{CrdtDescriptor, CrdtKind, CrdtOp, CrdtStore, CrdtValue, TaggedDelta};
use vsm_hlc::{Hlc, NodeId};
use vsm_runtime::{
    AlgedonicSignal, AnnotatedPlan, AuditRecord, Coordination, Operation, OperationResult, Policy, PolicyContext,
    Prediction, ResourceDemand, ResourcePool, RestartPolicy, S1Operations, S2Coordination, S3Control, S4Intelligence,
    S5Policy, StrategicDecision, Supervisor,
};
use vsm_store::{StoreConfig, StoreStats, TieredStore};
use vsm_variety::{VarietyConfig, VarietyController};

use crate::error::{NodeError, Result};

#[derive(Clone, Debug)]
pub struct NodeConfig {
    pub node_id: String,
    pub bus_mailbox_capacity: usize,
    pub store: StoreConfig,
    pub variety: VarietyConfig,
    pub log_json: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: format!("node-{}", Ulid::new()),
            bus_mailbox_capacity: 1_024,
            store: StoreConfig::default(),
            variety: VarietyConfig::default(),
            log_json: false,
        }
    }
}

pub struct NodeConfigBuilder {
    config: NodeConfig,
}

impl Default for NodeConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: NodeConfig::default(),
        }
    }

    pub fn node_id(mut self, id: impl Into<String>) -> Self {
        self.config.node_id = id.into();
        self
    }

    pub fn bus_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.config.bus_mailbox_capacity = capacity;
        self
    }

    pub fn store(mut self, store: StoreConfig) -> Self {
        self.config.store = store;
        self
    }

    pub fn variety(mut self, variety: VarietyConfig) -> Self {
        self.config.variety = variety;
        self
    }

    pub fn log_json(mut self, enabled: bool) -> Self {
        self.config.log_json = enabled;
        self
    }

    pub fn build(self) -> NodeConfig {
        self.config
    }
}

/// One VSM node: S1-S5, the bus, the CRDT store, the tiered store, the
/// capability registry, the tool-chain engine and the variety
/// controller, wired together.
pub struct Node {
    node_id: NodeId,
    bus: Arc<Bus>,
    hlc: SyncMutex<Hlc>,
    s1: Arc<AsyncMutex<S1Operations>>,
    s2: SyncMutex<S2Coordination>,
    s3: SyncMutex<S3Control>,
    s4: SyncMutex<S4Intelligence>,
    s5: SyncMutex<S5Policy>,
    crdt_store: SyncMutex<CrdtStore>,
    tiered_store: Arc<SyncMutex<TieredStore>>,
    registry: AsyncMutex<CapabilityRegistry>,
    chain_engine: AsyncMutex<ToolChainEngine>,
    variety: SyncMutex<VarietyController>,
    /// Holds the supervised decay task's handle; the task itself is
    /// detached (spawned via `Supervisor::supervise`) and keeps running
    /// independently of this field.
    _decay_handle: JoinHandle<()>,
}

/// Drives the tiered store's access-counter decay on a fixed interval
/// (spec §4.2). Runs until aborted; a panic is restarted with a fresh
/// tick cadence by the owning supervisor.
async fn decay_loop(store: Arc<SyncMutex<TieredStore>>, interval_ms: u64) -> std::result::Result<(), String> {
    let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
    loop {
        ticker.tick().await;
        store.lock().tick_decay();
    }
}

/// Threads every tool-chain step through S1's `execute`, so chains can
/// target any capability (local or MCP-adapted) S1 can dispatch.
struct S1Invoker {
    s1: Arc<AsyncMutex<S1Operations>>,
}

#[async_trait::async_trait]
impl StepInvoker for S1Invoker {
    async fn invoke(&self, tool: &str, args: Value) -> vsm_capability::Result<Value> {
        let coordination = Coordination {
            operations: vec![Operation {
                capability: tool.to_string(),
                params: args,
                correlation_id: Ulid::new().to_string(),
            }],
        };
        let mut results = self.s1.lock().await.execute(coordination).await;
        match results.pop() {
            Some(OperationResult {
                outcome: vsm_runtime::OperationOutcome::Ok(value),
                ..
            }) => Ok(value),
            Some(OperationResult {
                outcome: vsm_runtime::OperationOutcome::Error { error, missing_capability },
                ..
            }) => {
                if missing_capability.is_some() {
                    Err(vsm_capability::CapabilityError::NotFound(tool.to_string()))
                } else {
                    Err(vsm_capability::CapabilityError::InvalidOperation(error))
                }
            }
            None => Err(vsm_capability::CapabilityError::NotFound(tool.to_string())),
        }
    }
}

impl Node {
    pub fn new(config: NodeConfig) -> Result<Self> {
        let node_id = NodeId::new(config.node_id.clone());
        let s1 = Arc::new(AsyncMutex::new(S1Operations::new()));
        let chain_engine = ToolChainEngine::new(Arc::new(S1Invoker { s1: s1.clone() }));
        let tiered_store = Arc::new(SyncMutex::new(TieredStore::open(config.store.clone())?));

        let decay_store = tiered_store.clone();
        let decay_interval_ms = config.store.decay_interval_ms;
        let supervisor = Supervisor::new(500, 30_000);
        let decay_handle = supervisor.supervise("tiered-store-decay", RestartPolicy::Permanent, move || {
            decay_loop(decay_store.clone(), decay_interval_ms)
        });

        Ok(Self {
            hlc: SyncMutex::new(Hlc::new(node_id.clone())),
            bus: Arc::new(Bus::new(config.bus_mailbox_capacity)),
            s1,
            crdt_store: SyncMutex::new(CrdtStore::new(node_id.clone())),
            tiered_store,
            registry: AsyncMutex::new(CapabilityRegistry::new()),
            chain_engine: AsyncMutex::new(chain_engine),
            variety: SyncMutex::new(VarietyController::new(node_id.clone(), config.variety.clone())),
            s2: SyncMutex::new(S2Coordination::new(256)),
            s3: SyncMutex::new(S3Control::new(ResourcePool::default(), 256)),
            s4: SyncMutex::new(S4Intelligence::new(60_000)),
            s5: SyncMutex::new(S5Policy::new(Policy::default())),
            node_id,
            _decay_handle: decay_handle,
        })
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn bus(&self) -> &Arc<Bus> {
        &self.bus
    }

    fn next_hlc(&self) -> Hlc {
        let mut clock = self.hlc.lock();
        *clock = clock.tick();
        clock.clone()
    }

    // --- S1: operations -----------------------------------------------

    pub async fn register_local_capability(&self, name: impl Into<String>, handler: Arc<dyn vsm_runtime::CapabilityHandler>) {
        self.s1.lock().await.register_capability(name, handler);
    }

    pub async fn submit_operation(&self, coordination: Coordination) -> Vec<OperationResult> {
        self.s1.lock().await.execute(coordination).await
    }

    // --- S2: coordination -----------------------------------------------

    pub fn coordinate(&self, operations: Vec<Operation>) -> AnnotatedPlan {
        self.s2.lock().coordinate(operations)
    }

    // --- S3: control -----------------------------------------------

    pub fn optimize(&self, demand: ResourceDemand, policy_weight: f64, intelligence_weight: f64) -> Vec<Operation> {
        self.s3.lock().optimize(demand, policy_weight, intelligence_weight)
    }

    pub fn audit(&self, unit: impl Into<String>, compliance: f64, efficiency: f64) -> AuditRecord {
        self.s3.lock().audit(unit, compliance, efficiency, self.next_hlc().ts)
    }

    // --- S4: intelligence -----------------------------------------------

    pub fn predict_future(&self, horizon: u64, scenarios: Vec<String>, probabilities: Vec<f64>) -> Prediction {
        let at = self.next_hlc().ts;
        self.s4.lock().predict_future(horizon, scenarios, probabilities, at)
    }

    // --- S5: policy -----------------------------------------------

    pub fn get_policy(&self, context: PolicyContext) -> Policy {
        self.s5.lock().get_policy(context)
    }

    pub fn strategic_decision(&self, issue: &str, s3_view: Value, s4_view: Value) -> StrategicDecision {
        self.s5.lock().strategic_decision(issue, s3_view, s4_view)
    }

    // --- Algedonic channel -----------------------------------------------

    pub fn publish_algedonic(&self, source: impl Into<String>, intensity: f64, payload: Value) -> Result<()> {
        let at = self.next_hlc().ts;
        let signal = AlgedonicSignal::new(source, intensity, payload, at);
        let envelope = Envelope {
            sender: self.node_id.to_string(),
            correlation_id: Ulid::new().to_string(),
            hlc: self.next_hlc(),
            channel: Channel::Algedonic,
            routing_key: "algedonic".to_string(),
            priority: Channel::Algedonic.default_priority(),
            ttl_ms: Some(60_000),
            payload: Payload::Algedonic(serde_json::json!({
                "source": signal.source,
                "intensity": signal.intensity,
                "payload": signal.payload,
                "is_override": signal.is_override(),
            })),
        };
        self.bus.publish(envelope).map_err(NodeError::from)
    }

    // --- CRDT context store -----------------------------------------------

    pub fn create_crdt(&self, id: impl Into<String>, kind: CrdtKind, metadata: Value) -> Result<CrdtDescriptor> {
        Ok(self.crdt_store.lock().create(id, kind, metadata)?)
    }

    pub fn update_crdt(&self, id: &str, op: CrdtOp) -> Result<Option<TaggedDelta>> {
        Ok(self.crdt_store.lock().update(id, op)?)
    }

    pub fn crdt_value(&self, id: &str) -> Result<CrdtValue> {
        Ok(self.crdt_store.lock().value(id)?)
    }

    pub fn merge_crdt_delta(&self, tagged: &TaggedDelta) -> Result<()> {
        Ok(self.crdt_store.lock().merge_delta(tagged)?)
    }

    // --- Tiered store -----------------------------------------------

    pub fn store_put(&self, key: impl Into<String>, value: Vec<u8>) -> Result<()> {
        Ok(self.tiered_store.lock().put(key, value)?)
    }

    pub fn store_get(&self, key: &str) -> Result<Vec<u8>> {
        Ok(self.tiered_store.lock().get(key)?)
    }

    pub fn store_stats(&self) -> StoreStats {
        self.tiered_store.lock().stats()
    }

    // --- Capability registry -----------------------------------------------

    pub async fn register_server(&self, name: impl Into<String>, client: Arc<dyn vsm_capability::McpClient>) {
        self.registry.lock().await.register_server(name, client);
    }

    pub async fn register_capability(&self, def: Capability) -> Result<String> {
        Ok(self.registry.lock().await.register_capability(def)?)
    }

    pub async fn discover_capabilities(&self, req: &Requirement) -> Vec<ScoredMatch> {
        self.registry.lock().await.discover_capabilities(req).await
    }

    pub async fn match_capabilities(&self, reqs: &[Requirement]) -> MatchReport {
        self.registry.lock().await.match_capabilities(reqs).await
    }

    pub async fn acquire_capability(&self, id: &str, tool_name: impl Into<String>, schema: Value) -> Result<()> {
        let (adapted, handler) = self.registry.lock().await.acquire_capability(id, tool_name, schema).await?;
        self.register_local_capability(adapted.name.clone(), handler).await;
        Ok(())
    }

    pub async fn calculate_variety_gap(&self, required: usize) -> VarietyGap {
        self.registry.lock().await.calculate_variety_gap(required)
    }

    // --- Tool-chain engine -----------------------------------------------

    pub async fn execute_chain(&self, chain: &Chain, input: Value) -> Execution {
        self.chain_engine.lock().await.execute(chain, input).await
    }

    // --- Variety/gap controller -----------------------------------------------

    /// Runs one evaluation tick against the registry's current
    /// operational variety (by distinct capability kind) and the given
    /// environmental requirements, publishing any algedonic actions.
    pub async fn evaluate_variety(&self, environmental_requirements: &[Requirement]) -> Vec<vsm_variety::Action> {
        let operational = {
            let registry = self.registry.lock().await;
            vsm_variety::operational_variety_from_registry(&registry)
        };
        let environmental = vsm_variety::environmental_variety_from_requirements(environmental_requirements);
        let distribution = std::collections::HashMap::new();
        let at = self.next_hlc().ts;
        let metric = vsm_variety::compute_metric(operational, environmental, &distribution, at);
        let actions = self.variety.lock().evaluate(metric);
        self.variety.lock().publish_algedonic_actions(&self.bus, &actions);
        actions
    }
}

/// Initializes process-wide structured logging (spec §9: "logging ...
/// the way the teacher does"), honoring `RUST_LOG` if set.
pub fn init_tracing(json: bool) {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        let _ = tracing_subscriber::fmt().with_env_filter(env_filter).with_target(true).json().try_init();
    } else {
        let _ = tracing_subscriber::fmt().with_env_filter(env_filter).with_target(true).try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsm_runtime::FnHandler;

    fn test_config() -> NodeConfig {
        let dir = std::env::temp_dir().join(format!("vsm-sdk-test-{}", Ulid::new()));
        NodeConfigBuilder::new()
            .node_id("test-node")
            .store(vsm_store::StoreConfigBuilder::new().cold_path(dir).build())
            .build()
    }

    #[tokio::test]
    async fn tiered_store_decay_task_runs_without_manual_tick_decay() {
        let dir = std::env::temp_dir().join(format!("vsm-sdk-decay-test-{}", Ulid::new()));
        let config = NodeConfigBuilder::new()
            .node_id("decay-node")
            .store(
                vsm_store::StoreConfigBuilder::new()
                    .cold_path(dir)
                    .access_threshold(2)
                    .decay_interval_ms(50)
                    .build(),
            )
            .build();
        let node = Node::new(config).unwrap();
        node.store_put("k", b"v".to_vec()).unwrap();
        node.store_get("k").unwrap(); // access count -> 1

        // Give the supervised decay task time to tick at least once: if it
        // is actually running, the counter resets to 0 instead of
        // accumulating toward `access_threshold`.
        tokio::time::sleep(std::time::Duration::from_millis(150)).await;

        node.store_get("k").unwrap(); // access count -> 1 again, not 2
        assert_eq!(node.tiered_store.lock().tier_of("k"), Some(vsm_store::Tier::Hot));
    }

    #[test]
    fn node_config_builder_overrides_defaults() {
        let config = NodeConfigBuilder::new()
            .node_id("n1")
            .bus_mailbox_capacity(16)
            .log_json(true)
            .build();
        assert_eq!(config.node_id, "n1");
        assert_eq!(config.bus_mailbox_capacity, 16);
        assert!(config.log_json);
    }

    #[tokio::test]
    async fn submit_operation_end_to_end() {
        let node = Node::new(test_config()).unwrap();
        node.register_local_capability("echo", Arc::new(FnHandler(|p: Value| Ok(p))))
            .await;
        let results = node
            .submit_operation(Coordination {
                operations: vec![Operation {
                    capability: "echo".to_string(),
                    params: serde_json::json!({ "x": 1 }),
                    correlation_id: "c1".to_string(),
                }],
            })
            .await;
        assert!(matches!(
            &results[0].outcome,
            vsm_runtime::OperationOutcome::Ok(v) if v == &serde_json::json!({ "x": 1 })
        ));
    }

    #[tokio::test]
    async fn chain_steps_dispatch_through_s1() {
        let node = Node::new(test_config()).unwrap();
        node.register_local_capability("double", Arc::new(FnHandler(|p: Value| Ok(serde_json::json!(p.as_i64().unwrap() * 2)))))
            .await;
        let chain = Chain {
            id: "c1".into(),
            name: "via-s1".into(),
            steps: vec![vsm_capability::Step::new("double", "double", serde_json::json!("context.input"))],
        };
        let execution = node.execute_chain(&chain, serde_json::json!(21)).await;
        assert_eq!(execution.context["double"], 42);
    }

    #[tokio::test]
    async fn crdt_store_roundtrips_through_node() {
        let node = Node::new(test_config()).unwrap();
        node.create_crdt("counter", CrdtKind::GCounter, serde_json::json!({})).unwrap();
        node.update_crdt("counter", CrdtOp::Increment(3)).unwrap();
        assert_eq!(node.crdt_value("counter").unwrap(), CrdtValue::Counter(3));
    }

    #[tokio::test]
    async fn register_capability_reports_variety_gap() {
        let node = Node::new(test_config()).unwrap();
        node.register_capability(Capability {
            id: "local:echo".into(),
            name: "echo".into(),
            kind: CapabilityKind::Operational,
            source: vsm_capability::CapabilitySource::Local,
            schema: serde_json::json!({}),
            metadata: serde_json::json!({}),
        })
        .await
        .unwrap();
        let gap = node.calculate_variety_gap(2).await;
        assert_eq!(gap.available, 1);
        assert_eq!(gap.gap, 1);
    }
}
