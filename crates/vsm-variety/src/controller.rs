//! Variety/Gap Controller (spec §4.7): a periodic loop that measures
//! operational variety against environmental variety, decides
//! autonomous scaling/acquisition/algedonic actions, and keeps a
//! bounded log of what it decided. Grounded on the teacher's
//! `mdcs-sdk::sync::SyncManager` shape: a config-driven
//! `tokio::time::interval` loop, generalized from CRDT sync to variety
//! accounting.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;
use vsm_bus::{Bus, Channel, Envelope};
use vsm_capability::{Capability, CapabilityRegistry, Requirement};
use vsm_hlc::{Hlc, NodeId};

use crate::error::VarietyError;
use crate::types::{Action, VarietyConfig, VarietyMetric};

/// Where the controller gets its raw inputs from each tick. A node
/// wires this to live registry/demand state; tests use a fixed source.
/// Each probe is fallible — a source backed by a remote registry or an
/// MCP server can legitimately be unreachable for a tick.
#[async_trait]
pub trait VarietySource: Send + Sync {
    async fn operational_variety(&self) -> crate::error::Result<usize>;
    async fn environmental_variety(&self) -> crate::error::Result<usize>;
    async fn state_type_distribution(&self) -> crate::error::Result<HashMap<String, usize>>;
}

/// `operational_variety`: the count of distinct capability kinds this
/// node can currently serve (spec §4.7: "a function of registered
/// capability kinds").
pub fn operational_variety_from_registry(registry: &CapabilityRegistry) -> usize {
    let capabilities: Vec<Capability> = registry.list_capabilities(None);
    capabilities
        .iter()
        .map(|c| c.kind)
        .collect::<std::collections::HashSet<_>>()
        .len()
}

/// `environmental_variety`: the count of distinct kinds named by
/// outstanding/observed demand (spec §4.7: "a function of
/// externally-observed demand").
pub fn environmental_variety_from_requirements(requirements: &[Requirement]) -> usize {
    requirements
        .iter()
        .map(|r| r.kind)
        .collect::<std::collections::HashSet<_>>()
        .len()
}

/// Shannon entropy (base 2) over a distribution of counts.
pub fn shannon_entropy(distribution: &HashMap<String, usize>) -> f64 {
    let total: usize = distribution.values().sum();
    if total == 0 {
        return 0.0;
    }
    distribution
        .values()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / total as f64;
            -p * p.log2()
        })
        .sum()
}

pub fn compute_metric(
    operational: usize,
    environmental: usize,
    distribution: &HashMap<String, usize>,
    at: u64,
) -> VarietyMetric {
    let gap = environmental as i64 - operational as i64;
    let gap_ratio = (environmental as f64 - operational as f64) / (operational.max(1) as f64);
    VarietyMetric {
        operational,
        environmental,
        gap,
        gap_ratio,
        entropy: shannon_entropy(distribution),
        at,
    }
}

pub struct VarietyController {
    node_id: NodeId,
    hlc: Hlc,
    config: VarietyConfig,
    action_log: VecDeque<(u64, Action)>,
    last_metric: Option<VarietyMetric>,
}

impl VarietyController {
    pub fn new(node_id: impl Into<NodeId>, config: VarietyConfig) -> Self {
        let node_id = node_id.into();
        Self {
            hlc: Hlc::new(node_id.clone()),
            node_id,
            config,
            action_log: VecDeque::new(),
            last_metric: None,
        }
    }

    pub fn config(&self) -> &VarietyConfig {
        &self.config
    }

    pub fn last_metric(&self) -> Option<&VarietyMetric> {
        self.last_metric.as_ref()
    }

    pub fn action_log(&self) -> impl Iterator<Item = &(u64, Action)> {
        self.action_log.iter()
    }

    /// Decides autonomous actions for one metric snapshot, per the
    /// spec's threshold table, and appends each decision to the bounded
    /// log. `autonomous_mode = false` still records the metric (via
    /// `last_metric`) but decides no actions — the operator has taken
    /// manual control.
    pub fn evaluate(&mut self, metric: VarietyMetric) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.config.autonomous_mode {
            if metric.gap_ratio > self.config.critical_gap {
                actions.push(Action::ScaleWorkerPool {
                    step: self.config.scale_step_critical,
                });
                actions.push(Action::TriggerAcquisition);
                actions.push(Action::PublishAlgedonic {
                    intensity: metric.gap_ratio.clamp(0.0, 1.0),
                });
            } else if metric.gap_ratio > self.config.high_gap {
                actions.push(Action::ScaleWorkerPool {
                    step: self.config.scale_step_high,
                });
                actions.push(Action::ScheduleEvaluation);
            }
            if metric.entropy > self.config.entropy_threshold {
                actions.push(Action::RebalanceSpecializations);
            }
        }

        for action in &actions {
            self.push_action_log(metric.at, action.clone());
        }
        info!(
            gap_ratio = metric.gap_ratio,
            entropy = metric.entropy,
            actions = actions.len(),
            "variety evaluation complete"
        );
        self.last_metric = Some(metric);
        actions
    }

    fn push_action_log(&mut self, at: u64, action: Action) {
        self.action_log.push_back((at, action));
        while self.action_log.len() > self.config.action_log_bound {
            self.action_log.pop_front();
        }
    }

    /// Publishes any `PublishAlgedonic` actions onto the bus's
    /// algedonic channel; other actions are left for the embedding node
    /// to act on (scale the worker pool, trigger acquisition, etc) since
    /// those cross into `vsm-runtime`/`vsm-capability` territory this
    /// crate does not own.
    pub fn publish_algedonic_actions(&mut self, bus: &Bus, actions: &[Action]) {
        for action in actions {
            if let Action::PublishAlgedonic { intensity } = action {
                self.hlc = self.hlc.tick();
                let envelope = Envelope {
                    sender: self.node_id.to_string(),
                    correlation_id: ulid::Ulid::new().to_string(),
                    hlc: self.hlc.clone(),
                    channel: Channel::Algedonic,
                    routing_key: "variety.gap".to_string(),
                    priority: Channel::Algedonic.default_priority(),
                    ttl_ms: Some(60_000),
                    payload: vsm_bus::Payload::Algedonic(serde_json::json!({
                        "source": "variety_controller",
                        "intensity": intensity,
                    })),
                };
                let _ = bus.publish(envelope);
            }
        }
    }

    /// Runs the periodic loop: tick, pull a fresh snapshot from
    /// `source`, evaluate, publish algedonic actions, repeat. Never
    /// returns under normal operation; intended to be the body of a
    /// supervised task (`vsm_runtime::Supervisor::supervise`), whose
    /// restart policy doesn't care about the error's shape, so this
    /// stringifies whatever `run_fallible` returns.
    pub async fn run<S: VarietySource>(mut self, source: Arc<S>, bus: Arc<Bus>) -> Result<(), String> {
        self.run_fallible(source, bus).await.map_err(|e| e.to_string())
    }

    /// Same loop as `run`, but surfaces the controller's own typed
    /// error instead of a stringified one, for callers that want to
    /// match on `VarietyError::kind()` (e.g. via `NodeError::Variety`).
    async fn run_fallible<S: VarietySource>(&mut self, source: Arc<S>, bus: Arc<Bus>) -> crate::error::Result<()> {
        if self.config.interval_ms == 0 {
            return Err(VarietyError::InvalidConfig("interval_ms must be greater than zero".to_string()));
        }
        let mut ticker = tokio::time::interval(Duration::from_millis(self.config.interval_ms));
        loop {
            ticker.tick().await;
            let operational = source.operational_variety().await?;
            let environmental = source.environmental_variety().await?;
            let distribution = source.state_type_distribution().await?;
            self.hlc = self.hlc.tick();
            let at = self.hlc.ts;
            let metric = compute_metric(operational, environmental, &distribution, at);
            let actions = self.evaluate(metric);
            self.publish_algedonic_actions(&bus, &actions);
        }
    }
}
