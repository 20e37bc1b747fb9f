//! S5 — Policy (spec §4.5). Owns identity and policy, the only
//! subsystem permitted to mutate them, and blends S3/S4 recommendations
//! into strategic decisions. Also the designated algedonic consumer
//! (see `algedonic.rs`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Identity(pub Map<String, Value>);

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Policy {
    pub growth_strategy: GrowthStrategy,
    pub values: Map<String, Value>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrowthStrategy {
    Conservative,
    Balanced,
    Aggressive,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            growth_strategy: GrowthStrategy::Balanced,
            values: Map::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PolicyContext {
    pub crisis: bool,
    pub opportunity: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StrategicDecision {
    pub internal_weight: f64,
    pub external_weight: f64,
    pub blended: Value,
}

pub struct S5Policy {
    identity: Identity,
    policies: Policy,
    decisions: Vec<StrategicDecision>,
}

impl S5Policy {
    pub fn new(policies: Policy) -> Self {
        Self {
            identity: Identity::default(),
            policies,
            decisions: Vec::new(),
        }
    }

    /// `get_policy(context)`: current policy, adjusted by context flags.
    /// `crisis` forces conservative growth; `opportunity` forces
    /// aggressive growth; a context with both set is crisis-first
    /// (caution dominates).
    pub fn get_policy(&self, context: PolicyContext) -> Policy {
        let mut policy = self.policies.clone();
        if context.crisis {
            policy.growth_strategy = GrowthStrategy::Conservative;
        } else if context.opportunity {
            policy.growth_strategy = GrowthStrategy::Aggressive;
        }
        policy
    }

    /// `set_identity(patch)`: merges into identity. `set_identity({})`
    /// followed by `set_identity(patch)` is equivalent to `set_identity(patch)`
    /// alone (spec §8 idempotence law) because an empty patch merges no keys.
    pub fn set_identity(&mut self, patch: Map<String, Value>) {
        for (k, v) in patch {
            self.identity.0.insert(k, v);
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn policies(&self) -> &Policy {
        &self.policies
    }

    /// Only S5 may mutate policy (spec §3 ownership rule).
    pub fn set_policies(&mut self, policies: Policy) {
        self.policies = policies;
    }

    /// `strategic_decision(issue, s3_view, s4_view)`: linearly blends
    /// S3's (internal) and S4's (external) recommendations, with weights
    /// fixed by `policies.growth_strategy` per spec §4.5.
    pub fn strategic_decision(&mut self, _issue: &str, s3_view: Value, s4_view: Value) -> StrategicDecision {
        let (internal_weight, external_weight) = match self.policies.growth_strategy {
            GrowthStrategy::Conservative => (0.7, 0.3),
            GrowthStrategy::Balanced => (0.5, 0.5),
            GrowthStrategy::Aggressive => (0.3, 0.7),
        };
        let blended = serde_json::json!({
            "internal": s3_view,
            "external": s4_view,
            "internal_weight": internal_weight,
            "external_weight": external_weight,
        });
        let decision = StrategicDecision {
            internal_weight,
            external_weight,
            blended,
        };
        self.decisions.push(decision.clone());
        decision
    }

    pub fn decisions(&self) -> &[StrategicDecision] {
        &self.decisions
    }
}
