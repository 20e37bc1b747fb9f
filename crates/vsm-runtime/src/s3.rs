//! S3 — Control (spec §4.5). Allocates resources proportionally to
//! demand, weighted by policy, and audits S1 units for compliance and
//! efficiency.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::types::Operation;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default)]
pub struct ResourcePool {
    pub computational: f64,
    pub memory: f64,
    pub network: f64,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default)]
pub struct ResourceDemand {
    pub computational: f64,
    pub memory: f64,
    pub network: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditRecord {
    pub unit: String,
    pub compliance: f64,
    pub efficiency: f64,
    pub at: u64,
}

pub struct S3Control {
    resources: ResourcePool,
    allocations: Vec<ResourcePool>,
    audit_results: VecDeque<AuditRecord>,
    bound: usize,
}

impl S3Control {
    pub fn new(resources: ResourcePool, bound: usize) -> Self {
        Self {
            resources,
            allocations: Vec::new(),
            audit_results: VecDeque::new(),
            bound,
        }
    }

    pub fn resources(&self) -> ResourcePool {
        self.resources
    }

    /// `optimize(context, policy, intelligence)`: per-resource allocation
    /// proportional to demand share, weighted by a policy multiplier.
    /// Returns an `operations` list S2/S1 can execute to apply it.
    pub fn optimize(
        &mut self,
        demand: ResourceDemand,
        policy_weight: f64,
        intelligence_weight: f64,
    ) -> Vec<Operation> {
        let total_demand = (demand.computational + demand.memory + demand.network).max(f64::EPSILON);
        // Blended weight, normalized so policy==intelligence==1.0 is neutral.
        let scale = (policy_weight + intelligence_weight) / 2.0;
        let allocation = ResourcePool {
            computational: self.resources.computational * (demand.computational / total_demand) * scale,
            memory: self.resources.memory * (demand.memory / total_demand) * scale,
            network: self.resources.network * (demand.network / total_demand) * scale,
        };
        self.allocations.push(allocation);

        vec![
            Operation {
                capability: "s3.allocate.computational".into(),
                params: serde_json::json!({ "amount": allocation.computational }),
                correlation_id: format!("s3-alloc-{}", self.allocations.len()),
            },
            Operation {
                capability: "s3.allocate.memory".into(),
                params: serde_json::json!({ "amount": allocation.memory }),
                correlation_id: format!("s3-alloc-{}", self.allocations.len()),
            },
            Operation {
                capability: "s3.allocate.network".into(),
                params: serde_json::json!({ "amount": allocation.network }),
                correlation_id: format!("s3-alloc-{}", self.allocations.len()),
            },
        ]
    }

    /// `audit(unit)`: compliance+efficiency record, appended to
    /// `audit_results`. The actual scoring algorithm is pluggable; this
    /// returns a conservative baseline record a richer S3 implementation
    /// would replace.
    pub fn audit(&mut self, unit: impl Into<String>, compliance: f64, efficiency: f64, at: u64) -> AuditRecord {
        let record = AuditRecord {
            unit: unit.into(),
            compliance,
            efficiency,
            at,
        };
        self.audit_results.push_back(record.clone());
        if self.audit_results.len() > self.bound {
            self.audit_results.pop_front();
        }
        record
    }

    pub fn allocations(&self) -> &[ResourcePool] {
        &self.allocations
    }

    pub fn audit_results(&self) -> &VecDeque<AuditRecord> {
        &self.audit_results
    }
}
