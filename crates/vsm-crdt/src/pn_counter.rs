//! Positive-Negative counter (PN-Counter): two G-Counters, `P` for
//! increments and `N` for decrements; `value = value(P) - value(N)`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use vsm_hlc::NodeId;

use crate::g_counter::{GCounter, GCounterDelta};
use crate::lattice::{DeltaLattice, Lattice};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PnCounter {
    p: GCounter,
    n: GCounter,
}

/// Full causal context of a `PnCounter`: the per-node version vector
/// each inner `GCounter` has observed. Two replicas with equal
/// `value()` can still differ here — this is what anti-entropy
/// staleness detection must compare, not the aggregate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PnCounterContext {
    pub p: BTreeMap<NodeId, u64>,
    pub n: BTreeMap<NodeId, u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PnCounterDelta {
    pub p: GCounterDelta,
    pub n: GCounterDelta,
}

impl PnCounter {
    pub fn new() -> Self {
        Self {
            p: GCounter::new(),
            n: GCounter::new(),
        }
    }

    pub fn increment(&mut self, node: &NodeId, v: u64) {
        self.p.increment(node, v);
    }

    pub fn decrement(&mut self, node: &NodeId, v: u64) {
        self.n.increment(node, v);
    }

    pub fn value(&self) -> i64 {
        self.p.value() as i64 - self.n.value() as i64
    }

    pub fn causal_context(&self) -> PnCounterContext {
        PnCounterContext {
            p: self.p.causal_context(),
            n: self.n.causal_context(),
        }
    }
}

impl Default for PnCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl Lattice for PnCounter {
    fn bottom() -> Self {
        Self::new()
    }

    fn join(&self, other: &Self) -> Self {
        Self {
            p: self.p.join(&other.p),
            n: self.n.join(&other.n),
        }
    }
}

impl Lattice for PnCounterDelta {
    fn bottom() -> Self {
        Self::default()
    }

    fn join(&self, other: &Self) -> Self {
        Self {
            p: self.p.join(&other.p),
            n: self.n.join(&other.n),
        }
    }
}

impl DeltaLattice for PnCounter {
    type Delta = PnCounterDelta;

    fn take_delta(&mut self) -> Option<Self::Delta> {
        let p = self.p.take_delta();
        let n = self.n.take_delta();
        if p.is_none() && n.is_none() {
            return None;
        }
        Some(PnCounterDelta {
            p: p.unwrap_or_default(),
            n: n.unwrap_or_default(),
        })
    }

    fn apply_delta(&mut self, delta: &Self::Delta) {
        self.p.apply_delta(&delta.p);
        self.n.apply_delta(&delta.n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(s: &str) -> NodeId {
        NodeId::new(s)
    }

    #[test]
    fn increment_and_decrement_arithmetic() {
        let mut c = PnCounter::new();
        c.increment(&n("a"), 10);
        c.decrement(&n("a"), 3);
        assert_eq!(c.value(), 7);
    }

    // Scenario S-2 from the spec: two replicas each increment(10); one also
    // decrement(3). After full delta exchange, value = 17 on both.
    #[test]
    fn scenario_s2_pncounter_arithmetic_across_nodes() {
        let mut r1 = PnCounter::new();
        r1.increment(&n("r1"), 10);
        r1.decrement(&n("r1"), 3);

        let mut r2 = PnCounter::new();
        r2.increment(&n("r2"), 10);

        let merged1 = r1.join(&r2);
        let merged2 = r2.join(&r1);

        assert_eq!(merged1.value(), 17);
        assert_eq!(merged2.value(), 17);
        assert_eq!(merged1.value(), merged2.value());
    }

    // Two replicas can agree on `value()` while having observed entirely
    // different increments/decrements; their causal context must still
    // differ so anti-entropy doesn't mistake them for synced.
    #[test]
    fn causal_context_distinguishes_equal_value_replicas() {
        let mut a = PnCounter::new();
        a.increment(&n("a"), 10);

        let mut b = PnCounter::new();
        b.increment(&n("b"), 15);
        b.decrement(&n("b"), 5);

        assert_eq!(a.value(), b.value());
        assert_ne!(a.causal_context(), b.causal_context());
    }

    #[test]
    fn join_is_commutative_and_idempotent() {
        let mut a = PnCounter::new();
        a.increment(&n("a"), 5);
        let mut b = PnCounter::new();
        b.decrement(&n("b"), 2);

        assert_eq!(a.join(&b).value(), b.join(&a).value());
        assert_eq!(a.join(&a), a);
    }
}
