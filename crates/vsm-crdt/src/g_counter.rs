//! Grow-only counter (G-Counter) — the building block `pn_counter` is made
//! of. State is `node_id -> non-negative int`; `merge` is pointwise max;
//! `value` is the sum of all entries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use vsm_hlc::NodeId;

use crate::lattice::{DeltaLattice, Lattice};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GCounter {
    counts: BTreeMap<NodeId, u64>,
    #[serde(skip)]
    pending: Option<GCounterDelta>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GCounterDelta {
    pub counts: BTreeMap<NodeId, u64>,
}

impl GCounter {
    pub fn new() -> Self {
        Self {
            counts: BTreeMap::new(),
            pending: None,
        }
    }

    /// `increment(v>0)`: `state[self] += v`; delta is `{self -> state[self]}`.
    pub fn increment(&mut self, node: &NodeId, v: u64) {
        assert!(v > 0, "g_counter increment must be positive");
        let entry = self.counts.entry(node.clone()).or_insert(0);
        *entry += v;
        self.pending
            .get_or_insert_with(Default::default)
            .counts
            .insert(node.clone(), *entry);
    }

    pub fn value(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn count_for(&self, node: &NodeId) -> u64 {
        self.counts.get(node).copied().unwrap_or(0)
    }

    pub fn causal_context(&self) -> BTreeMap<NodeId, u64> {
        self.counts.clone()
    }
}

impl Default for GCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl Lattice for GCounter {
    fn bottom() -> Self {
        Self::new()
    }

    fn join(&self, other: &Self) -> Self {
        let mut merged = self.counts.clone();
        for (node, count) in &other.counts {
            let entry = merged.entry(node.clone()).or_insert(0);
            *entry = (*entry).max(*count);
        }
        Self {
            counts: merged,
            pending: None,
        }
    }
}

impl Lattice for GCounterDelta {
    fn bottom() -> Self {
        Self::default()
    }

    fn join(&self, other: &Self) -> Self {
        let mut counts = self.counts.clone();
        for (node, count) in &other.counts {
            let entry = counts.entry(node.clone()).or_insert(0);
            *entry = (*entry).max(*count);
        }
        Self { counts }
    }
}

impl DeltaLattice for GCounter {
    type Delta = GCounterDelta;

    fn take_delta(&mut self) -> Option<Self::Delta> {
        self.pending.take()
    }

    fn apply_delta(&mut self, delta: &Self::Delta) {
        for (node, count) in &delta.counts {
            let entry = self.counts.entry(node.clone()).or_insert(0);
            *entry = (*entry).max(*count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(s: &str) -> NodeId {
        NodeId::new(s)
    }

    #[test]
    fn value_is_sum_of_entries() {
        let mut c = GCounter::new();
        c.increment(&n("a"), 3);
        c.increment(&n("b"), 4);
        assert_eq!(c.value(), 7);
    }

    #[test]
    fn value_monotone_non_decreasing() {
        let mut c = GCounter::new();
        let mut last = 0;
        for i in 1..10 {
            c.increment(&n("a"), i);
            assert!(c.value() >= last);
            last = c.value();
        }
    }

    #[test]
    fn merge_is_pointwise_max() {
        let mut a = GCounter::new();
        a.increment(&n("a"), 5);
        let mut b = GCounter::new();
        b.increment(&n("a"), 3);
        b.increment(&n("b"), 2);
        let merged = a.join(&b);
        assert_eq!(merged.count_for(&n("a")), 5);
        assert_eq!(merged.count_for(&n("b")), 2);
        assert_eq!(merged.value(), 7);
    }

    #[test]
    fn join_is_idempotent() {
        let mut a = GCounter::new();
        a.increment(&n("a"), 5);
        let joined = a.join(&a);
        assert_eq!(joined, a);
    }

    #[test]
    fn delta_replay_converges_same_as_full_merge() {
        let mut a = GCounter::new();
        a.increment(&n("a"), 3);
        let delta = a.take_delta().unwrap();

        let mut b = GCounter::new();
        b.apply_delta(&delta);
        b.apply_delta(&delta); // duplicate delivery: still converges

        assert_eq!(a.value(), b.value());
    }
}
