//! Observed-Remove Set (OR-Set / add-wins set).
//!
//! Each `add` mints a fresh tag `(node_id, monotonic_ts)`. `remove` moves
//! every tag currently observed for that element to the tombstone set.
//! `merge` takes the union of live tags and the union of tombstones; an
//! element is present iff its live tags minus tombstones is non-empty.
//! Concurrent add/remove of the same element resolves add-wins, because a
//! concurrent add mints a tag the remover could not have observed.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use vsm_hlc::NodeId;

use crate::lattice::{DeltaLattice, Lattice};

/// A unique per-add tag: `(node_id, monotonic_ts)`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub node: NodeId,
    pub monotonic_ts: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrSet<T: Ord + Clone> {
    live: BTreeMap<T, BTreeSet<Tag>>,
    tombstones: BTreeSet<Tag>,
    #[serde(skip)]
    pending: Option<OrSetDelta<T>>,
    local_clock: u64,
    node: NodeId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OrSetDelta<T: Ord + Clone> {
    pub additions: BTreeMap<T, BTreeSet<Tag>>,
    pub removals: BTreeSet<Tag>,
}

impl<T: Ord + Clone> OrSet<T> {
    pub fn new(node: NodeId) -> Self {
        Self {
            live: BTreeMap::new(),
            tombstones: BTreeSet::new(),
            pending: None,
            local_clock: 0,
            node,
        }
    }

    fn next_tag(&mut self) -> Tag {
        self.local_clock += 1;
        Tag {
            node: self.node.clone(),
            monotonic_ts: self.local_clock,
        }
    }

    /// `add(e)`: mint a fresh tag and record it against `e`.
    pub fn add(&mut self, value: T) {
        let tag = self.next_tag();
        self.live
            .entry(value.clone())
            .or_default()
            .insert(tag.clone());

        let delta = self.pending.get_or_insert_with(OrSetDelta::default);
        delta.additions.entry(value).or_default().insert(tag);
    }

    /// `remove(e)`: move every currently-observed tag for `e` to tombstones.
    pub fn remove(&mut self, value: &T) {
        if let Some(tags) = self.live.remove(value) {
            for tag in &tags {
                self.tombstones.insert(tag.clone());
            }
            let delta = self.pending.get_or_insert_with(OrSetDelta::default);
            delta.removals.extend(tags);
        }
    }

    pub fn contains(&self, value: &T) -> bool {
        self.live.get(value).is_some_and(|tags| !tags.is_empty())
    }

    pub fn value(&self) -> BTreeSet<T> {
        self.live.keys().cloned().collect()
    }

    pub fn causal_context(&self) -> BTreeSet<Tag> {
        self.live
            .values()
            .flatten()
            .cloned()
            .chain(self.tombstones.iter().cloned())
            .collect()
    }
}

impl<T: Ord + Clone> Lattice for OrSet<T> {
    fn bottom() -> Self {
        Self::new(NodeId::new(""))
    }

    fn join(&self, other: &Self) -> Self {
        let tombstones: BTreeSet<Tag> = self
            .tombstones
            .union(&other.tombstones)
            .cloned()
            .collect();

        let mut live = BTreeMap::new();
        let keys: BTreeSet<&T> = self.live.keys().chain(other.live.keys()).collect();
        for key in keys {
            let mut tags: BTreeSet<Tag> = BTreeSet::new();
            if let Some(t) = self.live.get(key) {
                tags.extend(t.iter().cloned());
            }
            if let Some(t) = other.live.get(key) {
                tags.extend(t.iter().cloned());
            }
            tags.retain(|t| !tombstones.contains(t));
            if !tags.is_empty() {
                live.insert(key.clone(), tags);
            }
        }

        Self {
            live,
            tombstones,
            pending: None,
            local_clock: self.local_clock.max(other.local_clock),
            node: self.node.clone(),
        }
    }
}

impl<T: Ord + Clone> Lattice for OrSetDelta<T> {
    fn bottom() -> Self {
        Self::default()
    }

    fn join(&self, other: &Self) -> Self {
        let mut additions = self.additions.clone();
        for (k, v) in &other.additions {
            additions.entry(k.clone()).or_default().extend(v.clone());
        }
        Self {
            additions,
            removals: self.removals.union(&other.removals).cloned().collect(),
        }
    }
}

impl<T: Ord + Clone> DeltaLattice for OrSet<T> {
    type Delta = OrSetDelta<T>;

    fn take_delta(&mut self) -> Option<Self::Delta> {
        self.pending.take()
    }

    fn apply_delta(&mut self, delta: &Self::Delta) {
        self.tombstones.extend(delta.removals.iter().cloned());

        for (value, tags) in &delta.additions {
            let entry = self.live.entry(value.clone()).or_default();
            for tag in tags {
                if !self.tombstones.contains(tag) {
                    entry.insert(tag.clone());
                }
            }
        }
        self.live.retain(|_, tags| !tags.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(s: &str) -> NodeId {
        NodeId::new(s)
    }

    // Scenario S-1 from the spec: A adds "alice" and "bob"; B receives both
    // deltas then removes "alice"; A receives B's remove delta. Expected:
    // both converge on {"bob"}.
    #[test]
    fn scenario_s1_or_set_convergence() {
        let mut a: OrSet<String> = OrSet::new(n("A"));
        a.add("alice".to_string());
        a.add("bob".to_string());
        let add_alice_delta = {
            // replay both additions as one combined delta for B
            let mut d = OrSetDelta::default();
            d.additions = a
                .live
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            d
        };

        let mut b: OrSet<String> = OrSet::new(n("B"));
        b.apply_delta(&add_alice_delta);
        assert!(b.contains(&"alice".to_string()));
        assert!(b.contains(&"bob".to_string()));

        b.remove(&"alice".to_string());
        let remove_delta = b.take_delta().unwrap();

        a.apply_delta(&remove_delta);

        assert_eq!(
            a.value(),
            BTreeSet::from(["bob".to_string()])
        );
        assert_eq!(
            b.value(),
            BTreeSet::from(["bob".to_string()])
        );
    }

    // Invariant 3 / observed-remove semantics: add(e); remove(e); merge with
    // a delta that only observed the add still yields e not in value.
    #[test]
    fn observed_remove_beats_stale_add_only_delta() {
        let mut a: OrSet<String> = OrSet::new(n("A"));
        a.add("x".to_string());
        let add_only_delta = a.take_delta().unwrap();

        a.remove(&"x".to_string());

        // A peer that only ever observed the add, replaying it again later,
        // must not resurrect "x" once the tombstone is present.
        a.apply_delta(&add_only_delta);
        assert!(!a.contains(&"x".to_string()));
    }

    #[test]
    fn concurrent_add_and_remove_is_add_wins() {
        let mut a: OrSet<String> = OrSet::new(n("A"));
        a.add("x".to_string());
        let snapshot = a.clone();

        // B observed the pre-remove state and adds again concurrently.
        let mut b = snapshot;
        b.add("x".to_string());

        a.remove(&"x".to_string());

        let merged = a.join(&b);
        // B's concurrent add used a tag A's remove never observed, so it
        // survives: add-wins.
        assert!(merged.contains(&"x".to_string()));
    }

    #[test]
    fn merge_is_commutative_idempotent() {
        let mut a: OrSet<String> = OrSet::new(n("A"));
        a.add("x".to_string());
        let mut b: OrSet<String> = OrSet::new(n("B"));
        b.add("y".to_string());

        assert_eq!(a.join(&b).value(), b.join(&a).value());
        assert_eq!(a.join(&a).value(), a.value());
    }
}
