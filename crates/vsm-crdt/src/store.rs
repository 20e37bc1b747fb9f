//! Named CRDT instances over a tiered store, synchronized by delta
//! broadcast and periodic anti-entropy digests (spec §4.3).
//!
//! This crate only models the CRDT bookkeeping: creating instances,
//! applying local mutations, merging remote deltas, and buffering deltas
//! that arrive before their instance is registered locally. Wiring this
//! to an actual bus topic (`crdt:delta`) and a tiered store for durability
//! is the job of the `vsm-sdk` facade crate, which owns both.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vsm_hlc::{Hlc, NodeId};

use crate::error::{CrdtStoreError, Result};
use crate::kind::{CrdtDelta, CrdtInstance, CrdtKind, CrdtOp, CrdtValue};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrdtDescriptor {
    pub id: String,
    pub kind: CrdtKind,
    pub metadata: serde_json::Value,
}

/// A delta ready to be broadcast on the `crdt:delta` topic, tagged with the
/// HLC stamp of the mutation that produced it and the id of its instance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaggedDelta {
    pub crdt_id: String,
    pub hlc: Hlc,
    pub delta: CrdtDelta,
}

pub struct CrdtStore {
    node: NodeId,
    clock: Hlc,
    descriptors: HashMap<String, CrdtDescriptor>,
    instances: HashMap<String, CrdtInstance>,
    /// Deltas for ids not yet registered locally, buffered until a
    /// `crdt_registered` notice for that id arrives.
    pending_for_unknown: HashMap<String, Vec<CrdtDelta>>,
}

impl CrdtStore {
    pub fn new(node: NodeId) -> Self {
        Self {
            clock: Hlc::new(node.clone()),
            node,
            descriptors: HashMap::new(),
            instances: HashMap::new(),
            pending_for_unknown: HashMap::new(),
        }
    }

    pub fn node(&self) -> &NodeId {
        &self.node
    }

    /// `create(id, kind)`.
    pub fn create(
        &mut self,
        id: impl Into<String>,
        kind: CrdtKind,
        metadata: serde_json::Value,
    ) -> Result<CrdtDescriptor> {
        let id = id.into();
        if self.descriptors.contains_key(&id) {
            return Err(CrdtStoreError::AlreadyExists { id });
        }
        let descriptor = CrdtDescriptor {
            id: id.clone(),
            kind,
            metadata,
        };
        self.descriptors.insert(id.clone(), descriptor.clone());
        self.instances
            .insert(id.clone(), CrdtInstance::new(kind, self.node.clone()));

        // Replay any deltas that arrived before this id was registered.
        if let Some(buffered) = self.pending_for_unknown.remove(&id) {
            let instance = self.instances.get_mut(&id).expect("just inserted");
            for delta in buffered {
                if let Err(err) = instance.apply_delta(&delta, &id) {
                    warn!(kind = %err.kind(), cause = %err, crdt_id = %id, "dropping buffered delta after registration");
                }
            }
        }

        debug!(crdt_id = %id, ?kind, "crdt created");
        Ok(descriptor)
    }

    pub fn get(&self, id: &str) -> Result<&CrdtInstance> {
        self.instances
            .get(id)
            .ok_or_else(|| CrdtStoreError::NotFound { id: id.to_string() })
    }

    pub fn value(&self, id: &str) -> Result<CrdtValue> {
        Ok(self.get(id)?.value())
    }

    /// `update(id, op)`: apply a mutation, produce a tagged delta to
    /// broadcast on `crdt:delta` if the mutation changed anything.
    pub fn update(&mut self, id: &str, op: CrdtOp) -> Result<Option<TaggedDelta>> {
        self.clock = self.clock.tick();
        let ts = self.clock.ts;
        let node = self.node.clone();
        let instance = self
            .instances
            .get_mut(id)
            .ok_or_else(|| CrdtStoreError::NotFound { id: id.to_string() })?;
        instance.mutate(&node, op, ts, id)?;

        Ok(instance.take_delta().map(|delta| TaggedDelta {
            crdt_id: id.to_string(),
            hlc: self.clock.clone(),
            delta,
        }))
    }

    /// Apply a delta received from a peer. If the instance isn't
    /// registered locally yet, the delta is buffered keyed by `crdt_id`
    /// until a `crdt_registered` notice arrives for it (spec §4.3).
    pub fn merge_delta(&mut self, tagged: &TaggedDelta) -> Result<()> {
        self.clock = self.clock.recv(&tagged.hlc);
        match self.instances.get_mut(&tagged.crdt_id) {
            Some(instance) => instance.apply_delta(&tagged.delta, &tagged.crdt_id),
            None => {
                self.pending_for_unknown
                    .entry(tagged.crdt_id.clone())
                    .or_default()
                    .push(tagged.delta.clone());
                debug!(crdt_id = %tagged.crdt_id, "buffered delta for unregistered crdt");
                Ok(())
            }
        }
    }

    /// Merge a full state snapshot (e.g. received from a `crdt_state_response`).
    pub fn merge_full(&mut self, id: &str, other: &CrdtInstance) -> Result<()> {
        let instance = self
            .instances
            .get_mut(id)
            .ok_or_else(|| CrdtStoreError::NotFound { id: id.to_string() })?;
        match instance.merge(other) {
            Some(merged) => {
                *instance = merged;
                Ok(())
            }
            None => Err(CrdtStoreError::InvalidOperation {
                id: id.to_string(),
                reason: "kind mismatch on full-state merge".to_string(),
            }),
        }
    }

    pub fn list(&self) -> Vec<CrdtDescriptor> {
        self.descriptors.values().cloned().collect()
    }

    pub fn metadata(&self, id: &str) -> Result<serde_json::Value> {
        self.descriptors
            .get(id)
            .map(|d| d.metadata.clone())
            .ok_or_else(|| CrdtStoreError::NotFound { id: id.to_string() })
    }

    /// Per-instance causal-context digest for anti-entropy (spec §4.3: the
    /// node broadcasts one digest per owned CRDT every anti-entropy
    /// interval so peers can detect staleness).
    pub fn digest(&self, id: &str) -> Result<serde_json::Value> {
        Ok(self.get(id)?.causal_context())
    }

    pub fn digests(&self) -> HashMap<String, serde_json::Value> {
        self.instances
            .iter()
            .map(|(id, inst)| (id.clone(), inst.causal_context()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::CrdtOp;

    fn n(s: &str) -> NodeId {
        NodeId::new(s)
    }

    #[test]
    fn create_rejects_duplicate_id() {
        let mut store = CrdtStore::new(n("node-a"));
        store
            .create("counter", CrdtKind::GCounter, serde_json::json!({}))
            .unwrap();
        let err = store
            .create("counter", CrdtKind::GCounter, serde_json::json!({}))
            .unwrap_err();
        assert_eq!(err.kind(), "already_exists");
    }

    #[test]
    fn get_unknown_id_is_not_found() {
        let store = CrdtStore::new(n("node-a"));
        let err = store.get("missing").unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn update_produces_deliverable_delta_that_converges() {
        let mut a = CrdtStore::new(n("a"));
        a.create("c", CrdtKind::GCounter, serde_json::json!({}))
            .unwrap();
        let tagged = a.update("c", CrdtOp::Increment(5)).unwrap().unwrap();

        let mut b = CrdtStore::new(n("b"));
        b.create("c", CrdtKind::GCounter, serde_json::json!({}))
            .unwrap();
        b.merge_delta(&tagged).unwrap();
        b.merge_delta(&tagged).unwrap(); // duplicate delivery

        assert_eq!(a.value("c").unwrap(), b.value("c").unwrap());
    }

    #[test]
    fn delta_for_unregistered_id_is_buffered_then_replayed() {
        let mut a = CrdtStore::new(n("a"));
        a.create("c", CrdtKind::GCounter, serde_json::json!({}))
            .unwrap();
        let tagged = a.update("c", CrdtOp::Increment(3)).unwrap().unwrap();

        let mut b = CrdtStore::new(n("b"));
        // b hasn't created "c" yet: buffer instead of erroring.
        b.merge_delta(&tagged).unwrap();
        assert!(b.get("c").is_err());

        b.create("c", CrdtKind::GCounter, serde_json::json!({}))
            .unwrap();
        assert_eq!(b.value("c").unwrap(), CrdtValue::Counter(3));
    }

    // Two OR-Set replicas with the same element count but disjoint tags
    // must not produce the same digest, or anti-entropy would wrongly
    // conclude they're already synced.
    #[test]
    fn digest_distinguishes_or_sets_with_equal_cardinality() {
        let mut a = CrdtStore::new(n("a"));
        a.create("s", CrdtKind::OrSet, serde_json::json!({})).unwrap();
        a.update("s", CrdtOp::Add("x".to_string())).unwrap();

        let mut b = CrdtStore::new(n("b"));
        b.create("s", CrdtKind::OrSet, serde_json::json!({})).unwrap();
        b.update("s", CrdtOp::Add("y".to_string())).unwrap();

        let (CrdtValue::Set(a_set), CrdtValue::Set(b_set)) = (a.value("s").unwrap(), b.value("s").unwrap()) else {
            panic!("expected Set values");
        };
        assert_eq!(a_set.len(), b_set.len());
        assert_ne!(a.digest("s").unwrap(), b.digest("s").unwrap());
    }
}
