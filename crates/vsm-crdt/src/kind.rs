//! Dynamic dispatch over the four CRDT kinds this store supports, so the
//! store can hold named, heterogeneous instances behind one enum rather
//! than a trait object (every variant's `Delta` type differs, which rules
//! out a plain `dyn DeltaLattice`).

use serde::{Deserialize, Serialize};

use crate::error::CrdtStoreError;
use crate::g_counter::{GCounter, GCounterDelta};
use crate::lattice::{DeltaLattice, Lattice};
use crate::lww_register::LwwRegister;
use crate::or_set::{OrSet, OrSetDelta};
use crate::pn_counter::{PnCounter, PnCounterDelta};
use vsm_hlc::NodeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrdtKind {
    GCounter,
    PnCounter,
    OrSet,
    LwwRegister,
}

/// Operations a caller can apply to a named CRDT instance through the
/// store. Values for `or_set`/`lww_register` are opaque JSON-serialized
/// strings so the store itself stays generic over application payloads.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum CrdtOp {
    Increment(u64),
    Decrement(u64),
    Add(String),
    Remove(String),
    Set(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CrdtValue {
    Counter(i64),
    Set(std::collections::BTreeSet<String>),
    Register(Option<String>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CrdtInstance {
    GCounter(GCounter),
    PnCounter(PnCounter),
    OrSet(OrSet<String>),
    LwwRegister(LwwRegister<String>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CrdtDelta {
    GCounter(GCounterDelta),
    PnCounter(PnCounterDelta),
    OrSet(OrSetDelta<String>),
    LwwRegister(LwwRegister<String>),
}

impl CrdtInstance {
    pub fn new(kind: CrdtKind, node: NodeId) -> Self {
        match kind {
            CrdtKind::GCounter => CrdtInstance::GCounter(GCounter::new()),
            CrdtKind::PnCounter => CrdtInstance::PnCounter(PnCounter::new()),
            CrdtKind::OrSet => CrdtInstance::OrSet(OrSet::new(node)),
            CrdtKind::LwwRegister => CrdtInstance::LwwRegister(LwwRegister::new(node)),
        }
    }

    pub fn kind(&self) -> CrdtKind {
        match self {
            CrdtInstance::GCounter(_) => CrdtKind::GCounter,
            CrdtInstance::PnCounter(_) => CrdtKind::PnCounter,
            CrdtInstance::OrSet(_) => CrdtKind::OrSet,
            CrdtInstance::LwwRegister(_) => CrdtKind::LwwRegister,
        }
    }

    /// Apply a typed mutation, given the local node id for stamping
    /// counter increments. Mutations never fail for data reasons — an
    /// operation that doesn't fit the instance's kind is the caller's
    /// bug, reported as `invalid_operation`.
    pub fn mutate(
        &mut self,
        node: &NodeId,
        op: CrdtOp,
        ts: u64,
        id: &str,
    ) -> Result<(), CrdtStoreError> {
        match (self, op) {
            (CrdtInstance::GCounter(c), CrdtOp::Increment(v)) if v > 0 => {
                c.increment(node, v);
                Ok(())
            }
            (CrdtInstance::PnCounter(c), CrdtOp::Increment(v)) if v > 0 => {
                c.increment(node, v);
                Ok(())
            }
            (CrdtInstance::PnCounter(c), CrdtOp::Decrement(v)) if v > 0 => {
                c.decrement(node, v);
                Ok(())
            }
            (CrdtInstance::OrSet(s), CrdtOp::Add(e)) => {
                s.add(e);
                Ok(())
            }
            (CrdtInstance::OrSet(s), CrdtOp::Remove(e)) => {
                s.remove(&e);
                Ok(())
            }
            (CrdtInstance::LwwRegister(r), CrdtOp::Set(v)) => {
                r.set(v, ts);
                Ok(())
            }
            (instance, op) => Err(CrdtStoreError::InvalidOperation {
                id: id.to_string(),
                reason: format!("{:?} does not accept {:?}", instance.kind(), op),
            }),
        }
    }

    pub fn take_delta(&mut self) -> Option<CrdtDelta> {
        match self {
            CrdtInstance::GCounter(c) => c.take_delta().map(CrdtDelta::GCounter),
            CrdtInstance::PnCounter(c) => c.take_delta().map(CrdtDelta::PnCounter),
            CrdtInstance::OrSet(s) => s.take_delta().map(CrdtDelta::OrSet),
            CrdtInstance::LwwRegister(r) => r.take_delta().map(CrdtDelta::LwwRegister),
        }
    }

    pub fn apply_delta(&mut self, delta: &CrdtDelta, id: &str) -> Result<(), CrdtStoreError> {
        match (self, delta) {
            (CrdtInstance::GCounter(c), CrdtDelta::GCounter(d)) => {
                c.apply_delta(d);
                Ok(())
            }
            (CrdtInstance::PnCounter(c), CrdtDelta::PnCounter(d)) => {
                c.apply_delta(d);
                Ok(())
            }
            (CrdtInstance::OrSet(s), CrdtDelta::OrSet(d)) => {
                s.apply_delta(d);
                Ok(())
            }
            (CrdtInstance::LwwRegister(r), CrdtDelta::LwwRegister(d)) => {
                r.apply_delta(d);
                Ok(())
            }
            (instance, delta) => Err(CrdtStoreError::InvalidOperation {
                id: id.to_string(),
                reason: format!(
                    "delta kind mismatch: instance is {:?}, delta is {:?}",
                    instance.kind(),
                    delta
                ),
            }),
        }
    }

    pub fn merge(&self, other: &Self) -> Option<Self> {
        match (self, other) {
            (CrdtInstance::GCounter(a), CrdtInstance::GCounter(b)) => {
                Some(CrdtInstance::GCounter(a.join(b)))
            }
            (CrdtInstance::PnCounter(a), CrdtInstance::PnCounter(b)) => {
                Some(CrdtInstance::PnCounter(a.join(b)))
            }
            (CrdtInstance::OrSet(a), CrdtInstance::OrSet(b)) => {
                Some(CrdtInstance::OrSet(a.join(b)))
            }
            (CrdtInstance::LwwRegister(a), CrdtInstance::LwwRegister(b)) => {
                Some(CrdtInstance::LwwRegister(a.join(b)))
            }
            _ => None,
        }
    }

    pub fn value(&self) -> CrdtValue {
        match self {
            CrdtInstance::GCounter(c) => CrdtValue::Counter(c.value() as i64),
            CrdtInstance::PnCounter(c) => CrdtValue::Counter(c.value()),
            CrdtInstance::OrSet(s) => CrdtValue::Set(s.value()),
            CrdtInstance::LwwRegister(r) => CrdtValue::Register(r.value().cloned()),
        }
    }

    /// What this replica has observed, used to decide whether a peer is
    /// stale during anti-entropy (spec §4.3). This is the full causal
    /// context — a version vector or tag set, never an aggregate or a
    /// count — since two replicas can agree on an aggregate `value()`
    /// while having observed different updates.
    pub fn causal_context(&self) -> serde_json::Value {
        match self {
            CrdtInstance::GCounter(c) => serde_json::json!(c.causal_context()),
            CrdtInstance::PnCounter(c) => serde_json::json!(c.causal_context()),
            CrdtInstance::OrSet(s) => serde_json::json!(s.causal_context()),
            CrdtInstance::LwwRegister(r) => serde_json::json!({
                "ts": r.ts(),
                "node": r.node().to_string(),
            }),
        }
    }
}
