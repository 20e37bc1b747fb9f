//! Delta-CRDT context store: four CRDT kinds (`g_counter`, `pn_counter`,
//! `or_set`, `lww_register`) over a join-semilattice core, with delta
//! replication and anti-entropy bookkeeping, as specified in §4.3.
//!
//! Convergence property (spec §8, invariant 1): for any two replicas of
//! the same CRDT kind that have merged the same multiset of deltas, in
//! any order and with any duplication, `value()` is equal. Every kind in
//! this crate is tested against that property directly.

pub mod error;
pub mod g_counter;
pub mod kind;
pub mod lattice;
pub mod lww_register;
pub mod or_set;
pub mod pn_counter;
pub mod store;

pub use error::{CrdtStoreError, Result};
pub use kind::{CrdtDelta, CrdtInstance, CrdtKind, CrdtOp, CrdtValue};
pub use lattice::{DeltaLattice, Lattice};
pub use store::{CrdtDescriptor, CrdtStore, TaggedDelta};
