//! Join-semilattice trait — the mathematical foundation every CRDT kind
//! in this crate implements.
//!
//! A join-semilattice `(S, ⊔)` satisfies:
//!  - Commutativity: `a ⊔ b = b ⊔ a`
//!  - Associativity: `(a ⊔ b) ⊔ c = a ⊔ (b ⊔ c)`
//!  - Idempotence:   `a ⊔ a = a`
//!
//! These three properties are what let replicas converge regardless of
//! delivery order, duplication, or loss — the "always merge, never fail"
//! guarantee spec'd for this store: mutation and merge never return errors
//! for data reasons, only storage I/O can fail.

/// The core CRDT trait. All state-based CRDTs here implement this.
pub trait Lattice: Clone + PartialEq {
    /// The bottom element (identity for join).
    fn bottom() -> Self;

    /// Join operation (least upper bound). Must be commutative,
    /// associative, and idempotent.
    fn join(&self, other: &Self) -> Self;

    /// Join-assign: `self = self ⊔ other`.
    fn join_assign(&mut self, other: &Self) {
        *self = self.join(other);
    }
}

/// Marker trait for CRDTs that support delta-state replication: instead of
/// shipping the whole state on every mutation, a delta captures just the
/// change, and deltas merge the same way full states do.
pub trait DeltaLattice: Lattice {
    /// The delta representation (often the same shape as `Self`).
    type Delta: Lattice;

    /// Take and clear the locally accumulated delta, if any.
    fn take_delta(&mut self) -> Option<Self::Delta>;

    /// Apply a delta received from a peer.
    fn apply_delta(&mut self, delta: &Self::Delta);
}
