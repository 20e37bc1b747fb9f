//! High-level SDK for embedding a VSM cybernetic control node: wires
//! together the S1-S5 subsystems, the algedonic channel, the Bus, the
//! Context Store, the Capability Registry/Tool-Chain Engine, and the
//! Variety/Gap Controller behind a single `Node` handle (spec §9).

pub mod error;
pub mod node;

pub use error::{NodeError, Result};
pub use node::{init_tracing, Node, NodeConfig, NodeConfigBuilder};

pub use vsm_bus::{Bus, Channel, Envelope, Payload};
pub use vsm_capability::{
    Capability, CapabilityKind, CapabilitySource, Chain, Execution, MatchReport, Priority, Requirement, ScoredMatch,
    Step, ToolChainEngine, VarietyGap,
};
pub use vsm_crdt::{CrdtDescriptor, CrdtKind, CrdtOp, CrdtValue, TaggedDelta};
pub use vsm_hlc::{Hlc, NodeId};
pub use vsm_runtime::{
    AlgedonicSignal, Coordination, FnHandler, Operation, OperationOutcome, OperationResult, Policy, PolicyContext,
};
pub use vsm_store::{StoreConfig, StoreConfigBuilder, StoreStats};
pub use vsm_variety::{Action, VarietyConfig, VarietyMetric};
