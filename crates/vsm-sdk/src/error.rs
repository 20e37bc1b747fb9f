//! Top-level error aggregating every lower crate's error type (spec
//! §7). An embedding application only needs to match on this one enum.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Runtime(#[from] vsm_runtime::RuntimeError),

    #[error(transparent)]
    Capability(#[from] vsm_capability::CapabilityError),

    #[error(transparent)]
    Store(#[from] vsm_store::StoreError),

    #[error(transparent)]
    Crdt(#[from] vsm_crdt::CrdtStoreError),

    #[error(transparent)]
    Bus(#[from] vsm_bus::BusError),

    #[error(transparent)]
    Variety(#[from] vsm_variety::VarietyError),
}

impl NodeError {
    pub fn kind(&self) -> &'static str {
        match self {
            NodeError::Runtime(e) => e.kind(),
            NodeError::Capability(e) => e.kind(),
            NodeError::Store(e) => e.kind(),
            NodeError::Crdt(e) => e.kind(),
            NodeError::Bus(e) => e.kind(),
            NodeError::Variety(e) => e.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, NodeError>;
