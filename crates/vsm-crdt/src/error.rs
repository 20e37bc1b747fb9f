//! Error taxonomy for the CRDT context store.
//!
//! Per spec §7, mutation/merge never fail for data reasons — only the
//! store-level bookkeeping (duplicate/unknown ids, kind mismatches) can.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CrdtStoreError {
    #[error("crdt already exists: {id}")]
    AlreadyExists { id: String },

    #[error("crdt not found: {id}")]
    NotFound { id: String },

    #[error("invalid operation on crdt {id}: {reason}")]
    InvalidOperation { id: String, reason: String },
}

impl CrdtStoreError {
    /// Structured `kind` discriminant per spec §7's no-omission requirement.
    pub fn kind(&self) -> &'static str {
        match self {
            CrdtStoreError::AlreadyExists { .. } => "already_exists",
            CrdtStoreError::NotFound { .. } => "not_found",
            CrdtStoreError::InvalidOperation { .. } => "invalid_operation",
        }
    }
}

pub type Result<T> = std::result::Result<T, CrdtStoreError>;
