//! Error taxonomy for the tiered store. Hot and warm are infallible after
//! init (spec §4.2); only cold-tier I/O can fail.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("cold tier I/O error for key {key}: {cause}")]
    ColdIo { key: String, cause: std::io::Error },
}

impl StoreError {
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "not_found",
            StoreError::ColdIo { .. } => "fatal",
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
