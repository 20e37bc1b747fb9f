//! Bus error taxonomy (spec §7).

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// An algedonic message could not be queued anywhere: treated as
    /// fatal for the whole process per spec §4.4.
    #[error("algedonic message for {subscriber} could not be queued: {reason}")]
    AlgedonicOverflow { subscriber: String, reason: String },

    #[error("unknown subscriber: {0}")]
    UnknownSubscriber(String),
}

impl BusError {
    pub fn kind(&self) -> &'static str {
        match self {
            BusError::AlgedonicOverflow { .. } => "fatal",
            BusError::UnknownSubscriber(_) => "not_found",
        }
    }
}

pub type Result<T> = std::result::Result<T, BusError>;
