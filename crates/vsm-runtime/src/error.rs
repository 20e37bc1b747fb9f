//! Error taxonomy for the subsystem runtime (spec §7).

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum RuntimeError {
    #[error("capability not registered: {name}")]
    MissingCapability { name: String },

    #[error("handler for {name} failed: {reason}")]
    HandlerFailed { name: String, reason: String },

    #[error("mailbox overloaded for {actor}")]
    Overloaded { actor: String },

    #[error("actor {actor} failed: {cause}")]
    Fatal { actor: String, cause: String },

    #[error("invalid operation: {reason}")]
    InvalidOperation { reason: String },
}

impl RuntimeError {
    pub fn kind(&self) -> &'static str {
        match self {
            RuntimeError::MissingCapability { .. } => "missing_capability",
            RuntimeError::HandlerFailed { .. } => "handler_failed",
            RuntimeError::Overloaded { .. } => "overloaded",
            RuntimeError::Fatal { .. } => "fatal",
            RuntimeError::InvalidOperation { .. } => "invalid_operation",
        }
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
