//! Error taxonomy for the registry, MCP client view and tool-chain
//! engine (spec §7).

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum CapabilityError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("validation failed for field {field}: {reason}")]
    ValidationFailed { field: String, reason: String },

    #[error("server unavailable: {name}")]
    ServerUnavailable { name: String },

    #[error("operation timed out")]
    Timeout,

    #[error("transient transport error: {kind}")]
    TransientTransport { kind: String },

    #[error("overloaded")]
    Overloaded,
}

impl CapabilityError {
    pub fn kind(&self) -> &'static str {
        match self {
            CapabilityError::NotFound(_) => "not_found",
            CapabilityError::AlreadyExists(_) => "already_exists",
            CapabilityError::InvalidOperation(_) => "invalid_operation",
            CapabilityError::ValidationFailed { .. } => "validation_failed",
            CapabilityError::ServerUnavailable { .. } => "server_unavailable",
            CapabilityError::Timeout => "timeout",
            CapabilityError::TransientTransport { .. } => "transient_transport",
            CapabilityError::Overloaded => "overloaded",
        }
    }

    /// Whether a retry policy should apply another attempt to an error
    /// of this kind (spec §4.6 retry-policy: "retries apply only to
    /// transient errors as classified by the invoked source").
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CapabilityError::Timeout | CapabilityError::TransientTransport { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CapabilityError>;
