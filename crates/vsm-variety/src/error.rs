//! Error taxonomy for the variety controller (spec §7).

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum VarietyError {
    #[error("variety source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl VarietyError {
    pub fn kind(&self) -> &'static str {
        match self {
            VarietyError::SourceUnavailable(_) => "source_unavailable",
            VarietyError::InvalidConfig(_) => "invalid_config",
        }
    }
}

pub type Result<T> = std::result::Result<T, VarietyError>;
