//! Variety/Gap Controller (spec §4.7).

pub mod controller;
pub mod error;
pub mod types;

pub use controller::{
    compute_metric, environmental_variety_from_requirements, operational_variety_from_registry, shannon_entropy,
    VarietyController, VarietySource,
};
pub use error::{Result, VarietyError};
pub use types::{Action, VarietyConfig, VarietyConfigBuilder, VarietyMetric};
