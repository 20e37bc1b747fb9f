//! Capability and Requirement value types (spec §3).

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapabilityKind {
    Operational,
    Intelligence,
    Policy,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapabilitySource {
    Local,
    External { server: String },
    Adapted { server: String },
}

impl CapabilitySource {
    /// Collision key for the registry's name-uniqueness rule: name must
    /// be unique per `(kind, source-category)`, not per exact server.
    pub fn category(&self) -> &'static str {
        match self {
            CapabilitySource::Local => "local",
            CapabilitySource::External { .. } => "external",
            CapabilitySource::Adapted { .. } => "adapted",
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, CapabilitySource::Local | CapabilitySource::Adapted { .. })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Capability {
    pub id: String,
    pub name: String,
    pub kind: CapabilityKind,
    pub source: CapabilitySource,
    pub schema: serde_json::Value,
    pub metadata: serde_json::Value,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Scoring adder for this priority (spec §4.6 scoring table).
    pub fn score_adder(self) -> u32 {
        match self {
            Priority::Critical => 50,
            Priority::High => 30,
            Priority::Medium => 10,
            Priority::Low => 0,
        }
    }

    /// Minimum top score a requirement of this priority needs to be
    /// "sufficiently matched" (spec §4.6 `match_capabilities`).
    pub fn match_threshold(self) -> u32 {
        match self {
            Priority::Critical => 100,
            Priority::High => 75,
            Priority::Medium | Priority::Low => 0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Requirement {
    pub id: String,
    pub kind: CapabilityKind,
    pub constraints: serde_json::Value,
    pub priority: Priority,
    /// Free-form keywords used for the keyword-overlap scoring term
    /// against external tool names/descriptions.
    pub keywords: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScoredMatch {
    pub capability_id: String,
    pub score: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchReport {
    pub matches: Vec<ScoredMatch>,
    pub gaps: Vec<String>,
    pub coverage_pct: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VarietyGap {
    pub current: usize,
    pub available: usize,
    pub required: usize,
    pub gap: i64,
    pub potential: usize,
    pub recommendations: Vec<String>,
}
