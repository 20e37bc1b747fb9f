//! Variety metric, configuration and action types (spec §4.7).

use serde::{Deserialize, Serialize};

/// A point-in-time variety snapshot (spec §3 data model table).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VarietyMetric {
    pub operational: usize,
    pub environmental: usize,
    /// `environmental - operational` (Ashby's gap).
    pub gap: i64,
    /// `(environmental - operational) / max(operational, 1)`.
    pub gap_ratio: f64,
    /// Shannon entropy (base 2) over the current subsystem state-type
    /// distribution.
    pub entropy: f64,
    pub at: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VarietyConfig {
    pub interval_ms: u64,
    pub critical_gap: f64,
    pub high_gap: f64,
    pub entropy_threshold: f64,
    pub autonomous_mode: bool,
    pub scale_step_critical: u32,
    pub scale_step_high: u32,
    pub action_log_bound: usize,
}

impl Default for VarietyConfig {
    fn default() -> Self {
        Self {
            interval_ms: 30_000,
            critical_gap: 0.7,
            high_gap: 0.5,
            entropy_threshold: 4.5,
            autonomous_mode: true,
            scale_step_critical: 4,
            scale_step_high: 2,
            action_log_bound: 256,
        }
    }
}

pub struct VarietyConfigBuilder {
    config: VarietyConfig,
}

impl Default for VarietyConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl VarietyConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: VarietyConfig::default(),
        }
    }

    pub fn interval_ms(mut self, ms: u64) -> Self {
        self.config.interval_ms = ms;
        self
    }

    pub fn critical_gap(mut self, ratio: f64) -> Self {
        self.config.critical_gap = ratio;
        self
    }

    pub fn high_gap(mut self, ratio: f64) -> Self {
        self.config.high_gap = ratio;
        self
    }

    pub fn entropy_threshold(mut self, threshold: f64) -> Self {
        self.config.entropy_threshold = threshold;
        self
    }

    pub fn autonomous_mode(mut self, enabled: bool) -> Self {
        self.config.autonomous_mode = enabled;
        self
    }

    pub fn scale_steps(mut self, critical: u32, high: u32) -> Self {
        self.config.scale_step_critical = critical;
        self.config.scale_step_high = high;
        self
    }

    pub fn action_log_bound(mut self, bound: usize) -> Self {
        self.config.action_log_bound = bound;
        self
    }

    pub fn build(self) -> VarietyConfig {
        self.config
    }
}

/// Autonomous actions the controller may take (spec §4.7). Publishing
/// these is the caller's responsibility; the controller only decides
/// and logs them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Action {
    ScaleWorkerPool { step: u32 },
    TriggerAcquisition,
    PublishAlgedonic { intensity: f64 },
    ScheduleEvaluation,
    RebalanceSpecializations,
}
