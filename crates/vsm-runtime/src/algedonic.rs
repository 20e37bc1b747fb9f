//! The algedonic (priority-override) channel (spec §3, §4.5).
//!
//! Any subsystem may publish a signal here; it bypasses the normal S1-S5
//! hierarchy and must reach S5 ahead of other work. The bus crate's
//! priority mailbox (`vsm-bus::mailbox`) is what actually guarantees the
//! ordering (spec §8, invariant 7) — this module only fixes the signal
//! shape and the override threshold.

use serde::{Deserialize, Serialize};

/// Intensity at or above this threshold is treated as an override that
/// must reach S5 ahead of anything else in its mailbox (spec §3).
pub const OVERRIDE_THRESHOLD: f64 = 0.7;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AlgedonicSignal {
    pub source: String,
    pub intensity: f64,
    pub payload: serde_json::Value,
    pub at: u64,
}

impl AlgedonicSignal {
    pub fn new(source: impl Into<String>, intensity: f64, payload: serde_json::Value, at: u64) -> Self {
        Self {
            source: source.into(),
            intensity: intensity.clamp(0.0, 1.0),
            payload,
            at,
        }
    }

    pub fn is_override(&self) -> bool {
        self.intensity >= OVERRIDE_THRESHOLD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intensity_is_clamped_into_unit_interval() {
        let signal = AlgedonicSignal::new("s1", 1.7, serde_json::json!({}), 1);
        assert_eq!(signal.intensity, 1.0);
        let signal = AlgedonicSignal::new("s1", -0.3, serde_json::json!({}), 1);
        assert_eq!(signal.intensity, 0.0);
    }

    #[test]
    fn override_threshold_matches_spec() {
        let signal = AlgedonicSignal::new("s4", 0.7, serde_json::json!({}), 1);
        assert!(signal.is_override());
        let signal = AlgedonicSignal::new("s4", 0.69, serde_json::json!({}), 1);
        assert!(!signal.is_override());
    }
}
