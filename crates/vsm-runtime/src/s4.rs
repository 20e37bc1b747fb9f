//! S4 — Intelligence (spec §4.5). Scans the environment, predicts, and
//! suggests adaptations. The analytical algorithms are pluggable by
//! design (spec §1 non-goal); this crate fixes only the input/output
//! shapes.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct EnvironmentalModel {
    pub last_scans: Vec<EnvironmentScan>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnvironmentScan {
    pub opportunities: Vec<String>,
    pub threats: Vec<String>,
    pub trends: Vec<String>,
    pub at: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Prediction {
    pub horizon: u64,
    pub scenarios: Vec<String>,
    pub probabilities: Vec<f64>,
    pub at: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdaptationItem {
    pub item_type: String,
    pub impact: String,
    pub description: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdaptationSuggestion {
    pub strategy: String,
    pub priority: String,
}

pub struct S4Intelligence {
    model: EnvironmentalModel,
    predictions: Vec<Prediction>,
    adaptations: Vec<AdaptationSuggestion>,
    pub scanning_interval_ms: u64,
}

impl S4Intelligence {
    pub fn new(scanning_interval_ms: u64) -> Self {
        Self {
            model: EnvironmentalModel::default(),
            predictions: Vec::new(),
            adaptations: Vec::new(),
            scanning_interval_ms,
        }
    }

    /// `scan_environment(context)`: returns an observation and folds it
    /// into the running environmental model. The context-driven scoring
    /// of what counts as an opportunity/threat/trend is left to the
    /// caller (e.g. `vsm-capability`'s discovery layer) — this records
    /// the shape the spec fixes.
    pub fn scan_environment(
        &mut self,
        opportunities: Vec<String>,
        threats: Vec<String>,
        trends: Vec<String>,
        at: u64,
    ) -> EnvironmentScan {
        let scan = EnvironmentScan {
            opportunities,
            threats,
            trends,
            at,
        };
        self.model.last_scans.push(scan.clone());
        scan
    }

    /// `predict_future(horizon)`.
    pub fn predict_future(&mut self, horizon: u64, scenarios: Vec<String>, probabilities: Vec<f64>, at: u64) -> Prediction {
        let prediction = Prediction {
            horizon,
            scenarios,
            probabilities,
            at,
        };
        self.predictions.push(prediction.clone());
        prediction
    }

    /// `suggest_adaptation(item)`: fixed mapping from item type to
    /// strategy and impact to priority (spec §4.5).
    pub fn suggest_adaptation(&mut self, item: &AdaptationItem) -> AdaptationSuggestion {
        let strategy = match item.item_type.as_str() {
            "opportunity" => "exploit",
            "threat" => "mitigate",
            _ => "monitor",
        };
        let priority = match item.impact.as_str() {
            "critical" => "critical",
            "high" => "high",
            "medium" => "medium",
            _ => "low",
        };
        let suggestion = AdaptationSuggestion {
            strategy: strategy.to_string(),
            priority: priority.to_string(),
        };
        self.adaptations.push(suggestion.clone());
        suggestion
    }

    pub fn model(&self) -> &EnvironmentalModel {
        &self.model
    }

    pub fn predictions(&self) -> &[Prediction] {
        &self.predictions
    }

    pub fn adaptations(&self) -> &[AdaptationSuggestion] {
        &self.adaptations
    }
}
