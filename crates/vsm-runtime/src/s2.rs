//! S2 — Coordination (spec §4.5). Serializes conflicting S1 activities:
//! annotates submitted plans against standing rules and resolves
//! conflicts between units with a fixed, deterministic mapping.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::types::Operation;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ConflictIssue {
    ResourceConflict,
    PriorityConflict,
    Other(String),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Resolution {
    TimeSharing,
    WeightedPriority,
    Arbitration,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnnotatedPlan {
    pub operations: Vec<Operation>,
    pub notes: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub unit_a: String,
    pub unit_b: String,
    pub issue: String,
    pub resolution: Resolution,
}

/// A coordination rule: a name and a free-form annotation applied to
/// every plan passed through `coordinate`. The actual rule *logic* is
/// pluggable (spec's decision-algorithm non-goal extends to S2's rule
/// engine); what's fixed is that rules annotate, they don't mutate, the
/// operation list.
pub struct Rule {
    pub name: String,
    pub annotate: fn(&[Operation]) -> Option<String>,
}

pub struct S2Coordination {
    rules: Vec<Rule>,
    active_coordinations: VecDeque<AnnotatedPlan>,
    conflict_history: VecDeque<ConflictRecord>,
    bound: usize,
}

impl S2Coordination {
    pub fn new(bound: usize) -> Self {
        Self {
            rules: Vec::new(),
            active_coordinations: VecDeque::new(),
            conflict_history: VecDeque::new(),
            bound,
        }
    }

    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// `coordinate(plan)`: applies rules to the operation list and
    /// returns an annotated plan. Plans are appended to
    /// `active_coordinations`, a FIFO bounded history.
    pub fn coordinate(&mut self, operations: Vec<Operation>) -> AnnotatedPlan {
        let notes = self
            .rules
            .iter()
            .filter_map(|rule| (rule.annotate)(&operations).map(|n| format!("{}: {n}", rule.name)))
            .collect();
        let plan = AnnotatedPlan { operations, notes };
        self.active_coordinations.push_back(plan.clone());
        if self.active_coordinations.len() > self.bound {
            self.active_coordinations.pop_front();
        }
        plan
    }

    /// `resolve_conflict(unitA, unitB, issue)`: deterministic mapping
    /// fixed by spec §4.5: `resource_conflict -> time_sharing`,
    /// `priority_conflict -> weighted_priority`, otherwise arbitration.
    pub fn resolve_conflict(
        &mut self,
        unit_a: impl Into<String>,
        unit_b: impl Into<String>,
        issue: ConflictIssue,
    ) -> ConflictRecord {
        let resolution = match issue {
            ConflictIssue::ResourceConflict => Resolution::TimeSharing,
            ConflictIssue::PriorityConflict => Resolution::WeightedPriority,
            ConflictIssue::Other(_) => Resolution::Arbitration,
        };
        let issue_label = match &issue {
            ConflictIssue::ResourceConflict => "resource_conflict".to_string(),
            ConflictIssue::PriorityConflict => "priority_conflict".to_string(),
            ConflictIssue::Other(label) => label.clone(),
        };
        let record = ConflictRecord {
            unit_a: unit_a.into(),
            unit_b: unit_b.into(),
            issue: issue_label,
            resolution,
        };
        self.conflict_history.push_back(record.clone());
        if self.conflict_history.len() > self.bound {
            self.conflict_history.pop_front();
        }
        record
    }

    pub fn active_coordinations(&self) -> &VecDeque<AnnotatedPlan> {
        &self.active_coordinations
    }

    pub fn conflict_history(&self) -> &VecDeque<ConflictRecord> {
        &self.conflict_history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_conflict_mapping_is_deterministic() {
        let mut s2 = S2Coordination::new(10);
        let r1 = s2.resolve_conflict("u1", "u2", ConflictIssue::ResourceConflict);
        assert_eq!(r1.resolution, Resolution::TimeSharing);
        let r2 = s2.resolve_conflict("u1", "u2", ConflictIssue::PriorityConflict);
        assert_eq!(r2.resolution, Resolution::WeightedPriority);
        let r3 = s2.resolve_conflict("u1", "u2", ConflictIssue::Other("novel".into()));
        assert_eq!(r3.resolution, Resolution::Arbitration);
        assert_eq!(s2.conflict_history().len(), 3);
    }

    #[test]
    fn active_coordinations_is_bounded_fifo() {
        let mut s2 = S2Coordination::new(2);
        s2.coordinate(vec![]);
        s2.coordinate(vec![]);
        s2.coordinate(vec![]);
        assert_eq!(s2.active_coordinations().len(), 2);
    }

    #[test]
    fn rules_annotate_without_mutating_operations() {
        let mut s2 = S2Coordination::new(10);
        s2.add_rule(Rule {
            name: "max-batch".into(),
            annotate: |ops| {
                if ops.len() > 1 {
                    Some("large batch".into())
                } else {
                    None
                }
            },
        });
        let ops = vec![
            Operation {
                capability: "a".into(),
                params: serde_json::json!({}),
                correlation_id: "1".into(),
            },
            Operation {
                capability: "b".into(),
                params: serde_json::json!({}),
                correlation_id: "2".into(),
            },
        ];
        let plan = s2.coordinate(ops.clone());
        assert_eq!(plan.operations.len(), ops.len());
        assert!(plan.notes[0].contains("large batch"));
    }
}
