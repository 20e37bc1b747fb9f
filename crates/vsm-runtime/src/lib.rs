//! Subsystem Runtime: the five supervised stateful actors S1-S5, their
//! mailboxes, the algedonic priority-override channel, and the small
//! supervisor that restarts them without restoring in-process state
//! (spec §4.5, §9).

pub mod algedonic;
pub mod error;
pub mod s1;
pub mod s2;
pub mod s3;
pub mod s4;
pub mod s5;
pub mod supervisor;
pub mod types;

pub use algedonic::{AlgedonicSignal, OVERRIDE_THRESHOLD};
pub use error::{Result, RuntimeError};
pub use s1::{S1Metrics, S1Operations};
pub use s2::{AnnotatedPlan, ConflictIssue, ConflictRecord, Resolution, Rule, S2Coordination};
pub use s3::{AuditRecord, ResourceDemand, ResourcePool, S3Control};
pub use s4::{AdaptationItem, AdaptationSuggestion, EnvironmentScan, Prediction, S4Intelligence};
pub use s5::{GrowthStrategy, Identity, Policy, PolicyContext, S5Policy, StrategicDecision};
pub use supervisor::{RestartPolicy, Supervisor};
pub use types::{CapabilityHandler, Coordination, FnHandler, Operation, OperationOutcome, OperationResult};
