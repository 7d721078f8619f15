//! Fairness-driven scheduling pipeline.
//!
//! The weekly flow is: active pool → priorities (tracker + scorer) →
//! Gumbel-max selection → posterior update, with the constraint evaluator
//! feeding corrective pressure back into the scorer.
//!
//! - [`SchedulerConfig`] - All tunable coefficients
//! - [`ScheduleRng`] - Seeded uniform/Gumbel draws
//! - [`FairnessManager`] - Owns the per-run state
//! - [`MetricsSnapshot`] - Gini / CV / ratio reporting with violations

mod config;
mod manager;
mod metrics;
mod rng;
mod scoring;
mod selector;
mod tracker;

pub use config::SchedulerConfig;
pub use manager::{FairnessContext, FairnessManager, InstabilityEvent, WeekSelection};
pub use metrics::{
    coefficient_of_variation, compute_metrics, cross_schedule_debt, gini, rate_ratio,
    ConstraintViolation, CorrectiveAction, GlobalMetrics, MetricsSnapshot, PersonMetrics, Severity,
    ViolationKind,
};
pub use rng::ScheduleRng;
pub use scoring::{expected_recent, priority};
pub use selector::{select_team, Candidate, SelectionRequest, TeamSelection};
pub use tracker::{confidence_interval, initial_state, update_state, ConfidenceLevel, VarianceClamp};
