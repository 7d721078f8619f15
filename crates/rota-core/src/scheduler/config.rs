//! Configuration for the fairness scheduler.

use serde::{Deserialize, Serialize};

/// Tunable constants for the whole scheduling pipeline.
///
/// Every coefficient the tracker, scorer, selector, and constraint
/// evaluator consume lives here, so a caller can tighten or relax the
/// fairness pressure without touching the algorithms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    // ==========================================================================
    // Team shape
    // ==========================================================================
    /// Main assignees per week
    ///
    /// Default: 2
    pub team_size: usize,

    /// Substitutes per week (upper bound)
    ///
    /// Default: 2
    pub sub_size: usize,

    /// Require the first pick of each week to be an experienced person
    /// whenever one is available
    ///
    /// Default: true
    pub require_mentor: bool,

    /// Filter out last week's main assignees when the pool allows it
    ///
    /// Default: true
    pub avoid_consecutive: bool,

    // ==========================================================================
    // Selection noise
    // ==========================================================================
    /// Gumbel-max temperature: lower is greedier, higher is more uniform
    ///
    /// Default: 1.0
    pub temperature: f64,

    // ==========================================================================
    // Experience
    // ==========================================================================
    /// Tenure in days after which a person counts as experienced
    ///
    /// Default: 28
    pub experience_tenure_days: i64,

    /// Prior main assignments that qualify as experienced regardless of
    /// tenure
    ///
    /// Default: 4
    pub experience_assignment_floor: u32,

    // ==========================================================================
    // Rate tracker
    // ==========================================================================
    /// Random-walk process variance per week
    ///
    /// Default: 0.005
    pub process_variance: f64,

    /// Observation variance
    ///
    /// Default: 0.05
    pub observation_variance: f64,

    /// Absolute deviation from the ideal rate beyond which drift
    /// correction engages
    ///
    /// Default: 0.03
    pub drift_threshold: f64,

    /// Fraction of the deviation removed by one drift correction
    ///
    /// Default: 0.2
    pub drift_alpha: f64,

    /// Posterior variance at first encounter
    ///
    /// Default: 0.1
    pub initial_variance: f64,

    /// Numerical floor for the posterior variance
    ///
    /// Default: 1e-6
    pub variance_floor: f64,

    /// Upper bound for the posterior variance
    ///
    /// Default: 1.0
    pub variance_ceiling: f64,

    // ==========================================================================
    // Priority scoring
    // ==========================================================================
    /// Additive guard keeping the rate-deficit base finite
    ///
    /// Default: 1e-3
    pub priority_epsilon: f64,

    /// Multiplicative penalty applied to active mentors
    ///
    /// Default: 0.85
    pub mentor_penalty: f64,

    /// Weight of carried-over debt in the priority composition
    ///
    /// Default: 0.8
    pub debt_weight: f64,

    /// Recent-balance window in weeks
    ///
    /// Default: 4
    pub recent_window_weeks: u32,

    // ==========================================================================
    // Constraint thresholds
    // ==========================================================================
    /// Gini coefficient warning threshold
    ///
    /// Default: 0.25
    pub gini_threshold: f64,

    /// Coefficient-of-variation warning threshold
    ///
    /// Default: 0.30
    pub cv_threshold: f64,

    /// Minimum acceptable min/max rate ratio
    ///
    /// Default: 0.80
    pub ratio_threshold: f64,

    // ==========================================================================
    // Corrective actions
    // ==========================================================================
    /// Priority multiplier for people in the top rate quartile
    ///
    /// Default: 0.7
    pub corrective_penalty: f64,

    /// Priority multiplier for people in the bottom rate quartile
    ///
    /// Default: 1.3
    pub corrective_boost: f64,

    /// Weeks after which a corrective action expires on its own
    ///
    /// Default: 4
    pub corrective_expiry_weeks: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            // Team shape
            team_size: 2,
            sub_size: 2,
            require_mentor: true,
            avoid_consecutive: true,

            // Selection noise
            temperature: 1.0,

            // Experience
            experience_tenure_days: 28,
            experience_assignment_floor: 4,

            // Rate tracker
            process_variance: 0.005,
            observation_variance: 0.05,
            drift_threshold: 0.03,
            drift_alpha: 0.2,
            initial_variance: 0.1,
            variance_floor: 1e-6,
            variance_ceiling: 1.0,

            // Priority scoring
            priority_epsilon: 1e-3,
            mentor_penalty: 0.85,
            debt_weight: 0.8,
            recent_window_weeks: 4,

            // Constraint thresholds
            gini_threshold: 0.25,
            cv_threshold: 0.30,
            ratio_threshold: 0.80,

            // Corrective actions
            corrective_penalty: 0.7,
            corrective_boost: 1.3,
            corrective_expiry_weeks: 4,
        }
    }
}

impl SchedulerConfig {
    /// Expected main assignments per day per person under perfect fairness.
    ///
    /// Formula: team_size / (active_count · 7)
    pub fn ideal_rate(&self, active_count: usize) -> f64 {
        if active_count == 0 {
            return 0.0;
        }
        self.team_size as f64 / (active_count as f64 * 7.0)
    }

    /// Length of the recent-balance window in days.
    pub fn recent_window_days(&self) -> i64 {
        self.recent_window_weeks as i64 * 7
    }
}
