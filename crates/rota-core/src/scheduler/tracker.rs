//! Bayesian assignment-rate tracker.
//!
//! Each person carries a scalar Gaussian posterior over their latent main
//! assignment rate (assignments per day of presence). The latent rate
//! evolves as a random walk; each scheduled week contributes one
//! observation for every present person, assigned or not.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::calendar::days_between;
use crate::domain::BayesianState;

use super::config::SchedulerConfig;

/// Confidence level for posterior intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    P68,
    P95,
    P99,
}

impl ConfidenceLevel {
    /// Two-sided standard-normal quantile for this level.
    pub fn z(self) -> f64 {
        match self {
            Self::P68 => 0.9945,
            Self::P95 => 1.9600,
            Self::P99 => 2.5758,
        }
    }
}

/// Which variance bound an update ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarianceClamp {
    Floor,
    Ceiling,
}

/// Posterior at first encounter: the contemporaneous ideal rate with the
/// configured initial uncertainty. Newcomers start at the average, not at
/// zero, so a late joiner is not treated as permanently under-served.
///
/// `last_update` is backdated one week so the first weekly update sees a
/// standard 7-day step instead of discarding its observation.
pub fn initial_state(
    ideal_rate_at_entry: f64,
    entry_date: NaiveDate,
    config: &SchedulerConfig,
) -> BayesianState {
    BayesianState {
        posterior_mean: ideal_rate_at_entry,
        posterior_variance: config.initial_variance,
        observations: 0,
        last_update: entry_date - Duration::days(7),
    }
}

/// One predict/correct step for a present person.
///
/// # Formula
/// ```text
/// prior_var = posterior_var + process_variance · (days_elapsed / 7)
/// K         = prior_var / (prior_var + observation_variance)
/// y         = assigned && days_elapsed > 0 ? 1 / days_elapsed : 0
/// mean'     = mean + K · (y − mean)
/// var'      = (1 − K) · prior_var
/// ```
/// When the corrected mean deviates from `ideal_rate` by more than the
/// drift threshold, a fraction `drift_alpha` of the deviation is removed.
///
/// Returns which variance bound was hit, if any; the caller records the
/// clamp as a diagnostic but the run continues.
pub fn update_state(
    state: &mut BayesianState,
    assigned: bool,
    week_date: NaiveDate,
    ideal_rate: f64,
    config: &SchedulerConfig,
) -> Option<VarianceClamp> {
    let days_elapsed = days_between(state.last_update, week_date).max(0);

    let prior_var =
        state.posterior_variance + config.process_variance * (days_elapsed as f64 / 7.0);
    let gain = prior_var / (prior_var + config.observation_variance);

    let observation = if assigned && days_elapsed > 0 {
        1.0 / days_elapsed as f64
    } else {
        0.0
    };

    state.posterior_mean += gain * (observation - state.posterior_mean);
    state.posterior_variance = (1.0 - gain) * prior_var;

    if (state.posterior_mean - ideal_rate).abs() > config.drift_threshold {
        state.posterior_mean += config.drift_alpha * (ideal_rate - state.posterior_mean);
    }

    state.observations += 1;
    state.last_update = week_date;

    if state.posterior_variance < config.variance_floor {
        state.posterior_variance = config.variance_floor;
        Some(VarianceClamp::Floor)
    } else if state.posterior_variance > config.variance_ceiling {
        state.posterior_variance = config.variance_ceiling;
        Some(VarianceClamp::Ceiling)
    } else {
        None
    }
}

/// `mean ± z·√variance`, clamped at zero below. Diagnostic only; selection
/// never reads intervals.
pub fn confidence_interval(state: &BayesianState, level: ConfidenceLevel) -> (f64, f64) {
    let half_width = level.z() * state.posterior_variance.sqrt();
    (
        (state.posterior_mean - half_width).max(0.0),
        state.posterior_mean + half_width,
    )
}
