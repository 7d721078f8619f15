//! Priority scoring.
//!
//! Ranks candidates for a week by composing the rate deficit with mentor
//! load, recency pressure, and carried-over debt. All inputs arrive
//! explicitly; the scorer holds no state.

use super::config::SchedulerConfig;

/// Expected main assignments inside the recent window, extrapolated from a
/// person's overall pace.
///
/// # Formula
/// ```text
/// expected = (window_days / scheduling_days) · total_main_so_far
/// ```
/// `scheduling_days` counts from the person's first scheduling date
/// (floored at one day). A person with no assignments yet expects zero, so
/// their first week carries no recency bonus; the deficit base alone
/// drives them upward.
pub fn expected_recent(
    total_main_so_far: u32,
    scheduling_days: i64,
    config: &SchedulerConfig,
) -> f64 {
    let days = scheduling_days.max(1) as f64;
    (config.recent_window_days() as f64 / days) * total_main_so_far as f64
}

/// Composite priority for one candidate. Strictly positive.
///
/// # Formula
/// ```text
/// base     = 1 / (posterior_mean + ε)
/// mentor   = active mentor ? 0.85 : 1.0
/// recency  = 1 + max(0, expected − recent_count)
/// debt     = 1 + 0.8 · cross_year_debt
/// priority = base · mentor · recency · debt
/// ```
pub fn priority(
    posterior_mean: f64,
    is_active_mentor: bool,
    expected: f64,
    recent_count: u32,
    cross_year_debt: f64,
    config: &SchedulerConfig,
) -> f64 {
    let base = 1.0 / (posterior_mean + config.priority_epsilon);
    let mentor = if is_active_mentor {
        config.mentor_penalty
    } else {
        1.0
    };
    let recency = 1.0 + (expected - recent_count as f64).max(0.0);
    let debt = 1.0 + config.debt_weight * cross_year_debt;
    base * mentor * recency * debt
}
