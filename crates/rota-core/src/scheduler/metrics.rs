//! Fairness metrics and constraint evaluation.
//!
//! Works on per-person assignment rates (main assignments per day of
//! presence). Breached thresholds become warnings, never errors: a skewed
//! roster is still a roster, and the caller decides whether to regenerate.

use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{FairnessMetrics, Person, Schedule};
use crate::registry::total_days_present;

use super::config::SchedulerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Gini,
    CoefficientOfVariation,
    RateRatio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintViolation {
    pub kind: ViolationKind,
    pub value: f64,
    pub threshold: f64,
    pub severity: Severity,
}

/// Temporary multiplicative adjustment fed back into the scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectiveAction {
    pub person_id: String,
    pub factor: f64,
    pub weeks_remaining: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalMetrics {
    pub gini: f64,
    pub cv: f64,
    /// `min/max` over non-zero rates; `None` until someone has a rate
    pub rate_ratio: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonMetrics {
    pub person_id: String,
    pub name: String,
    pub rate: f64,
    pub metrics: FairnessMetrics,
    /// 95% posterior interval, present when a tracker state exists
    pub interval_95: Option<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub per_person: Vec<PersonMetrics>,
    pub global: GlobalMetrics,
    pub violations: Vec<ConstraintViolation>,
}

impl MetricsSnapshot {
    /// Writes the per-person records back onto the person list, where the
    /// persisting collaborator picks them up.
    pub fn apply_to(&self, people: &mut [Person]) {
        for entry in &self.per_person {
            if let Some(person) = people.iter_mut().find(|p| p.id == entry.person_id) {
                person.fairness = Some(entry.metrics.clone());
            }
        }
    }
}

/// Gini coefficient over rates: `Σ_i Σ_j |r_i − r_j| / (2 n² μ)`.
///
/// The sum runs over a sorted copy so the floating-point result is
/// identical across platforms. Zero when the mean is zero.
pub fn gini(rates: &[f64]) -> f64 {
    let n = rates.len();
    if n == 0 {
        return 0.0;
    }
    let mean = rates.iter().sum::<f64>() / n as f64;
    if mean == 0.0 {
        return 0.0;
    }

    let mut sorted = rates.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mut diff_sum = 0.0;
    for i in 0..n {
        for j in 0..n {
            diff_sum += (sorted[i] - sorted[j]).abs();
        }
    }
    diff_sum / (2.0 * (n * n) as f64 * mean)
}

/// Coefficient of variation `σ/μ` (population σ). Zero when the mean is
/// zero.
pub fn coefficient_of_variation(rates: &[f64]) -> f64 {
    let n = rates.len();
    if n == 0 {
        return 0.0;
    }
    let mean = rates.iter().sum::<f64>() / n as f64;
    if mean == 0.0 {
        return 0.0;
    }
    let variance = rates
        .iter()
        .map(|r| {
            let diff = r - mean;
            diff * diff
        })
        .sum::<f64>()
        / n as f64;
    variance.sqrt() / mean
}

/// `min/max` over the non-zero rates; `None` when no one has a rate yet.
pub fn rate_ratio(rates: &[f64]) -> Option<f64> {
    let mut min = f64::INFINITY;
    let mut max = 0.0f64;
    for &rate in rates.iter().filter(|r| **r > 0.0) {
        min = min.min(rate);
        max = max.max(rate);
    }
    (max > 0.0).then(|| min / max)
}

/// Tags every breached threshold. Severity escalates from `Warning` to
/// `Error` at 1.5× the threshold distance (upper bounds) or below
/// `threshold / 1.5` (the ratio lower bound).
pub fn evaluate_constraints(rates: &[f64], config: &SchedulerConfig) -> Vec<ConstraintViolation> {
    let mut violations = Vec::new();

    let gini_value = gini(rates);
    if gini_value > config.gini_threshold {
        violations.push(ConstraintViolation {
            kind: ViolationKind::Gini,
            value: gini_value,
            threshold: config.gini_threshold,
            severity: upper_severity(gini_value, config.gini_threshold),
        });
    }

    let cv_value = coefficient_of_variation(rates);
    if cv_value > config.cv_threshold {
        violations.push(ConstraintViolation {
            kind: ViolationKind::CoefficientOfVariation,
            value: cv_value,
            threshold: config.cv_threshold,
            severity: upper_severity(cv_value, config.cv_threshold),
        });
    }

    if let Some(ratio) = rate_ratio(rates) {
        if ratio < config.ratio_threshold {
            let severity = if ratio < config.ratio_threshold / 1.5 {
                Severity::Error
            } else {
                Severity::Warning
            };
            violations.push(ConstraintViolation {
                kind: ViolationKind::RateRatio,
                value: ratio,
                threshold: config.ratio_threshold,
                severity,
            });
        }
    }

    violations
}

fn upper_severity(value: f64, threshold: f64) -> Severity {
    if value > threshold * 1.5 {
        Severity::Error
    } else {
        Severity::Warning
    }
}

/// Quartile-based feedback: the top rate quartile gets a priority penalty,
/// the bottom quartile a boost. Needs at least four rated people; quartile
/// membership is by index in the (rate, id)-sorted order so ties stay
/// deterministic.
pub fn quartile_actions(
    rates_by_person: &[(String, f64)],
    config: &SchedulerConfig,
) -> Vec<CorrectiveAction> {
    let n = rates_by_person.len();
    if n < 4 {
        return Vec::new();
    }

    let mut sorted: Vec<&(String, f64)> = rates_by_person.iter().collect();
    sorted.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    let quartile = n / 4;
    let mut actions = Vec::new();
    for (id, _) in sorted.iter().take(quartile) {
        actions.push(CorrectiveAction {
            person_id: id.clone(),
            factor: config.corrective_boost,
            weeks_remaining: config.corrective_expiry_weeks,
        });
    }
    for (id, _) in sorted.iter().skip(n - quartile) {
        actions.push(CorrectiveAction {
            person_id: id.clone(),
            factor: config.corrective_penalty,
            weeks_remaining: config.corrective_expiry_weeks,
        });
    }
    actions
}

/// Positive fairness residual carried per person across the given
/// schedules: within each schedule, a person's ideal share of its main
/// slots is proportional to their days of presence in its range. The
/// accumulated residual is clamped so the debt multiplier stays bounded.
pub fn cross_schedule_debt(people: &[Person], schedules: &[Schedule]) -> BTreeMap<String, f64> {
    const DEBT_CAP: f64 = 3.0;

    let mut debt: BTreeMap<String, f64> = BTreeMap::new();
    for schedule in schedules {
        let range_end = schedule.start + chrono::Duration::days(schedule.weeks as i64 * 7);
        let total_slots: usize = schedule.assignments.iter().map(|a| a.main_ids.len()).sum();
        if total_slots == 0 {
            continue;
        }

        let presence: Vec<(&Person, i64)> = people
            .iter()
            .filter(|p| p.periods.iter().any(|pr| pr.intersects(schedule.start, range_end)))
            .map(|p| {
                let days = crate::calendar::days_present(&p.periods, range_end)
                    - crate::calendar::days_present(&p.periods, schedule.start);
                (p, days.max(0))
            })
            .collect();
        let total_days: i64 = presence.iter().map(|(_, d)| d).sum();
        if total_days == 0 {
            continue;
        }

        for (person, days) in presence {
            let ideal = total_slots as f64 * days as f64 / total_days as f64;
            let actual = schedule.main_count_for(&person.id) as f64;
            let residual = (ideal - actual).max(0.0);
            let entry = debt.entry(person.id.clone()).or_insert(0.0);
            *entry = (*entry + residual).min(DEBT_CAP);
        }
    }

    debt
}

/// Snapshot over accumulated schedules at `date`. Posterior intervals are
/// absent here; the fairness manager fills them from its tracker states.
pub fn compute_metrics(
    people: &[Person],
    schedules: &[Schedule],
    date: NaiveDate,
    config: &SchedulerConfig,
) -> MetricsSnapshot {
    let debt = cross_schedule_debt(people, schedules);
    let computed_at = Utc::now();
    let window_start = date - chrono::Duration::days(config.recent_window_days());

    let mut per_person = Vec::with_capacity(people.len());
    let mut rates = Vec::with_capacity(people.len());

    for person in people {
        let count: u32 = schedules.iter().map(|s| s.main_count_for(&person.id)).sum();
        let days = total_days_present(person, date);
        let rate = count as f64 / days.max(1) as f64;
        rates.push(rate);

        let recent = schedules
            .iter()
            .flat_map(|s| s.assignments.iter())
            .filter(|a| {
                a.week_start >= window_start
                    && a.week_start < date
                    && a.main_ids.iter().any(|id| id == &person.id)
            })
            .count();

        let mentor_burden = schedules
            .iter()
            .flat_map(|s| s.assignments.iter())
            .filter(|a| a.has_mentor && a.main_ids.first() == Some(&person.id))
            .count() as u32;

        per_person.push(PersonMetrics {
            person_id: person.id.clone(),
            name: person.name.clone(),
            rate,
            metrics: FairnessMetrics {
                temporal_score: 1.0 / (rate + config.priority_epsilon),
                assignments_per_day: rate,
                cross_year_debt: debt.get(&person.id).copied().unwrap_or(0.0),
                mentor_burden,
                recent_balance: recent as f64,
                computed_at,
            },
            interval_95: None,
        });
    }

    MetricsSnapshot {
        violations: evaluate_constraints(&rates, config),
        global: GlobalMetrics {
            gini: gini(&rates),
            cv: coefficient_of_variation(&rates),
            rate_ratio: rate_ratio(&rates),
        },
        per_person,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gini_zero_for_identical_rates() {
        assert_eq!(gini(&[0.1, 0.1, 0.1, 0.1]), 0.0);
    }

    #[test]
    fn test_gini_zero_for_zero_mean() {
        assert_eq!(gini(&[0.0, 0.0, 0.0]), 0.0);
        assert_eq!(gini(&[]), 0.0);
    }

    #[test]
    fn test_gini_within_unit_interval() {
        let value = gini(&[0.0, 0.0, 0.0, 1.0]);
        assert!(value > 0.0 && value <= 1.0);
        // Extreme concentration approaches (n-1)/n.
        assert!((value - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_gini_scale_invariant() {
        let rates = [0.02, 0.05, 0.07, 0.11];
        let scaled: Vec<f64> = rates.iter().map(|r| r * 1000.0).collect();
        assert!((gini(&rates) - gini(&scaled)).abs() < 1e-12);
    }

    #[test]
    fn test_cv_zero_for_identical_rates() {
        assert_eq!(coefficient_of_variation(&[0.3, 0.3, 0.3]), 0.0);
    }

    #[test]
    fn test_cv_scale_invariant() {
        let rates = [0.02, 0.05, 0.07, 0.11];
        let scaled: Vec<f64> = rates.iter().map(|r| r * 10.0).collect();
        let a = coefficient_of_variation(&rates);
        let b = coefficient_of_variation(&scaled);
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn test_rate_ratio_ignores_zeros() {
        assert_eq!(rate_ratio(&[0.0, 0.05, 0.1]), Some(0.5));
        assert_eq!(rate_ratio(&[0.0, 0.0]), None);
    }

    #[test]
    fn test_evaluate_constraints_clean_run() {
        let config = SchedulerConfig::default();
        let violations = evaluate_constraints(&[0.1, 0.1, 0.1], &config);
        assert!(violations.is_empty());
    }

    #[test]
    fn test_evaluate_constraints_severity_escalates() {
        let config = SchedulerConfig::default();
        // One person hoards everything: Gini 0.75 > 1.5 × 0.25.
        let violations = evaluate_constraints(&[0.0, 0.0, 0.0, 1.0], &config);
        let gini_violation = violations
            .iter()
            .find(|v| v.kind == ViolationKind::Gini)
            .unwrap();
        assert_eq!(gini_violation.severity, Severity::Error);
    }

    #[test]
    fn test_evaluate_constraints_ratio_warning() {
        let config = SchedulerConfig::default();
        let violations = evaluate_constraints(&[0.06, 0.07, 0.075, 0.08], &config);
        let ratio = violations
            .iter()
            .find(|v| v.kind == ViolationKind::RateRatio)
            .unwrap();
        assert_eq!(ratio.severity, Severity::Warning);
        assert!((ratio.value - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_snapshot_apply_to_fills_fairness_records() {
        use crate::domain::Assignment;
        let config = SchedulerConfig::default();
        let start = chrono::NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let mut people = vec![
            Person::new("a", "A", start - chrono::Duration::days(100)),
            Person::new("b", "B", start - chrono::Duration::days(100)),
        ];
        let mut assignment = Assignment::empty(start);
        assignment.main_ids = vec!["a".into(), "b".into()];
        let schedule = Schedule {
            id: "s".into(),
            start,
            weeks: 1,
            assignments: vec![assignment],
        };

        let snapshot = compute_metrics(
            &people,
            std::slice::from_ref(&schedule),
            start + chrono::Duration::days(7),
            &config,
        );
        snapshot.apply_to(&mut people);

        let fairness = people[0].fairness.as_ref().unwrap();
        assert!((fairness.assignments_per_day - 1.0 / 107.0).abs() < 1e-12);
    }

    #[test]
    fn test_quartile_actions_need_four_people() {
        let config = SchedulerConfig::default();
        let rates = vec![
            ("a".to_string(), 0.1),
            ("b".to_string(), 0.2),
            ("c".to_string(), 0.3),
        ];
        assert!(quartile_actions(&rates, &config).is_empty());
    }

    #[test]
    fn test_quartile_actions_boost_bottom_penalize_top() {
        let config = SchedulerConfig::default();
        let rates = vec![
            ("starved".to_string(), 0.01),
            ("low".to_string(), 0.05),
            ("mid".to_string(), 0.06),
            ("hoarder".to_string(), 0.20),
        ];
        let actions = quartile_actions(&rates, &config);
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].person_id, "starved");
        assert_eq!(actions[0].factor, config.corrective_boost);
        assert_eq!(actions[1].person_id, "hoarder");
        assert_eq!(actions[1].factor, config.corrective_penalty);
        assert_eq!(actions[1].weeks_remaining, config.corrective_expiry_weeks);
    }
}
