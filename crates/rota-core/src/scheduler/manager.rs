//! Fairness manager: the stateful heart of one scheduling run.
//!
//! Owns the Bayesian state map, the per-run accumulators, the corrective
//! actions, and the RNG. One manager serves exactly one generation; it is
//! not shared across runs or threads.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, instrument, warn};

use crate::calendar::days_between;
use crate::domain::{BayesianState, Person, Schedule};
use crate::registry::{is_experienced, total_days_present};

use super::config::SchedulerConfig;
use super::metrics::{self, CorrectiveAction, MetricsSnapshot};
use super::rng::ScheduleRng;
use super::scoring;
use super::selector::{select_team, Candidate, SelectionRequest};
use super::tracker::{self, ConfidenceLevel, VarianceClamp};

/// Per-run accumulators, rebuilt from prior schedules at `initialize` and
/// mutated weekly.
#[derive(Debug, Clone, Default)]
pub struct FairnessContext {
    /// Accumulated main assignments per person (prior schedules + this run)
    pub main_counts: BTreeMap<String, u32>,

    /// First date each person entered scheduling
    pub first_scheduled: BTreeMap<String, NaiveDate>,

    /// Residual carried over from prior schedules
    pub cross_year_debt: BTreeMap<String, f64>,

    /// Main assignment dates inside the recent window
    pub recent_assignments: BTreeMap<String, Vec<NaiveDate>>,
}

impl FairnessContext {
    pub fn main_count(&self, person_id: &str) -> u32 {
        self.main_counts.get(person_id).copied().unwrap_or(0)
    }

    pub fn recent_count(&self, person_id: &str) -> u32 {
        self.recent_assignments
            .get(person_id)
            .map_or(0, |dates| dates.len() as u32)
    }
}

/// Outcome of one weekly selection.
#[derive(Debug, Clone)]
pub struct WeekSelection {
    pub main_ids: Vec<String>,
    pub substitute_ids: Vec<String>,
    pub scores: BTreeMap<String, f64>,
    pub has_mentor: bool,
    pub is_emergency: bool,
}

/// A posterior variance clamp observed during an update.
#[derive(Debug, Clone)]
pub struct InstabilityEvent {
    pub person_id: String,
    pub week_start: NaiveDate,
    pub clamp: VarianceClamp,
}

pub struct FairnessManager {
    config: SchedulerConfig,
    rng: ScheduleRng,
    states: BTreeMap<String, BayesianState>,
    context: FairnessContext,
    actions: Vec<CorrectiveAction>,
    instability: Vec<InstabilityEvent>,
}

impl FairnessManager {
    pub fn new(config: SchedulerConfig, seed: u64) -> Self {
        Self {
            config,
            rng: ScheduleRng::seed_from(seed),
            states: BTreeMap::new(),
            context: FairnessContext::default(),
            actions: Vec::new(),
            instability: Vec::new(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn context(&self) -> &FairnessContext {
        &self.context
    }

    /// Rebuilds all accumulators from the prior schedules. Idempotent: a
    /// second call with the same inputs produces the same state. Posterior
    /// states are (re)created lazily by `mark_available_for_scheduling`.
    #[instrument(skip_all, fields(people = people.len(), prior = prior_schedules.len()))]
    pub fn initialize(
        &mut self,
        people: &[Person],
        prior_schedules: &[Schedule],
        evaluation_date: NaiveDate,
    ) {
        self.states.clear();
        self.actions.clear();
        self.instability.clear();
        self.context = FairnessContext::default();

        let window_start = evaluation_date - chrono::Duration::days(self.config.recent_window_days());

        for schedule in prior_schedules {
            for assignment in &schedule.assignments {
                for id in &assignment.main_ids {
                    *self.context.main_counts.entry(id.clone()).or_insert(0) += 1;
                    if assignment.week_start >= window_start
                        && assignment.week_start < evaluation_date
                    {
                        self.context
                            .recent_assignments
                            .entry(id.clone())
                            .or_default()
                            .push(assignment.week_start);
                    }
                }
                for id in assignment.main_ids.iter().chain(&assignment.substitute_ids) {
                    let first = self
                        .context
                        .first_scheduled
                        .entry(id.clone())
                        .or_insert(assignment.week_start);
                    if assignment.week_start < *first {
                        *first = assignment.week_start;
                    }
                }
            }
        }

        self.context.cross_year_debt = metrics::cross_schedule_debt(people, prior_schedules);
        debug!(
            carried_people = self.context.main_counts.len(),
            "accumulators rebuilt"
        );
    }

    /// Records a person's entry into scheduling. The first call fixes their
    /// first-scheduling date and seeds their posterior at the
    /// contemporaneous ideal rate; later calls are no-ops.
    pub fn mark_available_for_scheduling(
        &mut self,
        person_id: &str,
        date: NaiveDate,
        active_count: usize,
    ) {
        self.context
            .first_scheduled
            .entry(person_id.to_string())
            .or_insert(date);
        self.states.entry(person_id.to_string()).or_insert_with(|| {
            tracker::initial_state(self.config.ideal_rate(active_count), date, &self.config)
        });
    }

    /// Picks the week's main team and substitutes from the active pool.
    #[instrument(skip_all, fields(week = %week_date, active = active.len()))]
    pub fn select_for_week(
        &mut self,
        week_date: NaiveDate,
        active: &[&Person],
        previous_main_ids: &[String],
    ) -> WeekSelection {
        let any_new = active
            .iter()
            .any(|p| !self.is_experienced_now(p, week_date));

        let candidates: Vec<Candidate> = active
            .iter()
            .map(|person| {
                let experienced = self.is_experienced_now(person, week_date);
                Candidate {
                    id: person.id.clone(),
                    priority: self.priority_for(person, week_date, experienced && any_new),
                    experienced,
                    accumulated: self.context.main_count(&person.id),
                }
            })
            .collect();

        let main = select_team(
            &candidates,
            &SelectionRequest {
                team_size: self.config.team_size,
                require_mentor: self.config.require_mentor,
                avoid_consecutive: self.config.avoid_consecutive,
                previous_main_ids,
                temperature: self.config.temperature,
            },
            &mut self.rng,
        );

        let remaining: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| !main.ids.contains(&c.id))
            .collect();
        let substitutes = select_team(
            &remaining,
            &SelectionRequest {
                team_size: self.config.sub_size.min(remaining.len()),
                require_mentor: false,
                avoid_consecutive: false,
                previous_main_ids: &[],
                temperature: self.config.temperature,
            },
            &mut self.rng,
        );

        let mut scores = main.scores;
        scores.extend(substitutes.scores);

        if main.is_emergency {
            warn!(
                week = %week_date,
                picked = main.ids.len(),
                needed = self.config.team_size,
                "pool too small, emergency week"
            );
        }

        WeekSelection {
            has_mentor: main.mentor_picked,
            is_emergency: main.is_emergency,
            main_ids: main.ids,
            substitute_ids: substitutes.ids,
            scores,
        }
    }

    /// Posterior update for every present person, accumulator refresh, and
    /// corrective-action maintenance. Called once per scheduled week.
    #[instrument(skip_all, fields(week = %week_date, assigned = assigned_ids.len()))]
    pub fn update_after_assignment(
        &mut self,
        assigned_ids: &[String],
        present: &[&Person],
        week_date: NaiveDate,
    ) {
        let ideal_rate = self.config.ideal_rate(present.len());

        for person in present {
            let assigned = assigned_ids.iter().any(|id| id == &person.id);
            let state = self
                .states
                .entry(person.id.clone())
                .or_insert_with(|| tracker::initial_state(ideal_rate, week_date, &self.config));
            if let Some(clamp) = tracker::update_state(state, assigned, week_date, ideal_rate, &self.config)
            {
                warn!(person = %person.id, week = %week_date, ?clamp, "posterior variance clamped");
                self.instability.push(InstabilityEvent {
                    person_id: person.id.clone(),
                    week_start: week_date,
                    clamp,
                });
            }
        }

        for id in assigned_ids {
            *self.context.main_counts.entry(id.clone()).or_insert(0) += 1;
            self.context
                .recent_assignments
                .entry(id.clone())
                .or_default()
                .push(week_date);
        }

        let window_days = self.config.recent_window_days();
        for dates in self.context.recent_assignments.values_mut() {
            dates.retain(|d| days_between(*d, week_date) < window_days);
        }

        self.refresh_corrective_actions(present, week_date);
    }

    /// Expires aged-out and mean-crossed actions, then re-registers the
    /// current rate quartiles.
    fn refresh_corrective_actions(&mut self, present: &[&Person], week_date: NaiveDate) {
        for action in &mut self.actions {
            action.weeks_remaining = action.weeks_remaining.saturating_sub(1);
        }
        self.actions.retain(|a| a.weeks_remaining > 0);

        let rates: Vec<(String, f64)> = present
            .iter()
            .map(|p| {
                let days = total_days_present(p, week_date).max(1);
                (p.id.clone(), self.context.main_count(&p.id) as f64 / days as f64)
            })
            .collect();

        if !rates.is_empty() {
            let mean = rates.iter().map(|(_, r)| r).sum::<f64>() / rates.len() as f64;
            self.actions.retain(|action| {
                match rates.iter().find(|(id, _)| id == &action.person_id) {
                    Some((_, rate)) => {
                        let crossed = (action.factor > 1.0 && *rate >= mean)
                            || (action.factor < 1.0 && *rate <= mean);
                        !crossed
                    }
                    None => true,
                }
            });
        }

        for action in metrics::quartile_actions(&rates, &self.config) {
            self.actions.retain(|a| a.person_id != action.person_id);
            self.actions.push(action);
        }
    }

    /// Snapshot with posterior intervals filled in for tracked people.
    pub fn metrics(
        &self,
        people: &[Person],
        schedules: &[Schedule],
        date: NaiveDate,
    ) -> MetricsSnapshot {
        let mut snapshot = metrics::compute_metrics(people, schedules, date, &self.config);
        for entry in &mut snapshot.per_person {
            entry.interval_95 = self
                .states
                .get(&entry.person_id)
                .map(|state| tracker::confidence_interval(state, ConfidenceLevel::P95));
        }
        snapshot
    }

    /// Posterior interval for one person, if they have been tracked.
    pub fn confidence_interval(
        &self,
        person_id: &str,
        level: ConfidenceLevel,
    ) -> Option<(f64, f64)> {
        self.states
            .get(person_id)
            .map(|state| tracker::confidence_interval(state, level))
    }

    pub fn state_of(&self, person_id: &str) -> Option<&BayesianState> {
        self.states.get(person_id)
    }

    /// Drains the variance-clamp events recorded since the last call.
    pub fn take_instability_events(&mut self) -> Vec<InstabilityEvent> {
        std::mem::take(&mut self.instability)
    }

    fn is_experienced_now(&self, person: &Person, week_date: NaiveDate) -> bool {
        is_experienced(
            person,
            week_date,
            self.context.main_count(&person.id),
            &self.config,
        )
    }

    fn priority_for(&self, person: &Person, week_date: NaiveDate, is_active_mentor: bool) -> f64 {
        let posterior_mean = self
            .states
            .get(&person.id)
            .map_or_else(|| self.config.ideal_rate(1), |s| s.posterior_mean);

        let scheduling_days = self
            .context
            .first_scheduled
            .get(&person.id)
            .map_or(0, |first| days_between(*first, week_date));

        let expected = scoring::expected_recent(
            self.context.main_count(&person.id),
            scheduling_days,
            &self.config,
        );
        let debt = self
            .context
            .cross_year_debt
            .get(&person.id)
            .copied()
            .unwrap_or(0.0);

        let base = scoring::priority(
            posterior_mean,
            is_active_mentor,
            expected,
            self.context.recent_count(&person.id),
            debt,
            &self.config,
        );

        let corrective = self
            .actions
            .iter()
            .find(|a| a.person_id == person.id)
            .map_or(1.0, |a| a.factor);

        base * corrective
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn people(n: usize, start: NaiveDate) -> Vec<Person> {
        (0..n)
            .map(|i| Person::new(format!("p{}", i), format!("Person {}", i), start))
            .collect()
    }

    fn manager() -> FairnessManager {
        FairnessManager::new(SchedulerConfig::default(), 42)
    }

    #[test]
    fn test_mark_available_seeds_posterior_at_ideal() {
        let mut mgr = manager();
        let week = date(2025, 6, 2);
        mgr.mark_available_for_scheduling("p0", week, 8);

        let state = mgr.state_of("p0").unwrap();
        let ideal = mgr.config().ideal_rate(8);
        assert!((state.posterior_mean - ideal).abs() < 1e-9);
    }

    #[test]
    fn test_mark_available_is_idempotent() {
        let mut mgr = manager();
        let week = date(2025, 6, 2);
        mgr.mark_available_for_scheduling("p0", week, 8);
        let before = mgr.state_of("p0").unwrap().clone();

        mgr.mark_available_for_scheduling("p0", date(2025, 6, 9), 3);
        assert_eq!(mgr.state_of("p0").unwrap(), &before);
        assert_eq!(mgr.context().first_scheduled["p0"], week);
    }

    #[test]
    fn test_initialize_rebuilds_counts_from_prior_schedules() {
        let start = date(2025, 1, 6);
        let roster = people(3, date(2024, 6, 3));
        let mut schedule = Schedule {
            id: "prior".into(),
            start,
            weeks: 2,
            assignments: vec![
                crate::domain::Assignment::empty(start),
                crate::domain::Assignment::empty(date(2025, 1, 13)),
            ],
        };
        schedule.assignments[0].main_ids = vec!["p0".into(), "p1".into()];
        schedule.assignments[1].main_ids = vec!["p0".into(), "p2".into()];

        let mut mgr = manager();
        mgr.initialize(&roster, &[schedule.clone()], date(2025, 2, 3));

        assert_eq!(mgr.context().main_count("p0"), 2);
        assert_eq!(mgr.context().main_count("p1"), 1);
        assert_eq!(mgr.context().first_scheduled["p0"], start);

        // Idempotent: a second call yields the same accumulators.
        mgr.initialize(&roster, &[schedule], date(2025, 2, 3));
        assert_eq!(mgr.context().main_count("p0"), 2);
    }

    #[test]
    fn test_select_marks_mentor_week() {
        let start = date(2025, 6, 2);
        let mut roster = people(3, date(2024, 6, 3));
        // One genuine newcomer joins the week of the selection.
        roster.push(Person::new("newbie", "Newbie", start));

        let mut mgr = manager();
        let refs: Vec<&Person> = roster.iter().collect();
        for p in &refs {
            mgr.mark_available_for_scheduling(&p.id, start, refs.len());
        }

        let selection = mgr.select_for_week(start, &refs, &[]);
        assert_eq!(selection.main_ids.len(), 2);
        // A newcomer is present, so mentor coverage must hold.
        assert!(selection.has_mentor);
        assert!(!selection.is_emergency);
    }

    #[test]
    fn test_update_increments_only_assigned() {
        let start = date(2025, 6, 2);
        let roster = people(4, date(2024, 6, 3));
        let refs: Vec<&Person> = roster.iter().collect();

        let mut mgr = manager();
        for p in &refs {
            mgr.mark_available_for_scheduling(&p.id, start, refs.len());
        }

        mgr.update_after_assignment(&["p0".into(), "p1".into()], &refs, start);

        assert_eq!(mgr.context().main_count("p0"), 1);
        assert_eq!(mgr.context().main_count("p2"), 0);
        assert_eq!(mgr.context().recent_count("p1"), 1);
        // Every present person got a posterior update.
        for p in &refs {
            assert_eq!(mgr.state_of(&p.id).unwrap().observations, 1);
        }
    }

    #[test]
    fn test_recent_window_prunes_old_weeks() {
        let roster = people(2, date(2024, 6, 3));
        let refs: Vec<&Person> = roster.iter().collect();

        let mut mgr = manager();
        let mut week = date(2025, 6, 2);
        for p in &refs {
            mgr.mark_available_for_scheduling(&p.id, week, refs.len());
        }

        for _ in 0..6 {
            mgr.update_after_assignment(&["p0".into()], &refs, week);
            week = crate::calendar::add_weeks(week, 1);
        }

        // Only the four most recent weeks stay inside the window.
        assert_eq!(mgr.context().recent_count("p0"), 4);
    }

    #[test]
    fn test_corrective_actions_dampen_hoarders() {
        let start = date(2025, 6, 2);
        let roster = people(4, date(2025, 5, 5));
        let refs: Vec<&Person> = roster.iter().collect();

        let mut mgr = manager();
        let mut week = start;
        for p in &refs {
            mgr.mark_available_for_scheduling(&p.id, week, refs.len());
        }

        // p0 takes every slot for four straight weeks.
        for _ in 0..4 {
            mgr.update_after_assignment(&["p0".into()], &refs, week);
            week = crate::calendar::add_weeks(week, 1);
        }

        let hoarder = mgr.priority_for(&roster[0], week, false);
        let starved = mgr.priority_for(&roster[3], week, false);
        assert!(starved > hoarder);
        // The quartile penalty is registered against the hoarder.
        assert!(mgr
            .actions
            .iter()
            .any(|a| a.person_id == "p0" && a.factor < 1.0));
    }

    #[test]
    fn test_confidence_interval_only_for_tracked_people() {
        let mut mgr = manager();
        assert!(mgr.confidence_interval("ghost", ConfidenceLevel::P95).is_none());

        mgr.mark_available_for_scheduling("p0", date(2025, 6, 2), 4);
        let (low, high) = mgr.confidence_interval("p0", ConfidenceLevel::P95).unwrap();
        assert!(low >= 0.0);
        assert!(high > low);
    }
}
