//! Schedule generation.
//!
//! Drives the fairness manager through the week loop: validate, filter the
//! pool, pick each week's team, update the tracker, and report metrics
//! breaches as warnings on the finished schedule.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::calendar::{add_weeks, monday_of};
use crate::domain::{Assignment, Person, Schedule, ScheduleError};
use crate::ports::Clock;
use crate::registry::active_people;
use crate::scheduler::{ConstraintViolation, FairnessManager, SchedulerConfig};

pub const MAX_WEEKS: u32 = 52;

/// Validated input for one generation run.
#[derive(Debug, Clone)]
pub struct ScheduleRequest {
    pub people: Vec<Person>,
    /// Any date; normalized to the Monday of its ISO week
    pub start: NaiveDate,
    pub weeks: u32,
    /// Seed for the run's RNG; equal inputs and equal seeds reproduce the
    /// schedule byte for byte
    pub seed: u64,
    /// Previously generated schedules feeding accumulated counts and debt
    pub prior_schedules: Vec<Schedule>,
    /// Reference date for accumulator rebuilds; defaults to the clock
    pub evaluation_date: Option<NaiveDate>,
    pub config: SchedulerConfig,
}

impl ScheduleRequest {
    pub fn new(people: Vec<Person>, start: NaiveDate, weeks: u32, seed: u64) -> Self {
        Self {
            people,
            start,
            weeks,
            seed,
            prior_schedules: Vec::new(),
            evaluation_date: None,
            config: SchedulerConfig::default(),
        }
    }
}

/// Non-fatal findings attached to a successful generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum GenerationWarning {
    /// A fairness metric breached its threshold
    Constraint { violation: ConstraintViolation },

    /// A posterior variance update ran into its bounds and was clamped
    NumericalInstability {
        person_id: String,
        week_start: NaiveDate,
    },

    /// The active pool could not fill the main team
    EmergencyWeek { week_index: usize, available: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub schedule: Schedule,
    pub warnings: Vec<GenerationWarning>,
}

/// Generates a `weeks`-long roster starting at the Monday of `start`'s ISO
/// week.
///
/// Validation failures abort before any state exists; pool exhaustion and
/// metric breaches degrade to warnings on the returned outcome.
#[instrument(skip_all, fields(start = %request.start, weeks = request.weeks, seed = request.seed))]
pub fn generate(
    request: &ScheduleRequest,
    clock: &dyn Clock,
) -> Result<GenerationOutcome, ScheduleError> {
    if request.weeks < 1 || request.weeks > MAX_WEEKS {
        return Err(ScheduleError::InvalidRange(format!(
            "weeks must be within [1, {}], got {}",
            MAX_WEEKS, request.weeks
        )));
    }
    if request.config.team_size < 1 {
        return Err(ScheduleError::InvalidRange(
            "team_size must be at least 1".into(),
        ));
    }
    if !(request.config.temperature > 0.0) {
        return Err(ScheduleError::InvalidRange(
            "temperature must be strictly positive".into(),
        ));
    }
    if request.people.is_empty() {
        return Err(ScheduleError::EmptyPool);
    }
    for person in &request.people {
        person.validate()?;
    }

    let start = monday_of(request.start);
    let range_end = add_weeks(start, request.weeks as i64);
    let evaluation_date = request.evaluation_date.unwrap_or_else(|| clock.today());

    let eligible: Vec<Person> = request
        .people
        .iter()
        .filter(|p| p.periods.iter().any(|pr| pr.intersects(start, range_end)))
        .cloned()
        .collect();
    if eligible.is_empty() {
        return Err(ScheduleError::EmptyPool);
    }

    info!(eligible = eligible.len(), "starting generation");

    let mut manager = FairnessManager::new(request.config.clone(), request.seed);
    manager.initialize(&request.people, &request.prior_schedules, evaluation_date);

    let mut warnings = Vec::new();
    let mut assignments = Vec::with_capacity(request.weeks as usize);
    let mut previous_main: Vec<String> = Vec::new();

    for week_index in 0..request.weeks as usize {
        let week_date = add_weeks(start, week_index as i64);
        let active = active_people(&eligible, week_date);

        for person in &active {
            manager.mark_available_for_scheduling(&person.id, week_date, active.len());
        }

        if active.is_empty() {
            warn!(week = %week_date, "nobody active, emitting empty emergency week");
            warnings.push(GenerationWarning::EmergencyWeek {
                week_index,
                available: 0,
            });
            let mut assignment = Assignment::empty(week_date);
            assignment.is_emergency = true;
            assignments.push(assignment);
            previous_main.clear();
            continue;
        }

        let selection = manager.select_for_week(week_date, &active, &previous_main);
        if selection.is_emergency {
            warnings.push(GenerationWarning::EmergencyWeek {
                week_index,
                available: active.len(),
            });
        }

        manager.update_after_assignment(&selection.main_ids, &active, week_date);

        debug!(
            week = %week_date,
            main = ?selection.main_ids,
            subs = ?selection.substitute_ids,
            "week assigned"
        );

        previous_main = selection.main_ids.clone();
        assignments.push(Assignment {
            week_start: week_date,
            main_ids: selection.main_ids,
            substitute_ids: selection.substitute_ids,
            scores: selection.scores,
            has_mentor: selection.has_mentor,
            comment: None,
            is_emergency: selection.is_emergency,
            manually_edited: false,
        });
    }

    let schedule = Schedule {
        id: format!("roster-{}-{}w-{:016x}", start, request.weeks, request.seed),
        start,
        weeks: request.weeks,
        assignments,
    };

    for event in manager.take_instability_events() {
        warnings.push(GenerationWarning::NumericalInstability {
            person_id: event.person_id,
            week_start: event.week_start,
        });
    }

    let mut all_schedules = request.prior_schedules.clone();
    all_schedules.push(schedule.clone());
    let snapshot = manager.metrics(&eligible, &all_schedules, range_end);
    for violation in snapshot.violations {
        warnings.push(GenerationWarning::Constraint { violation });
    }

    info!(warnings = warnings.len(), "generation finished");

    Ok(GenerationOutcome { schedule, warnings })
}
