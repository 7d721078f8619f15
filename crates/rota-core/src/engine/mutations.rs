//! Manual edits on generated schedules.
//!
//! Every mutation validates before touching anything, so a failed edit
//! leaves the schedule exactly as it was. Edits do not rewrite tracker
//! history; later generations simply see the adjusted assignment counts.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Person, Schedule, ScheduleError};
use crate::registry::{is_active_on, is_experienced};
use crate::scheduler::{select_team, Candidate, ScheduleRng, SchedulerConfig, SelectionRequest};

/// Weeks a global swap had to leave untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwapReport {
    pub skipped_weeks: Vec<usize>,
}

/// Outcome of removing a person from a set of schedules. Weeks are keyed
/// as `(schedule_id, week_index)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeletionReport {
    pub removed_from: Vec<(String, usize)>,
    pub refilled: Vec<(String, usize)>,
    pub emergency: Vec<(String, usize)>,
}

/// Swaps one person out of a single week.
///
/// The replacement must be active that week and not already part of it.
/// Recorded selection-time scores stay as they were; the week is flagged
/// as manually edited and its mentor coverage is recomputed.
pub fn replace_in_week(
    schedule: &mut Schedule,
    week_index: usize,
    old_id: &str,
    new_id: &str,
    people: &[Person],
    config: &SchedulerConfig,
) -> Result<(), ScheduleError> {
    let week_count = schedule.assignments.len();
    let assignment = schedule
        .assignments
        .get(week_index)
        .ok_or_else(|| {
            ScheduleError::InvalidMutation(format!(
                "week index {} out of range ({} weeks)",
                week_index, week_count
            ))
        })?;
    let week_start = assignment.week_start;

    let replacement = people
        .iter()
        .find(|p| p.id == new_id)
        .ok_or_else(|| ScheduleError::InvalidMutation(format!("unknown person {}", new_id)))?;
    if !is_active_on(replacement, week_start) {
        return Err(ScheduleError::InvalidMutation(format!(
            "{} is not active in the week of {}",
            new_id, week_start
        )));
    }
    if assignment.contains(new_id) {
        return Err(ScheduleError::InvalidMutation(format!(
            "{} is already part of the week of {}",
            new_id, week_start
        )));
    }
    if !assignment.contains(old_id) {
        return Err(ScheduleError::InvalidMutation(format!(
            "{} is not part of the week of {}",
            old_id, week_start
        )));
    }

    let assignment = &mut schedule.assignments[week_index];
    for id in assignment
        .main_ids
        .iter_mut()
        .chain(assignment.substitute_ids.iter_mut())
    {
        if id == old_id {
            *id = new_id.to_string();
        }
    }
    assignment.manually_edited = true;

    schedule.assignments[week_index].has_mentor = mentor_coverage(schedule, week_index, people, config);
    debug!(week = %week_start, old = old_id, new = new_id, "replacement applied");
    Ok(())
}

/// Exchanges every occurrence of two people across all weeks, including
/// their recorded scores. Weeks where either person is inactive are left
/// untouched and reported. Applying the same swap twice restores the
/// original schedule.
pub fn swap_people_globally(
    schedule: &mut Schedule,
    id_a: &str,
    id_b: &str,
    people: &[Person],
    config: &SchedulerConfig,
) -> Result<SwapReport, ScheduleError> {
    if id_a == id_b {
        return Err(ScheduleError::InvalidMutation(
            "cannot swap a person with themselves".into(),
        ));
    }
    let person_a = people
        .iter()
        .find(|p| p.id == id_a)
        .ok_or_else(|| ScheduleError::InvalidMutation(format!("unknown person {}", id_a)))?;
    let person_b = people
        .iter()
        .find(|p| p.id == id_b)
        .ok_or_else(|| ScheduleError::InvalidMutation(format!("unknown person {}", id_b)))?;

    let mut report = SwapReport::default();

    for week_index in 0..schedule.assignments.len() {
        let assignment = &schedule.assignments[week_index];
        if !assignment.contains(id_a) && !assignment.contains(id_b) {
            continue;
        }

        let week_start = assignment.week_start;
        if !is_active_on(person_a, week_start) || !is_active_on(person_b, week_start) {
            report.skipped_weeks.push(week_index);
            continue;
        }

        let assignment = &mut schedule.assignments[week_index];
        for id in assignment
            .main_ids
            .iter_mut()
            .chain(assignment.substitute_ids.iter_mut())
        {
            if id == id_a {
                *id = id_b.to_string();
            } else if id == id_b {
                *id = id_a.to_string();
            }
        }

        let score_a = assignment.scores.remove(id_a);
        let score_b = assignment.scores.remove(id_b);
        if let Some(score) = score_a {
            assignment.scores.insert(id_b.to_string(), score);
        }
        if let Some(score) = score_b {
            assignment.scores.insert(id_a.to_string(), score);
        }

        schedule.assignments[week_index].has_mentor =
            mentor_coverage(schedule, week_index, people, config);
    }

    Ok(report)
}

/// Strips a person from every week of every schedule. Weeks that fall
/// below the main team size become emergency holes, or are refilled by a
/// single-week selection over `replacement_pool` when one is given.
/// Tracker history is never rewritten.
pub fn handle_person_deletion(
    person_id: &str,
    schedules: &mut [Schedule],
    people: &[Person],
    replacement_pool: Option<&[Person]>,
    config: &SchedulerConfig,
    seed: u64,
) -> DeletionReport {
    let mut report = DeletionReport::default();
    let mut rng = ScheduleRng::seed_from(seed);

    // Coverage checks need every person a week can reference, whether they
    // came from the original roster or the replacement pool.
    let mut roster: Vec<Person> = people.to_vec();
    if let Some(pool) = replacement_pool {
        for person in pool {
            if !roster.iter().any(|r| r.id == person.id) {
                roster.push(person.clone());
            }
        }
    }

    for schedule_index in 0..schedules.len() {
        for week_index in 0..schedules[schedule_index].assignments.len() {
            let assignment = &mut schedules[schedule_index].assignments[week_index];
            let before = assignment.main_ids.len() + assignment.substitute_ids.len();
            assignment.main_ids.retain(|id| id != person_id);
            assignment.substitute_ids.retain(|id| id != person_id);
            if assignment.main_ids.len() + assignment.substitute_ids.len() == before {
                continue;
            }

            let schedule_id = schedules[schedule_index].id.clone();
            report.removed_from.push((schedule_id.clone(), week_index));

            if schedules[schedule_index].assignments[week_index].main_ids.len()
                < config.team_size
            {
                if let Some(pool) = replacement_pool {
                    let refilled = refill_week(
                        &mut schedules[schedule_index],
                        week_index,
                        person_id,
                        pool,
                        config,
                        &mut rng,
                    );
                    if refilled {
                        report.refilled.push((schedule_id.clone(), week_index));
                    }
                }

                let assignment = &mut schedules[schedule_index].assignments[week_index];
                if assignment.main_ids.len() < config.team_size {
                    assignment.is_emergency = true;
                    report.emergency.push((schedule_id, week_index));
                }
            }

            schedules[schedule_index].assignments[week_index].has_mentor =
                mentor_coverage(&schedules[schedule_index], week_index, &roster, config);
        }
    }

    report
}

/// Single-week selection over the replacement pool. Returns true when at
/// least one slot was filled.
fn refill_week(
    schedule: &mut Schedule,
    week_index: usize,
    deleted_id: &str,
    pool: &[Person],
    config: &SchedulerConfig,
    rng: &mut ScheduleRng,
) -> bool {
    let assignment = &schedule.assignments[week_index];
    let week_start = assignment.week_start;
    let missing = config.team_size - assignment.main_ids.len();

    let candidates: Vec<Candidate> = pool
        .iter()
        .filter(|p| {
            p.id != deleted_id && is_active_on(p, week_start) && !assignment.contains(&p.id)
        })
        .map(|p| {
            let accumulated = schedule.main_count_for(&p.id);
            Candidate {
                id: p.id.clone(),
                // The tracker is not consulted here: fewer appearances in
                // the schedule at hand means a higher claim on the slot.
                priority: 1.0 / (accumulated as f64 + 1.0),
                experienced: is_experienced(
                    p,
                    week_start,
                    main_count_before(schedule, week_index, &p.id),
                    config,
                ),
                accumulated,
            }
        })
        .collect();

    if candidates.is_empty() || missing == 0 {
        return false;
    }

    let picked = select_team(
        &candidates,
        &SelectionRequest {
            team_size: missing.min(candidates.len()),
            require_mentor: false,
            avoid_consecutive: false,
            previous_main_ids: &[],
            temperature: config.temperature,
        },
        rng,
    );

    let filled = !picked.ids.is_empty();
    let assignment = &mut schedule.assignments[week_index];
    for id in &picked.ids {
        assignment.main_ids.push(id.clone());
        assignment.scores.insert(id.clone(), picked.scores[id]);
    }
    filled
}

/// Mentor coverage of one week: some main assignee is experienced at the
/// week date, counting main appearances in the earlier weeks of this
/// schedule.
fn mentor_coverage(
    schedule: &Schedule,
    week_index: usize,
    people: &[Person],
    config: &SchedulerConfig,
) -> bool {
    let assignment = &schedule.assignments[week_index];
    assignment.main_ids.iter().any(|id| {
        people.iter().find(|p| &p.id == id).is_some_and(|person| {
            is_experienced(
                person,
                assignment.week_start,
                main_count_before(schedule, week_index, id),
                config,
            )
        })
    })
}

fn main_count_before(schedule: &Schedule, week_index: usize, person_id: &str) -> u32 {
    schedule
        .assignments
        .iter()
        .take(week_index)
        .filter(|a| a.main_ids.iter().any(|id| id == person_id))
        .count() as u32
}
