//! Pure queries over a person list.
//!
//! Presence and experience are always evaluated against explicit inputs so
//! the same queries serve generation, mutations, and metrics without any
//! shared state.

use chrono::NaiveDate;

use crate::calendar::days_present;
use crate::domain::{Experience, Person};
use crate::scheduler::SchedulerConfig;

/// True iff some participation period contains `date` (half-open).
pub fn is_active_on(person: &Person, date: NaiveDate) -> bool {
    person.periods.iter().any(|period| period.contains(date))
}

/// Filters to the people active on `date`, preserving input order.
pub fn active_people<'a>(people: &'a [Person], date: NaiveDate) -> Vec<&'a Person> {
    people.iter().filter(|p| is_active_on(p, date)).collect()
}

/// Total days of presence up to `reference`.
pub fn total_days_present(person: &Person, reference: NaiveDate) -> i64 {
    days_present(&person.periods, reference)
}

/// A person is experienced once their tenure reaches the configured
/// threshold, or once they have served enough main assignments.
pub fn is_experienced(
    person: &Person,
    reference: NaiveDate,
    prior_main_assignments: u32,
    config: &SchedulerConfig,
) -> bool {
    let tenure = person
        .earliest_start()
        .map_or(0, |start| (reference - start).num_days());
    tenure >= config.experience_tenure_days
        || prior_main_assignments >= config.experience_assignment_floor
}

pub fn experience_of(
    person: &Person,
    reference: NaiveDate,
    prior_main_assignments: u32,
    config: &SchedulerConfig,
) -> Experience {
    if is_experienced(person, reference, prior_main_assignments, config) {
        Experience::Experienced
    } else {
        Experience::New
    }
}
