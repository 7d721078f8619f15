use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::errors::ScheduleError;

/// Half-open presence interval `[start, end)`. An open end means the
/// person is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipationPeriod {
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
}

impl ParticipationPeriod {
    pub fn new(start: NaiveDate, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && self.end.map_or(true, |end| date < end)
    }

    /// True iff the period overlaps the half-open range `[from, to)`.
    pub fn intersects(&self, from: NaiveDate, to: NaiveDate) -> bool {
        self.start < to && self.end.map_or(true, |end| end > from)
    }
}

// Experience tag, derived from tenure and prior assignments on demand.
// Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Experience {
    New,
    Experienced,
}

/// Per-person fairness record, refreshed by metrics computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairnessMetrics {
    /// Composite temporal fairness score (higher = more under-served)
    pub temporal_score: f64,

    /// Main assignments per day of presence
    pub assignments_per_day: f64,

    /// Residual carried over from prior schedules (assignment units)
    pub cross_year_debt: f64,

    /// Weeks served as the designated mentor
    pub mentor_burden: u32,

    /// Main assignments inside the recent 4-week window
    pub recent_balance: f64,

    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub name: String,
    pub periods: Vec<ParticipationPeriod>,
    #[serde(default)]
    pub fairness: Option<FairnessMetrics>,
}

impl Person {
    pub fn new(id: impl Into<String>, name: impl Into<String>, start: NaiveDate) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            periods: vec![ParticipationPeriod::new(start, None)],
            fairness: None,
        }
    }

    pub fn earliest_start(&self) -> Option<NaiveDate> {
        self.periods.iter().map(|p| p.start).min()
    }

    /// Validates the period invariant: strictly ordered, non-overlapping,
    /// each closed period non-empty, and only the last period may be open.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        for (i, period) in self.periods.iter().enumerate() {
            if let Some(end) = period.end {
                if end <= period.start {
                    return Err(ScheduleError::InvalidRange(format!(
                        "person {} has an empty period starting {}",
                        self.id, period.start
                    )));
                }
            } else if i + 1 != self.periods.len() {
                return Err(ScheduleError::InvalidRange(format!(
                    "person {} has an open period before the last one",
                    self.id
                )));
            }

            if let Some(next) = self.periods.get(i + 1) {
                match period.end {
                    Some(end) if end <= next.start => {}
                    _ => {
                        return Err(ScheduleError::InvalidRange(format!(
                            "person {} has overlapping or unordered periods",
                            self.id
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// One scheduled week, keyed by its Monday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub week_start: NaiveDate,

    /// Main assignees, at most `team_size`
    pub main_ids: Vec<String>,

    /// Fallback assignees, at most `sub_size`
    pub substitute_ids: Vec<String>,

    /// Fairness scores recorded at selection time, keyed by person id.
    /// BTreeMap keeps serialized output order-stable.
    #[serde(default)]
    pub scores: BTreeMap<String, f64>,

    pub has_mentor: bool,

    #[serde(default)]
    pub comment: Option<String>,

    /// Set when the pool could not fill the full main team
    #[serde(default)]
    pub is_emergency: bool,

    /// Set when a manual edit touched this week
    #[serde(default)]
    pub manually_edited: bool,
}

impl Assignment {
    pub fn empty(week_start: NaiveDate) -> Self {
        Self {
            week_start,
            main_ids: Vec::new(),
            substitute_ids: Vec::new(),
            scores: BTreeMap::new(),
            has_mentor: false,
            comment: None,
            is_emergency: false,
            manually_edited: false,
        }
    }

    pub fn contains(&self, person_id: &str) -> bool {
        self.main_ids.iter().any(|id| id == person_id)
            || self.substitute_ids.iter().any(|id| id == person_id)
    }
}

/// A dense multi-week roster: `assignments[i].week_start = start + 7·i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub start: NaiveDate,
    pub weeks: u32,
    pub assignments: Vec<Assignment>,
}

impl Schedule {
    /// Index of the week containing `date`, if it falls inside the schedule.
    pub fn week_index_of(&self, date: NaiveDate) -> Option<usize> {
        let offset = (date - self.start).num_days();
        if offset < 0 {
            return None;
        }
        let index = (offset / 7) as usize;
        (index < self.assignments.len()).then_some(index)
    }

    /// Count of main assignments for `person_id` across all weeks.
    pub fn main_count_for(&self, person_id: &str) -> u32 {
        self.assignments
            .iter()
            .filter(|a| a.main_ids.iter().any(|id| id == person_id))
            .count() as u32
    }
}

/// Per-person posterior over assignment rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BayesianState {
    pub posterior_mean: f64,
    pub posterior_variance: f64,
    pub observations: u32,
    pub last_update: NaiveDate,
}

/// The collaborator's persisted layout: one document per calendar year.
/// The core defines the semantics of every field but never touches files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearDocument {
    pub year: i32,
    pub last_modified: DateTime<Utc>,
    pub people: Vec<Person>,
    pub schedules: Vec<Schedule>,
}
