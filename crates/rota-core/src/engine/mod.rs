//! Schedule generation and manual mutations.

mod generator;
mod mutations;

pub use generator::{generate, GenerationOutcome, GenerationWarning, ScheduleRequest, MAX_WEEKS};
pub use mutations::{
    handle_person_deletion, replace_in_week, swap_people_globally, DeletionReport, SwapReport,
};
