mod errors;
mod models;

pub use errors::ScheduleError;
pub use models::{
    Assignment, BayesianState, Experience, FairnessMetrics, ParticipationPeriod, Person, Schedule,
    YearDocument,
};
