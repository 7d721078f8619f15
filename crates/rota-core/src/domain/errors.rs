use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("No participant is active in the requested range")]
    EmptyPool,

    #[error("Invalid mutation: {0}")]
    InvalidMutation(String),
}
