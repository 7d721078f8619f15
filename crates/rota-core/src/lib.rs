pub mod calendar;
pub mod domain;
pub mod engine;
pub mod ports;
pub mod registry;
pub mod scheduler;

// Re-export commonly used types
pub use domain::{
    Assignment,
    BayesianState,
    Experience,
    FairnessMetrics,
    ParticipationPeriod,
    Person,
    Schedule,
    ScheduleError,
    YearDocument,
};

pub use ports::{Clock, FixedClock, SystemClock};

pub use scheduler::{
    compute_metrics, ConfidenceLevel, ConstraintViolation, FairnessManager, GlobalMetrics,
    MetricsSnapshot, PersonMetrics, SchedulerConfig, Severity, ViolationKind,
};

pub use engine::{
    generate, handle_person_deletion, replace_in_week, swap_people_globally, DeletionReport,
    GenerationOutcome, GenerationWarning, ScheduleRequest, SwapReport,
};
