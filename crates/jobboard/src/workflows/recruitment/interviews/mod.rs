//! Interview scheduling with interviewer conflict detection and non-destructive rescheduling.

pub mod conflict;
pub mod domain;
pub mod service;

pub use conflict::{detect_conflict, free_slots, SchedulingConflict};
pub use domain::{
    Booking, Interview, InterviewKind, InterviewOutcomeSummary, InterviewStatus, NewInterview,
    Recommendation, Supersede, TimeWindow,
};
pub use service::{InterviewRequest, InterviewResult, InterviewScheduler, SchedulingError};
