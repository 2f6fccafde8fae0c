use std::fmt;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::super::domain::{ApplicationId, InterviewId, Timestamp, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    Rescheduled,
    NoShow,
}

impl InterviewStatus {
    pub const fn label(self) -> &'static str {
        match self {
            InterviewStatus::Scheduled => "scheduled",
            InterviewStatus::Confirmed => "confirmed",
            InterviewStatus::Completed => "completed",
            InterviewStatus::Cancelled => "cancelled",
            InterviewStatus::Rescheduled => "rescheduled",
            InterviewStatus::NoShow => "noshow",
        }
    }

    /// Rows that still occupy their interviewers' time.
    pub const fn occupies_time(self) -> bool {
        !matches!(self, InterviewStatus::Cancelled | InterviewStatus::Rescheduled)
    }

    pub fn can_transition_to(self, target: InterviewStatus) -> bool {
        match self {
            InterviewStatus::Scheduled => matches!(
                target,
                InterviewStatus::Confirmed
                    | InterviewStatus::Completed
                    | InterviewStatus::Cancelled
                    | InterviewStatus::Rescheduled
                    | InterviewStatus::NoShow
            ),
            InterviewStatus::Confirmed => matches!(
                target,
                InterviewStatus::Completed
                    | InterviewStatus::Cancelled
                    | InterviewStatus::Rescheduled
                    | InterviewStatus::NoShow
            ),
            _ => false,
        }
    }
}

impl fmt::Display for InterviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewKind {
    InPerson,
    Video,
    Phone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Hire,
    Reject,
    FurtherReview,
}

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TimeWindow {
    pub fn new(start: Timestamp, duration_minutes: u32) -> Self {
        Self {
            start,
            end: start + Duration::minutes(i64::from(duration_minutes)),
        }
    }

    /// Touching boundaries do not overlap.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}–{}",
            self.start.format("%Y-%m-%d %H:%M"),
            self.end.format("%H:%M")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interview {
    pub id: InterviewId,
    pub application_id: ApplicationId,
    pub scheduled_at: Timestamp,
    pub duration_minutes: u32,
    pub kind: InterviewKind,
    pub location: Option<String>,
    pub status: InterviewStatus,
    pub interviewers: Vec<UserId>,
    pub notes: String,
    pub rating: Option<u8>,
    pub feedback: Option<String>,
    pub recommendation: Option<Recommendation>,
    pub created_by: UserId,
    pub confirmed_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub cancelled_at: Option<Timestamp>,
    pub time_created: Timestamp,
    pub time_modified: Timestamp,
}

impl Interview {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.scheduled_at, self.duration_minutes)
    }

    pub fn shares_interviewer(&self, interviewers: &[UserId]) -> Option<UserId> {
        self.interviewers
            .iter()
            .copied()
            .find(|user| interviewers.contains(user))
    }

    pub(crate) fn append_note(&mut self, note: &str) {
        if self.notes.is_empty() {
            self.notes = note.to_string();
        } else {
            self.notes.push('\n');
            self.notes.push_str(note);
        }
    }
}

/// Interview fields supplied when booking, before the store assigns identity.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInterview {
    pub application_id: ApplicationId,
    pub scheduled_at: Timestamp,
    pub duration_minutes: u32,
    pub kind: InterviewKind,
    pub location: Option<String>,
    pub interviewers: Vec<UserId>,
    pub notes: String,
    pub created_by: UserId,
    pub time_created: Timestamp,
}

impl NewInterview {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.scheduled_at, self.duration_minutes)
    }
}

/// Old row to flip to `rescheduled` in the same atomic step as the new booking.
#[derive(Debug, Clone, PartialEq)]
pub struct Supersede {
    pub interview_id: InterviewId,
    pub note: String,
    pub at: Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Booking {
    pub interview: NewInterview,
    pub supersedes: Option<Supersede>,
}

/// Aggregated results across every interview of one application.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct InterviewOutcomeSummary {
    pub total: usize,
    pub scheduled: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub rescheduled: usize,
    pub no_show: usize,
    pub average_rating: Option<f64>,
    pub hire: usize,
    pub reject: usize,
    pub further_review: usize,
    pub latest_recommendation: Option<Recommendation>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at(hour: u32, minute: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2025, 3, 3, hour, minute, 0).unwrap()
    }

    #[test]
    fn overlapping_windows_conflict() {
        let booked = TimeWindow::new(at(10, 0), 30);
        assert!(booked.overlaps(&TimeWindow::new(at(10, 15), 30)));
        assert!(booked.overlaps(&TimeWindow::new(at(9, 45), 30)));
        assert!(booked.overlaps(&TimeWindow::new(at(9, 0), 120)));
    }

    #[test]
    fn touching_windows_do_not_conflict() {
        let booked = TimeWindow::new(at(10, 0), 30);
        assert!(!booked.overlaps(&TimeWindow::new(at(10, 30), 30)));
        assert!(!booked.overlaps(&TimeWindow::new(at(9, 30), 30)));
    }

    #[test]
    fn only_open_interviews_move_forward() {
        assert!(InterviewStatus::Scheduled.can_transition_to(InterviewStatus::Confirmed));
        assert!(!InterviewStatus::Confirmed.can_transition_to(InterviewStatus::Scheduled));
        assert!(!InterviewStatus::Completed.can_transition_to(InterviewStatus::Cancelled));
        assert!(!InterviewStatus::Rescheduled.can_transition_to(InterviewStatus::Rescheduled));
        assert!(!InterviewStatus::Cancelled.occupies_time());
        assert!(InterviewStatus::Completed.occupies_time());
    }

    #[test]
    fn recommendations_deserialise_from_snake_case() {
        let parsed: Recommendation =
            serde_json::from_str("\"further_review\"").expect("known recommendation");
        assert_eq!(parsed, Recommendation::FurtherReview);
        assert!(serde_json::from_str::<Recommendation>("\"maybe\"").is_err());
    }
}
