use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::Deserialize;
use tracing::{info, warn};

use super::super::context::Collaborators;
use super::super::domain::{
    Application, ApplicationId, ApplicationStatus, InterviewId, Timestamp, UserId,
};
use super::super::repository::{
    capabilities, AuditEntry, BookingError, Notification, RecruitmentStore, RepositoryError,
    WorkflowEvent,
};
use super::super::service::{ApplicationService, ApplicationServiceError};
use super::conflict::{detect_conflict, free_slots, SchedulingConflict};
use super::domain::{
    Booking, Interview, InterviewKind, InterviewOutcomeSummary, InterviewStatus, NewInterview,
    Recommendation, Supersede, TimeWindow,
};
use crate::config::EngineConfig;

const MAX_DURATION_MINUTES: u32 = 480;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InterviewRequest {
    pub application_id: ApplicationId,
    pub scheduled_at: Timestamp,
    /// Falls back to the configured default length.
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    pub kind: InterviewKind,
    #[serde(default)]
    pub location: Option<String>,
    pub interviewers: Vec<UserId>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InterviewResult {
    pub rating: u8,
    #[serde(default)]
    pub feedback: String,
    pub recommendation: Recommendation,
}

/// Books interviews, serialising conflict checks through the store.
pub struct InterviewScheduler<S: ?Sized> {
    store: Arc<S>,
    collaborators: Collaborators,
    applications: ApplicationService<S>,
    default_minutes: u32,
    workday_start_hour: u32,
    workday_end_hour: u32,
}

impl<S: ?Sized> Clone for InterviewScheduler<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            collaborators: self.collaborators.clone(),
            applications: self.applications.clone(),
            default_minutes: self.default_minutes,
            workday_start_hour: self.workday_start_hour,
            workday_end_hour: self.workday_end_hour,
        }
    }
}

impl<S> InterviewScheduler<S>
where
    S: RecruitmentStore + ?Sized,
{
    pub fn new(
        store: Arc<S>,
        collaborators: Collaborators,
        applications: ApplicationService<S>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            store,
            collaborators,
            applications,
            default_minutes: config.default_interview_minutes,
            workday_start_hour: config.workday_start_hour,
            workday_end_hour: config.workday_end_hour,
        }
    }

    /// Book an interview and move the application into `interview`.
    pub fn schedule(
        &self,
        request: InterviewRequest,
        actor: UserId,
    ) -> Result<Interview, SchedulingError> {
        self.require(actor)?;
        let duration = self.validate_duration(request.duration_minutes)?;
        let interviewers = normalise_interviewers(request.interviewers)?;
        let application = self.schedulable_application(request.application_id)?;

        let now = self.collaborators.now();
        let booking = Booking {
            interview: NewInterview {
                application_id: application.id,
                scheduled_at: request.scheduled_at,
                duration_minutes: duration,
                kind: request.kind,
                location: clean(request.location),
                interviewers,
                notes: request.notes.trim().to_string(),
                created_by: actor,
                time_created: now,
            },
            supersedes: None,
        };
        let interview = self.book(booking, None)?;

        if application.status == ApplicationStatus::DocsValidated {
            if let Err(err) = self.applications.transition(
                application.id,
                ApplicationStatus::Interview,
                "Interview scheduled",
                actor,
            ) {
                // A concurrent first booking may already have moved it.
                if !self.in_interview(application.id) {
                    self.release(
                        &interview,
                        "Booking released: application could not move to interview",
                        actor,
                    );
                    return Err(err.into());
                }
            }
        }

        info!(
            interview = %interview.id,
            application = %application.id,
            window = %interview.window(),
            "interview scheduled"
        );
        self.collaborators.publish(WorkflowEvent::InterviewScheduled {
            interview_id: interview.id,
            application_id: application.id,
            at: now,
        });
        self.audit("interview_scheduled", &interview, actor, None);
        self.notify(&application, &interview, "interview_scheduled");
        Ok(interview)
    }

    /// Flip the interview to `rescheduled` and book a sibling row at the new time.
    pub fn reschedule(
        &self,
        id: InterviewId,
        new_time: Timestamp,
        new_duration: Option<u32>,
        reason: &str,
        actor: UserId,
    ) -> Result<Interview, SchedulingError> {
        self.require(actor)?;
        let original = self.interview(id)?;
        ensure_transition(&original, InterviewStatus::Rescheduled, "rescheduled")?;
        let duration = match new_duration {
            Some(minutes) => self.validate_duration(Some(minutes))?,
            None => original.duration_minutes,
        };
        let application = self.schedulable_application(original.application_id)?;

        let now = self.collaborators.now();
        let reason = reason.trim();
        let booking = Booking {
            interview: NewInterview {
                application_id: original.application_id,
                scheduled_at: new_time,
                duration_minutes: duration,
                kind: original.kind,
                location: original.location.clone(),
                interviewers: original.interviewers.clone(),
                notes: format!("Rescheduled from interview #{}: {reason}", original.id),
                created_by: actor,
                time_created: now,
            },
            supersedes: Some(Supersede {
                interview_id: original.id,
                note: format!("Rescheduled: {reason}"),
                at: now,
            }),
        };
        let interview = self.book(booking, Some(original.id))?;

        info!(
            previous = %original.id,
            interview = %interview.id,
            window = %interview.window(),
            "interview rescheduled"
        );
        self.collaborators.publish(WorkflowEvent::InterviewRescheduled {
            previous: original.id,
            interview_id: interview.id,
            application_id: interview.application_id,
            at: now,
        });
        self.audit(
            "interview_rescheduled",
            &interview,
            actor,
            Some(serde_json::json!({ "previous": original.id, "reason": reason })),
        );
        self.notify(&application, &interview, "interview_rescheduled");
        Ok(interview)
    }

    pub fn cancel(
        &self,
        id: InterviewId,
        reason: &str,
        actor: UserId,
    ) -> Result<Interview, SchedulingError> {
        self.require(actor)?;
        let mut interview = self.interview(id)?;
        ensure_transition(&interview, InterviewStatus::Cancelled, "cancelled")?;

        let now = self.collaborators.now();
        interview.status = InterviewStatus::Cancelled;
        interview.cancelled_at = Some(now);
        interview.time_modified = now;
        interview.append_note(&format!("Cancelled: {}", reason.trim()));
        self.store.update_interview(interview.clone())?;

        info!(interview = %id, "interview cancelled");
        self.collaborators.publish(WorkflowEvent::InterviewCancelled {
            interview_id: id,
            application_id: interview.application_id,
            at: now,
        });
        self.audit(
            "interview_cancelled",
            &interview,
            actor,
            Some(serde_json::json!({ "reason": reason.trim() })),
        );
        if let Some(application) = self.store.application(interview.application_id)? {
            self.notify(&application, &interview, "interview_cancelled");
        }
        Ok(interview)
    }

    pub fn complete(
        &self,
        id: InterviewId,
        result: InterviewResult,
        actor: UserId,
    ) -> Result<Interview, SchedulingError> {
        self.require(actor)?;
        if !(1..=5).contains(&result.rating) {
            return Err(SchedulingError::InvalidRating(result.rating));
        }
        let mut interview = self.interview(id)?;
        ensure_transition(&interview, InterviewStatus::Completed, "completed")?;

        let now = self.collaborators.now();
        interview.status = InterviewStatus::Completed;
        interview.rating = Some(result.rating);
        interview.feedback = Some(result.feedback.trim().to_string()).filter(|f| !f.is_empty());
        interview.recommendation = Some(result.recommendation);
        interview.completed_at = Some(now);
        interview.time_modified = now;
        self.store.update_interview(interview.clone())?;

        info!(interview = %id, rating = result.rating, "interview completed");
        self.collaborators.publish(WorkflowEvent::InterviewCompleted {
            interview_id: id,
            application_id: interview.application_id,
            at: now,
        });
        self.audit(
            "interview_completed",
            &interview,
            actor,
            Some(serde_json::json!({ "recommendation": result.recommendation })),
        );
        Ok(interview)
    }

    /// Only the applicant who owns the application may confirm.
    pub fn confirm(&self, id: InterviewId, actor: UserId) -> Result<Interview, SchedulingError> {
        let mut interview = self.interview(id)?;
        let application = self.applications.get_required(interview.application_id)?;
        if application.applicant_id != actor {
            return Err(SchedulingError::NotApplicant {
                interview: id,
                user: actor,
            });
        }
        if interview.status != InterviewStatus::Scheduled {
            return Err(SchedulingError::InvalidInterviewState {
                interview: id,
                status: interview.status,
                action: "confirmed",
            });
        }

        let now = self.collaborators.now();
        interview.status = InterviewStatus::Confirmed;
        interview.confirmed_at = Some(now);
        interview.time_modified = now;
        self.store.update_interview(interview.clone())?;

        info!(interview = %id, "interview confirmed");
        self.audit("interview_confirmed", &interview, actor, None);
        Ok(interview)
    }

    pub fn mark_noshow(&self, id: InterviewId, actor: UserId) -> Result<Interview, SchedulingError> {
        self.require(actor)?;
        let mut interview = self.interview(id)?;
        ensure_transition(&interview, InterviewStatus::NoShow, "marked as no-show")?;

        interview.status = InterviewStatus::NoShow;
        interview.time_modified = self.collaborators.now();
        self.store.update_interview(interview.clone())?;

        info!(interview = %id, "interview marked as no-show");
        self.audit("interview_noshow", &interview, actor, None);
        Ok(interview)
    }

    pub fn interview(&self, id: InterviewId) -> Result<Interview, SchedulingError> {
        self.store
            .interview(id)?
            .ok_or(SchedulingError::InterviewNotFound(id))
    }

    pub fn outcomes(
        &self,
        application: ApplicationId,
    ) -> Result<InterviewOutcomeSummary, SchedulingError> {
        let interviews = self.store.interviews_for_application(application)?;
        Ok(summarise(&interviews))
    }

    /// Interviews holding `interviewer`'s time inside `[from, to)`, earliest first.
    pub fn agenda(
        &self,
        interviewer: UserId,
        from: Timestamp,
        to: Timestamp,
    ) -> Result<Vec<Interview>, SchedulingError> {
        let range = TimeWindow {
            start: from,
            end: to,
        };
        let mut interviews: Vec<Interview> = self
            .store
            .interviews_for_interviewer(interviewer)?
            .into_iter()
            .filter(|interview| interview.status.occupies_time())
            .filter(|interview| interview.window().overlaps(&range))
            .collect();
        interviews.sort_by_key(|interview| (interview.scheduled_at, interview.id));
        Ok(interviews)
    }

    /// Free slots for `interviewer` within the configured workday (UTC).
    pub fn available_slots(
        &self,
        interviewer: UserId,
        day: NaiveDate,
        slot_minutes: Option<u32>,
    ) -> Result<Vec<TimeWindow>, SchedulingError> {
        let minutes = self.validate_duration(slot_minutes)?;
        let Some(start) = NaiveTime::from_hms_opt(self.workday_start_hour, 0, 0) else {
            return Ok(Vec::new());
        };
        let day_start = day.and_time(start).and_utc();
        let day_end = day_start
            + Duration::hours(i64::from(
                self.workday_end_hour.saturating_sub(self.workday_start_hour),
            ));

        let busy: Vec<TimeWindow> = self
            .agenda(interviewer, day_start, day_end)?
            .iter()
            .map(Interview::window)
            .collect();
        Ok(free_slots(&busy, day_start, day_end, minutes))
    }

    fn book(
        &self,
        booking: Booking,
        exclude: Option<InterviewId>,
    ) -> Result<Interview, SchedulingError> {
        let window = booking.interview.window();
        let interviewers = booking.interview.interviewers.clone();
        let check = |existing: &[Interview]| -> Result<(), SchedulingConflict> {
            detect_conflict(existing, &window, &interviewers, exclude)
        };

        match self.store.book_interview(booking, &check) {
            Ok(interview) => Ok(interview),
            Err(BookingError::Conflict(conflict)) => {
                warn!(
                    interviewer = %conflict.interviewer,
                    blocking = %conflict.interview_id,
                    %window,
                    "interview booking rejected"
                );
                Err(SchedulingError::Conflict(conflict))
            }
            Err(BookingError::Superseded(id)) => Err(SchedulingError::Superseded(id)),
            Err(BookingError::Repository(err)) => Err(err.into()),
        }
    }

    /// Compensate a booking whose application transition failed.
    pub(crate) fn release(&self, interview: &Interview, note: &str, actor: UserId) {
        let now = self.collaborators.now();
        let mut released = interview.clone();
        released.status = InterviewStatus::Cancelled;
        released.cancelled_at = Some(now);
        released.time_modified = now;
        released.append_note(note);
        if let Err(err) = self.store.update_interview(released.clone()) {
            warn!(interview = %interview.id, error = %err, "failed to release interview booking");
            return;
        }
        self.audit(
            "interview_cancelled",
            &released,
            actor,
            Some(serde_json::json!({ "reason": note })),
        );
    }

    fn in_interview(&self, id: ApplicationId) -> bool {
        matches!(
            self.store.application(id),
            Ok(Some(application)) if application.status == ApplicationStatus::Interview
        )
    }

    fn schedulable_application(&self, id: ApplicationId) -> Result<Application, SchedulingError> {
        let application = self
            .store
            .application(id)?
            .ok_or(SchedulingError::ApplicationNotFound(id))?;
        match application.status {
            ApplicationStatus::DocsValidated | ApplicationStatus::Interview => Ok(application),
            status => Err(SchedulingError::ApplicationNotSchedulable {
                application: id,
                status,
            }),
        }
    }

    fn validate_duration(&self, minutes: Option<u32>) -> Result<u32, SchedulingError> {
        let minutes = minutes.unwrap_or(self.default_minutes);
        if (1..=MAX_DURATION_MINUTES).contains(&minutes) {
            Ok(minutes)
        } else {
            Err(SchedulingError::InvalidDuration(minutes))
        }
    }

    fn notify(&self, application: &Application, interview: &Interview, template: &str) {
        let mut data = BTreeMap::new();
        data.insert("application_id".to_string(), application.id.to_string());
        data.insert("interview_id".to_string(), interview.id.to_string());
        data.insert("scheduled_at".to_string(), interview.scheduled_at.to_rfc3339());
        data.insert(
            "duration_minutes".to_string(),
            interview.duration_minutes.to_string(),
        );
        if let Some(location) = &interview.location {
            data.insert("location".to_string(), location.clone());
        }
        self.collaborators.notify(Notification {
            user_id: application.applicant_id,
            template: template.to_string(),
            data,
        });
    }

    fn audit(
        &self,
        action: &'static str,
        interview: &Interview,
        actor: UserId,
        extra: Option<serde_json::Value>,
    ) {
        self.collaborators.audit(AuditEntry {
            action,
            entity_type: "interview",
            entity_id: interview.id.0,
            actor: Some(actor),
            extra,
        });
    }

    fn require(&self, actor: UserId) -> Result<(), SchedulingError> {
        if self
            .collaborators
            .has_capability(actor, capabilities::MANAGE_INTERVIEWS)
        {
            Ok(())
        } else {
            Err(SchedulingError::PermissionDenied {
                user: actor,
                capability: capabilities::MANAGE_INTERVIEWS,
            })
        }
    }
}

fn ensure_transition(
    interview: &Interview,
    target: InterviewStatus,
    action: &'static str,
) -> Result<(), SchedulingError> {
    if interview.status.can_transition_to(target) {
        Ok(())
    } else {
        Err(SchedulingError::InvalidInterviewState {
            interview: interview.id,
            status: interview.status,
            action,
        })
    }
}

fn normalise_interviewers(interviewers: Vec<UserId>) -> Result<Vec<UserId>, SchedulingError> {
    let mut unique = Vec::with_capacity(interviewers.len());
    for interviewer in interviewers {
        if !unique.contains(&interviewer) {
            unique.push(interviewer);
        }
    }
    if unique.is_empty() {
        return Err(SchedulingError::NoInterviewers);
    }
    Ok(unique)
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub(crate) fn summarise(interviews: &[Interview]) -> InterviewOutcomeSummary {
    let mut summary = InterviewOutcomeSummary {
        total: interviews.len(),
        ..InterviewOutcomeSummary::default()
    };
    let mut ratings = Vec::new();
    let mut latest: Option<&Interview> = None;

    for interview in interviews {
        match interview.status {
            InterviewStatus::Scheduled | InterviewStatus::Confirmed => summary.scheduled += 1,
            InterviewStatus::Completed => summary.completed += 1,
            InterviewStatus::Cancelled => summary.cancelled += 1,
            InterviewStatus::Rescheduled => summary.rescheduled += 1,
            InterviewStatus::NoShow => summary.no_show += 1,
        }
        if interview.status != InterviewStatus::Completed {
            continue;
        }
        if let Some(rating) = interview.rating {
            ratings.push(f64::from(rating));
        }
        match interview.recommendation {
            Some(Recommendation::Hire) => summary.hire += 1,
            Some(Recommendation::Reject) => summary.reject += 1,
            Some(Recommendation::FurtherReview) => summary.further_review += 1,
            None => {}
        }
        if interview.recommendation.is_some()
            && latest.map_or(true, |current| interview.completed_at > current.completed_at)
        {
            latest = Some(interview);
        }
    }

    if !ratings.is_empty() {
        let total: f64 = ratings.iter().sum();
        summary.average_rating = Some(total / ratings.len() as f64);
    }
    summary.latest_recommendation = latest.and_then(|interview| interview.recommendation);
    summary
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("user {user} lacks capability {capability}")]
    PermissionDenied {
        user: UserId,
        capability: &'static str,
    },
    #[error("application {0} not found")]
    ApplicationNotFound(ApplicationId),
    #[error("interview {0} not found")]
    InterviewNotFound(InterviewId),
    #[error("application {application} is {status}; interviews need docs_validated or interview")]
    ApplicationNotSchedulable {
        application: ApplicationId,
        status: ApplicationStatus,
    },
    #[error("at least one interviewer is required")]
    NoInterviewers,
    #[error("interview duration must be between 1 and 480 minutes (got {0})")]
    InvalidDuration(u32),
    #[error("rating must be between 1 and 5 (got {0})")]
    InvalidRating(u8),
    #[error("interview {interview} cannot be {action} while {status}")]
    InvalidInterviewState {
        interview: InterviewId,
        status: InterviewStatus,
        action: &'static str,
    },
    #[error("user {user} is not the applicant for interview {interview}")]
    NotApplicant { interview: InterviewId, user: UserId },
    #[error(transparent)]
    Conflict(#[from] SchedulingConflict),
    #[error("interview {0} changed before it could be rescheduled")]
    Superseded(InterviewId),
    #[error(transparent)]
    Application(#[from] ApplicationServiceError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
