use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::committee::domain::{Committee, Evaluation, EvaluationDraft, NewCommittee};
use super::domain::{
    ApplicantProfile, Application, ApplicationDocument, ApplicationId, ApplicationStatus,
    CommitteeId, Convocatoria, ConvocatoriaId, DocumentId, DocumentRequirement, DocumentType,
    ExemptionId, InterviewId, NewApplication, NewApplicationDocument, NewLogEntry, Timestamp,
    UserId, Vacancy, VacancyId, WorkflowLogEntry,
};
use super::exemptions::{ConvocatoriaExemption, Exemption, NewExemption};
use super::interviews::conflict::SchedulingConflict;
use super::interviews::domain::{Booking, Interview};

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("record was modified concurrently (expected version {expected}, found {found})")]
    StaleVersion { expected: u64, found: u64 },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Read-only view of the vacancy catalog owned by the admin screens.
pub trait VacancyCatalog: Send + Sync {
    fn vacancy(&self, id: VacancyId) -> Result<Option<Vacancy>, RepositoryError>;
    fn convocatoria(&self, id: ConvocatoriaId) -> Result<Option<Convocatoria>, RepositoryError>;
    fn document_types(&self) -> Result<Vec<DocumentType>, RepositoryError>;
    fn requirements_for(
        &self,
        vacancy: VacancyId,
    ) -> Result<Vec<DocumentRequirement>, RepositoryError>;
}

/// User identifiers accepted by the exemption import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserLookup {
    Email(String),
    Username(String),
    IdNumber(String),
}

pub trait ApplicantDirectory: Send + Sync {
    fn applicant_profile(&self, user: UserId) -> Result<Option<ApplicantProfile>, RepositoryError>;
    fn find_user(&self, lookup: &UserLookup) -> Result<Option<UserId>, RepositoryError>;
}

/// A status change to persist together with its workflow-log entry.
#[derive(Debug, Clone)]
pub struct ApplicationChange {
    pub application: Application,
    pub expected_version: u64,
    pub log_entry: Option<NewLogEntry>,
}

pub trait ApplicationRepository: Send + Sync {
    /// Fails with `Conflict` when the applicant already applied to the vacancy.
    fn insert_application(
        &self,
        application: NewApplication,
        log_entry: NewLogEntry,
    ) -> Result<Application, RepositoryError>;
    fn application(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError>;
    fn applications_for_vacancy(
        &self,
        vacancy: VacancyId,
    ) -> Result<Vec<Application>, RepositoryError>;
    /// Atomically compare `expected_version`, store the new state, and append the log entry.
    fn commit_application(&self, change: ApplicationChange)
        -> Result<Application, RepositoryError>;
    fn workflow_log(
        &self,
        application: ApplicationId,
    ) -> Result<Vec<WorkflowLogEntry>, RepositoryError>;
}

pub trait ExemptionRepository: Send + Sync {
    fn insert_exemption(&self, exemption: NewExemption) -> Result<Exemption, RepositoryError>;
    fn exemption(&self, id: ExemptionId) -> Result<Option<Exemption>, RepositoryError>;
    fn exemptions_for_user(&self, user: UserId) -> Result<Vec<Exemption>, RepositoryError>;
    fn update_exemption(&self, exemption: Exemption) -> Result<(), RepositoryError>;
    /// Fails with `Conflict` when the (convocatoria, document) pair already exists.
    fn insert_convocatoria_exemption(
        &self,
        exemption: ConvocatoriaExemption,
    ) -> Result<(), RepositoryError>;
    fn delete_convocatoria_exemption(
        &self,
        convocatoria: ConvocatoriaId,
        document_code: &str,
    ) -> Result<bool, RepositoryError>;
    fn convocatoria_exemptions(
        &self,
        convocatoria: ConvocatoriaId,
    ) -> Result<Vec<ConvocatoriaExemption>, RepositoryError>;
}

pub trait DocumentRepository: Send + Sync {
    fn insert_document(
        &self,
        document: NewApplicationDocument,
    ) -> Result<ApplicationDocument, RepositoryError>;
    fn document(&self, id: DocumentId) -> Result<Option<ApplicationDocument>, RepositoryError>;
    fn update_document(&self, document: ApplicationDocument) -> Result<(), RepositoryError>;
    fn documents_for_application(
        &self,
        application: ApplicationId,
    ) -> Result<Vec<ApplicationDocument>, RepositoryError>;
    fn documents_for_applicant(
        &self,
        applicant: UserId,
    ) -> Result<Vec<ApplicationDocument>, RepositoryError>;
}

/// Booking failure raised from inside the store's critical section.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error(transparent)]
    Conflict(#[from] SchedulingConflict),
    #[error("interview {0} can no longer be rescheduled")]
    Superseded(InterviewId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Conflict check the engine hands to the store; receives every interview that
/// shares an interviewer with the booking.
pub type BookingCheck<'a> = dyn Fn(&[Interview]) -> Result<(), SchedulingConflict> + 'a;

pub trait InterviewRepository: Send + Sync {
    fn interview(&self, id: InterviewId) -> Result<Option<Interview>, RepositoryError>;
    fn interviews_for_application(
        &self,
        application: ApplicationId,
    ) -> Result<Vec<Interview>, RepositoryError>;
    fn interviews_for_interviewer(
        &self,
        interviewer: UserId,
    ) -> Result<Vec<Interview>, RepositoryError>;
    /// Serialise per interviewer: run `check`, flip any superseded row, and insert.
    fn book_interview(
        &self,
        booking: Booking,
        check: &BookingCheck<'_>,
    ) -> Result<Interview, BookingError>;
    fn update_interview(&self, interview: Interview) -> Result<(), RepositoryError>;
}

pub trait CommitteeRepository: Send + Sync {
    /// Fails with `Conflict` when the company already has an active committee.
    fn insert_committee(&self, committee: NewCommittee) -> Result<Committee, RepositoryError>;
    fn committee(&self, id: CommitteeId) -> Result<Option<Committee>, RepositoryError>;
    /// Insert or update keyed by (committee, application, evaluator).
    fn upsert_evaluation(&self, draft: EvaluationDraft) -> Result<Evaluation, RepositoryError>;
    fn evaluations(
        &self,
        committee: CommitteeId,
        application: ApplicationId,
    ) -> Result<Vec<Evaluation>, RepositoryError>;
    fn evaluations_for_application(
        &self,
        application: ApplicationId,
    ) -> Result<Vec<Evaluation>, RepositoryError>;
}

/// Every persistence concern the engine touches.
pub trait RecruitmentStore:
    VacancyCatalog
    + ApplicantDirectory
    + ApplicationRepository
    + ExemptionRepository
    + DocumentRepository
    + InterviewRepository
    + CommitteeRepository
{
}

impl<T> RecruitmentStore for T where
    T: VacancyCatalog
        + ApplicantDirectory
        + ApplicationRepository
        + ExemptionRepository
        + DocumentRepository
        + InterviewRepository
        + CommitteeRepository
{
}

/// Templated message for the notification subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: UserId,
    pub template: String,
    pub data: BTreeMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification queue unavailable: {0}")]
    Transport(String),
}

/// Fire-and-forget queue; delivery is not the engine's concern.
pub trait NotificationQueue: Send + Sync {
    fn queue(&self, notification: Notification) -> Result<(), NotificationError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub action: &'static str,
    pub entity_type: &'static str,
    pub entity_id: u64,
    pub actor: Option<UserId>,
    pub extra: Option<serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

pub trait AuditSink: Send + Sync {
    fn log(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

/// Outbound domain events for integrations.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    ApplicationSubmitted {
        application_id: ApplicationId,
        vacancy_id: VacancyId,
        applicant_id: UserId,
        at: Timestamp,
    },
    StatusChanged {
        application_id: ApplicationId,
        from: ApplicationStatus,
        to: ApplicationStatus,
        actor_id: UserId,
        at: Timestamp,
    },
    InterviewScheduled {
        interview_id: InterviewId,
        application_id: ApplicationId,
        at: Timestamp,
    },
    InterviewRescheduled {
        previous: InterviewId,
        interview_id: InterviewId,
        application_id: ApplicationId,
        at: Timestamp,
    },
    InterviewCancelled {
        interview_id: InterviewId,
        application_id: ApplicationId,
        at: Timestamp,
    },
    InterviewCompleted {
        interview_id: InterviewId,
        application_id: ApplicationId,
        at: Timestamp,
    },
    EvaluationRecorded {
        committee_id: CommitteeId,
        application_id: ApplicationId,
        evaluator_id: UserId,
        at: Timestamp,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("event transport unavailable: {0}")]
    Transport(String),
}

pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: WorkflowEvent) -> Result<(), EventError>;
}

/// Opaque permission oracle.
pub trait CapabilityCheck: Send + Sync {
    fn has_capability(&self, user: UserId, capability: &str) -> bool;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now()
    }
}

pub mod capabilities {
    pub const CHANGE_STATUS: &str = "local/jobboard:changestatus";
    pub const REVIEW_DOCUMENTS: &str = "local/jobboard:reviewdocuments";
    pub const MANAGE_INTERVIEWS: &str = "local/jobboard:manageinterviews";
    pub const MANAGE_EXEMPTIONS: &str = "local/jobboard:manageexemptions";
    pub const MANAGE_COMMITTEES: &str = "local/jobboard:managecommittees";
}
