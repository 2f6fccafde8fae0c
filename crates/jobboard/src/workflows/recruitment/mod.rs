//! Application lifecycle and document requirement engine.
//!
//! Applications move through a fixed status graph, each applicant's document checklist is
//! resolved from vacancy requirements and exemptions, interviews are booked without
//! double-booking interviewers, and committees score and rank candidates. Persistence and
//! outbound side effects are reached only through the traits in [`repository`].

pub mod committee;
pub mod context;
pub mod documents;
pub mod domain;
pub mod engine;
pub mod exemptions;
pub mod interviews;
pub mod lifecycle;
pub mod memory;
pub mod repository;
pub mod requirements;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use committee::{
    Committee, CommitteeError, CommitteeRecommendation, CommitteeRequest, CommitteeRole,
    CommitteeService, Evaluation, EvaluationInput, MemberRequest, RankingEntry, Vote,
    VoteSummary,
};
pub use context::Collaborators;
pub use documents::{
    Checklist, ChecklistItem, DocumentReviewError, DocumentReviewService, DocumentUpload,
    ReviewVerdict,
};
pub use domain::{
    ApplicantProfile, Application, ApplicationDocument, ApplicationId, ApplicationStatus,
    CommitteeId, CompanyId, Convocatoria, ConvocatoriaId, Decision, DecisionOutcome, DocumentCategory,
    DocumentId, DocumentRequirement, DocumentType, EvaluationId, ExemptionId, Gender,
    GenderCondition, InterviewId, ReviewStatus, Timestamp, UserId, Vacancy, VacancyId,
    VacancyListing, VacancyStatus, WorkflowLogEntry,
};
pub use engine::RecruitmentEngine;
pub use exemptions::{
    ConvocatoriaExemption, Exemption, ExemptionError, ExemptionGrant, ExemptionResolver,
    ExemptionType, RequiredDocuments,
};
pub use interviews::{
    Interview, InterviewKind, InterviewOutcomeSummary, InterviewRequest, InterviewResult,
    InterviewScheduler, InterviewStatus, Recommendation, SchedulingConflict, SchedulingError,
    TimeWindow,
};
pub use memory::{
    InMemoryRecruitmentStore, ManualClock, RecordingAudit, RecordingEvents,
    RecordingNotifications, StaticCapabilities,
};
pub use repository::{
    capabilities, ApplicantDirectory, ApplicationRepository, AuditEntry, AuditSink,
    CapabilityCheck, Clock, CommitteeRepository, DocumentRepository, EventPublisher,
    ExemptionRepository, InterviewRepository, Notification, NotificationQueue,
    RecruitmentStore, RepositoryError, SystemClock, UserLookup, VacancyCatalog, WorkflowEvent,
};
pub use requirements::{RequirementCalculator, RequirementError, RequirementView};
pub use router::{recruitment_router, ApiError, ACTOR_HEADER};
pub use service::{ApplicationService, ApplicationServiceError, ApplicationSubmission};
