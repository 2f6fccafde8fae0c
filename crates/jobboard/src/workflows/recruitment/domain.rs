use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp used across the engine; always UTC.
pub type Timestamp = DateTime<Utc>;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// Identifier for a submitted application.
    ApplicationId
);
record_id!(VacancyId);
record_id!(ConvocatoriaId);
record_id!(CompanyId);
record_id!(
    /// Platform user; applicants, reviewers and interviewers share this space.
    UserId
);
record_id!(ExemptionId);
record_id!(DocumentId);
record_id!(InterviewId);
record_id!(CommitteeId);
record_id!(EvaluationId);
record_id!(LogEntryId);

/// Recruitment campaign owning the application window of its vacancies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Convocatoria {
    pub id: ConvocatoriaId,
    pub code: String,
    pub name: String,
    pub opens_at: Timestamp,
    pub closes_at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VacancyStatus {
    Draft,
    Published,
    Closed,
    Assigned,
}

/// A single advertised position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vacancy {
    pub id: VacancyId,
    pub code: String,
    pub title: String,
    pub company_id: Option<CompanyId>,
    pub convocatoria_id: Option<ConvocatoriaId>,
    pub status: VacancyStatus,
}

/// Vacancy joined with its convocatoria so the application window can be derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VacancyListing {
    pub vacancy: Vacancy,
    pub convocatoria: Option<Convocatoria>,
}

impl VacancyListing {
    pub fn open_date(&self) -> Option<Timestamp> {
        self.convocatoria.as_ref().map(|conv| conv.opens_at)
    }

    pub fn close_date(&self) -> Option<Timestamp> {
        self.convocatoria.as_ref().map(|conv| conv.closes_at)
    }

    /// A vacancy without a convocatoria has no window and never accepts applications.
    pub fn accepts_applications_at(&self, now: Timestamp) -> bool {
        if self.vacancy.status != VacancyStatus::Published {
            return false;
        }
        match (self.open_date(), self.close_date()) {
            (Some(opens), Some(closes)) => opens <= now && now <= closes,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

/// Restricts a document type to applicants of one gender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenderCondition {
    #[default]
    Any,
    MaleOnly,
    FemaleOnly,
}

impl GenderCondition {
    /// Applicants without a recorded gender are not filtered out.
    pub fn admits(self, gender: Option<Gender>) -> bool {
        match (self, gender) {
            (GenderCondition::Any, _) | (_, None) => true,
            (GenderCondition::MaleOnly, Some(gender)) => gender == Gender::Male,
            (GenderCondition::FemaleOnly, Some(gender)) => gender == Gender::Female,
        }
    }
}

/// Applicant attributes that drive conditional document rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantProfile {
    pub user_id: UserId,
    pub email: String,
    pub username: String,
    pub id_number: Option<String>,
    pub gender: Option<Gender>,
    pub education_level: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

impl ApplicantProfile {
    pub fn age_on(&self, date: NaiveDate) -> Option<u32> {
        let birth = self.birth_date?;
        let mut years = date.year() - birth.year();
        if (date.month(), date.day()) < (birth.month(), birth.day()) {
            years -= 1;
        }
        u32::try_from(years).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    Identification,
    Academic,
    Employment,
    Background,
    Health,
    Financial,
    Other,
}

/// Catalog entry for a document applicants may have to provide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentType {
    pub code: String,
    pub name: String,
    pub category: DocumentCategory,
    pub enabled: bool,
    pub is_required: bool,
    pub gender_condition: GenderCondition,
    pub profession_exempt: BTreeSet<String>,
    pub age_exemption_threshold: Option<u32>,
    pub default_max_age_days: Option<u32>,
    pub accepted_formats: Vec<String>,
    pub sort_order: i32,
}

/// Per-vacancy override of a document type's defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRequirement {
    pub vacancy_id: VacancyId,
    pub document_code: String,
    pub is_required: bool,
    pub accepted_formats: Option<Vec<String>>,
    pub max_age_days: Option<u32>,
    pub sort_order: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Submitted,
    UnderReview,
    DocsValidated,
    DocsRejected,
    Interview,
    Selected,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 8] = [
        ApplicationStatus::Submitted,
        ApplicationStatus::UnderReview,
        ApplicationStatus::DocsValidated,
        ApplicationStatus::DocsRejected,
        ApplicationStatus::Interview,
        ApplicationStatus::Selected,
        ApplicationStatus::Rejected,
        ApplicationStatus::Withdrawn,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::UnderReview => "under_review",
            ApplicationStatus::DocsValidated => "docs_validated",
            ApplicationStatus::DocsRejected => "docs_rejected",
            ApplicationStatus::Interview => "interview",
            ApplicationStatus::Selected => "selected",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.label() == normalized)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Consent captured at submission time; never rewritten afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub text: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub accepted_at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOutcome {
    Selected,
    Rejected,
}

impl DecisionOutcome {
    pub const fn status(self) -> ApplicationStatus {
        match self {
            DecisionOutcome::Selected => ApplicationStatus::Selected,
            DecisionOutcome::Rejected => ApplicationStatus::Rejected,
        }
    }
}

/// Final hiring decision stamped onto an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub outcome: DecisionOutcome,
    pub decided_by: UserId,
    pub decided_at: Timestamp,
    pub comments: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub vacancy_id: VacancyId,
    pub applicant_id: UserId,
    pub status: ApplicationStatus,
    pub reviewer_id: Option<UserId>,
    pub consent: ConsentRecord,
    pub is_exemption: bool,
    pub exemption_reason: Option<String>,
    pub decision: Option<Decision>,
    /// Bumped on every committed change; used for optimistic concurrency.
    pub version: u64,
    pub time_created: Timestamp,
    pub time_modified: Timestamp,
}

/// Application fields supplied at submission, before the store assigns identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApplication {
    pub vacancy_id: VacancyId,
    pub applicant_id: UserId,
    pub consent: ConsentRecord,
    pub is_exemption: bool,
    pub exemption_reason: Option<String>,
    pub time_created: Timestamp,
}

/// Immutable record of one status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowLogEntry {
    pub id: LogEntryId,
    pub application_id: ApplicationId,
    pub from_status: Option<ApplicationStatus>,
    pub to_status: ApplicationStatus,
    pub actor_id: UserId,
    pub comments: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLogEntry {
    pub from_status: Option<ApplicationStatus>,
    pub to_status: ApplicationStatus,
    pub actor_id: UserId,
    pub comments: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
}

/// Metadata for an uploaded supporting document; file bytes live in external storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDocument {
    pub id: DocumentId,
    pub application_id: ApplicationId,
    pub applicant_id: UserId,
    pub document_code: String,
    pub file_name: String,
    pub issue_date: Option<NaiveDate>,
    pub uploaded_at: Timestamp,
    pub review_status: ReviewStatus,
    pub reviewed_by: Option<UserId>,
    pub reviewed_at: Option<Timestamp>,
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApplicationDocument {
    pub application_id: ApplicationId,
    pub applicant_id: UserId,
    pub document_code: String,
    pub file_name: String,
    pub issue_date: Option<NaiveDate>,
    pub uploaded_at: Timestamp,
}
