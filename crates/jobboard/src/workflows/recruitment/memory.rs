//! Mutex-backed store and recording collaborators for demos, the HTTP service and tests.
//!
//! A single lock guards every table, which is what makes `commit_application` and
//! `book_interview` atomic.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::committee::domain::{Committee, Evaluation, EvaluationDraft, NewCommittee};
use super::domain::{
    ApplicantProfile, Application, ApplicationDocument, ApplicationId, ApplicationStatus,
    CommitteeId, Convocatoria, ConvocatoriaId, DocumentId, DocumentRequirement, DocumentType,
    EvaluationId, ExemptionId, InterviewId, LogEntryId, NewApplication, NewApplicationDocument,
    NewLogEntry, ReviewStatus, Timestamp, UserId, Vacancy, VacancyId, WorkflowLogEntry,
};
use super::exemptions::{ConvocatoriaExemption, Exemption, NewExemption};
use super::interviews::domain::{Booking, Interview, InterviewStatus};
use super::repository::{
    ApplicantDirectory, ApplicationChange, ApplicationRepository, AuditEntry, AuditError,
    AuditSink, BookingCheck, BookingError, CapabilityCheck, Clock, CommitteeRepository,
    DocumentRepository, EventError, EventPublisher, ExemptionRepository, InterviewRepository,
    Notification, NotificationError, NotificationQueue, RepositoryError, UserLookup,
    VacancyCatalog, WorkflowEvent,
};

#[derive(Default)]
struct StoreState {
    sequence: u64,
    vacancies: BTreeMap<VacancyId, Vacancy>,
    convocatorias: BTreeMap<ConvocatoriaId, Convocatoria>,
    document_types: Vec<DocumentType>,
    requirements: Vec<DocumentRequirement>,
    profiles: BTreeMap<UserId, ApplicantProfile>,
    applications: BTreeMap<ApplicationId, Application>,
    workflow_log: Vec<WorkflowLogEntry>,
    exemptions: BTreeMap<ExemptionId, Exemption>,
    convocatoria_exemptions: Vec<ConvocatoriaExemption>,
    documents: BTreeMap<DocumentId, ApplicationDocument>,
    interviews: BTreeMap<InterviewId, Interview>,
    committees: BTreeMap<CommitteeId, Committee>,
    evaluations: BTreeMap<EvaluationId, Evaluation>,
}

impl StoreState {
    fn next_id(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    fn append_log(&mut self, application: ApplicationId, entry: NewLogEntry) {
        let id = LogEntryId(self.next_id());
        self.workflow_log.push(WorkflowLogEntry {
            id,
            application_id: application,
            from_status: entry.from_status,
            to_status: entry.to_status,
            actor_id: entry.actor_id,
            comments: entry.comments,
            created_at: entry.created_at,
        });
    }
}

#[derive(Default, Clone)]
pub struct InMemoryRecruitmentStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryRecruitmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn seed_convocatoria(&self, convocatoria: Convocatoria) {
        self.state()
            .convocatorias
            .insert(convocatoria.id, convocatoria);
    }

    pub fn seed_vacancy(&self, vacancy: Vacancy) {
        self.state().vacancies.insert(vacancy.id, vacancy);
    }

    /// Replaces an existing type with the same code.
    pub fn seed_document_type(&self, document_type: DocumentType) {
        let mut state = self.state();
        state
            .document_types
            .retain(|existing| existing.code != document_type.code);
        state.document_types.push(document_type);
    }

    pub fn seed_requirement(&self, requirement: DocumentRequirement) {
        self.state().requirements.push(requirement);
    }

    pub fn seed_profile(&self, profile: ApplicantProfile) {
        self.state().profiles.insert(profile.user_id, profile);
    }

    pub fn applications(&self) -> Vec<Application> {
        self.state().applications.values().cloned().collect()
    }
}

impl VacancyCatalog for InMemoryRecruitmentStore {
    fn vacancy(&self, id: VacancyId) -> Result<Option<Vacancy>, RepositoryError> {
        Ok(self.state().vacancies.get(&id).cloned())
    }

    fn convocatoria(&self, id: ConvocatoriaId) -> Result<Option<Convocatoria>, RepositoryError> {
        Ok(self.state().convocatorias.get(&id).cloned())
    }

    fn document_types(&self) -> Result<Vec<DocumentType>, RepositoryError> {
        Ok(self.state().document_types.clone())
    }

    fn requirements_for(
        &self,
        vacancy: VacancyId,
    ) -> Result<Vec<DocumentRequirement>, RepositoryError> {
        Ok(self
            .state()
            .requirements
            .iter()
            .filter(|requirement| requirement.vacancy_id == vacancy)
            .cloned()
            .collect())
    }
}

impl ApplicantDirectory for InMemoryRecruitmentStore {
    fn applicant_profile(&self, user: UserId) -> Result<Option<ApplicantProfile>, RepositoryError> {
        Ok(self.state().profiles.get(&user).cloned())
    }

    fn find_user(&self, lookup: &UserLookup) -> Result<Option<UserId>, RepositoryError> {
        let state = self.state();
        let found = state.profiles.values().find(|profile| match lookup {
            UserLookup::Email(email) => profile.email.eq_ignore_ascii_case(email),
            UserLookup::Username(username) => profile.username == *username,
            UserLookup::IdNumber(number) => profile.id_number.as_deref() == Some(number.as_str()),
        });
        Ok(found.map(|profile| profile.user_id))
    }
}

impl ApplicationRepository for InMemoryRecruitmentStore {
    fn insert_application(
        &self,
        application: NewApplication,
        log_entry: NewLogEntry,
    ) -> Result<Application, RepositoryError> {
        let mut state = self.state();
        let duplicate = state.applications.values().any(|existing| {
            existing.vacancy_id == application.vacancy_id
                && existing.applicant_id == application.applicant_id
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }

        let id = ApplicationId(state.next_id());
        let record = Application {
            id,
            vacancy_id: application.vacancy_id,
            applicant_id: application.applicant_id,
            status: ApplicationStatus::Submitted,
            reviewer_id: None,
            consent: application.consent,
            is_exemption: application.is_exemption,
            exemption_reason: application.exemption_reason,
            decision: None,
            version: 1,
            time_created: application.time_created,
            time_modified: application.time_created,
        };
        state.applications.insert(id, record.clone());
        state.append_log(id, log_entry);
        Ok(record)
    }

    fn application(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError> {
        Ok(self.state().applications.get(&id).cloned())
    }

    fn applications_for_vacancy(
        &self,
        vacancy: VacancyId,
    ) -> Result<Vec<Application>, RepositoryError> {
        Ok(self
            .state()
            .applications
            .values()
            .filter(|application| application.vacancy_id == vacancy)
            .cloned()
            .collect())
    }

    fn commit_application(
        &self,
        change: ApplicationChange,
    ) -> Result<Application, RepositoryError> {
        let mut state = self.state();
        let id = change.application.id;
        let found = state
            .applications
            .get(&id)
            .map(|stored| stored.version)
            .ok_or(RepositoryError::NotFound)?;
        if found != change.expected_version {
            return Err(RepositoryError::StaleVersion {
                expected: change.expected_version,
                found,
            });
        }

        let mut record = change.application;
        record.version = found + 1;
        state.applications.insert(id, record.clone());
        if let Some(entry) = change.log_entry {
            state.append_log(id, entry);
        }
        Ok(record)
    }

    fn workflow_log(
        &self,
        application: ApplicationId,
    ) -> Result<Vec<WorkflowLogEntry>, RepositoryError> {
        Ok(self
            .state()
            .workflow_log
            .iter()
            .filter(|entry| entry.application_id == application)
            .cloned()
            .collect())
    }
}

impl ExemptionRepository for InMemoryRecruitmentStore {
    fn insert_exemption(&self, exemption: NewExemption) -> Result<Exemption, RepositoryError> {
        let mut state = self.state();
        let id = ExemptionId(state.next_id());
        let record = Exemption {
            id,
            user_id: exemption.user_id,
            exemption_type: exemption.exemption_type,
            document_ref: exemption.document_ref,
            notes: exemption.notes,
            valid_from: exemption.valid_from,
            valid_until: exemption.valid_until,
            created_by: exemption.created_by,
            time_created: exemption.time_created,
            time_revoked: None,
            revoked_by: None,
            revoke_reason: None,
        };
        state.exemptions.insert(id, record.clone());
        Ok(record)
    }

    fn exemption(&self, id: ExemptionId) -> Result<Option<Exemption>, RepositoryError> {
        Ok(self.state().exemptions.get(&id).cloned())
    }

    fn exemptions_for_user(&self, user: UserId) -> Result<Vec<Exemption>, RepositoryError> {
        Ok(self
            .state()
            .exemptions
            .values()
            .filter(|exemption| exemption.user_id == user)
            .cloned()
            .collect())
    }

    fn update_exemption(&self, exemption: Exemption) -> Result<(), RepositoryError> {
        let mut state = self.state();
        match state.exemptions.get_mut(&exemption.id) {
            Some(stored) => {
                *stored = exemption;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn insert_convocatoria_exemption(
        &self,
        exemption: ConvocatoriaExemption,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state();
        let duplicate = state.convocatoria_exemptions.iter().any(|existing| {
            existing.convocatoria_id == exemption.convocatoria_id
                && existing.document_code == exemption.document_code
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        state.convocatoria_exemptions.push(exemption);
        Ok(())
    }

    fn delete_convocatoria_exemption(
        &self,
        convocatoria: ConvocatoriaId,
        document_code: &str,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state();
        let before = state.convocatoria_exemptions.len();
        state.convocatoria_exemptions.retain(|existing| {
            !(existing.convocatoria_id == convocatoria && existing.document_code == document_code)
        });
        Ok(state.convocatoria_exemptions.len() != before)
    }

    fn convocatoria_exemptions(
        &self,
        convocatoria: ConvocatoriaId,
    ) -> Result<Vec<ConvocatoriaExemption>, RepositoryError> {
        Ok(self
            .state()
            .convocatoria_exemptions
            .iter()
            .filter(|exemption| exemption.convocatoria_id == convocatoria)
            .cloned()
            .collect())
    }
}

impl DocumentRepository for InMemoryRecruitmentStore {
    fn insert_document(
        &self,
        document: NewApplicationDocument,
    ) -> Result<ApplicationDocument, RepositoryError> {
        let mut state = self.state();
        let id = DocumentId(state.next_id());
        let record = ApplicationDocument {
            id,
            application_id: document.application_id,
            applicant_id: document.applicant_id,
            document_code: document.document_code,
            file_name: document.file_name,
            issue_date: document.issue_date,
            uploaded_at: document.uploaded_at,
            review_status: ReviewStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            rejection_reason: None,
        };
        state.documents.insert(id, record.clone());
        Ok(record)
    }

    fn document(&self, id: DocumentId) -> Result<Option<ApplicationDocument>, RepositoryError> {
        Ok(self.state().documents.get(&id).cloned())
    }

    fn update_document(&self, document: ApplicationDocument) -> Result<(), RepositoryError> {
        let mut state = self.state();
        match state.documents.get_mut(&document.id) {
            Some(stored) => {
                *stored = document;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn documents_for_application(
        &self,
        application: ApplicationId,
    ) -> Result<Vec<ApplicationDocument>, RepositoryError> {
        Ok(self
            .state()
            .documents
            .values()
            .filter(|document| document.application_id == application)
            .cloned()
            .collect())
    }

    fn documents_for_applicant(
        &self,
        applicant: UserId,
    ) -> Result<Vec<ApplicationDocument>, RepositoryError> {
        Ok(self
            .state()
            .documents
            .values()
            .filter(|document| document.applicant_id == applicant)
            .cloned()
            .collect())
    }
}

impl InterviewRepository for InMemoryRecruitmentStore {
    fn interview(&self, id: InterviewId) -> Result<Option<Interview>, RepositoryError> {
        Ok(self.state().interviews.get(&id).cloned())
    }

    fn interviews_for_application(
        &self,
        application: ApplicationId,
    ) -> Result<Vec<Interview>, RepositoryError> {
        Ok(self
            .state()
            .interviews
            .values()
            .filter(|interview| interview.application_id == application)
            .cloned()
            .collect())
    }

    fn interviews_for_interviewer(
        &self,
        interviewer: UserId,
    ) -> Result<Vec<Interview>, RepositoryError> {
        Ok(self
            .state()
            .interviews
            .values()
            .filter(|interview| interview.interviewers.contains(&interviewer))
            .cloned()
            .collect())
    }

    fn book_interview(
        &self,
        booking: Booking,
        check: &BookingCheck<'_>,
    ) -> Result<Interview, BookingError> {
        let mut state = self.state();
        let requested = &booking.interview.interviewers;
        let existing: Vec<Interview> = state
            .interviews
            .values()
            .filter(|interview| interview.shares_interviewer(requested).is_some())
            .cloned()
            .collect();
        check(&existing)?;

        if let Some(supersede) = &booking.supersedes {
            let original = state
                .interviews
                .get_mut(&supersede.interview_id)
                .ok_or(RepositoryError::NotFound)?;
            if !original.status.can_transition_to(InterviewStatus::Rescheduled) {
                return Err(BookingError::Superseded(supersede.interview_id));
            }
            original.status = InterviewStatus::Rescheduled;
            original.time_modified = supersede.at;
            original.append_note(&supersede.note);
        }

        let id = InterviewId(state.next_id());
        let new = booking.interview;
        let interview = Interview {
            id,
            application_id: new.application_id,
            scheduled_at: new.scheduled_at,
            duration_minutes: new.duration_minutes,
            kind: new.kind,
            location: new.location,
            status: InterviewStatus::Scheduled,
            interviewers: new.interviewers,
            notes: new.notes,
            rating: None,
            feedback: None,
            recommendation: None,
            created_by: new.created_by,
            confirmed_at: None,
            completed_at: None,
            cancelled_at: None,
            time_created: new.time_created,
            time_modified: new.time_created,
        };
        state.interviews.insert(id, interview.clone());
        Ok(interview)
    }

    fn update_interview(&self, interview: Interview) -> Result<(), RepositoryError> {
        let mut state = self.state();
        match state.interviews.get_mut(&interview.id) {
            Some(stored) => {
                *stored = interview;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }
}

impl CommitteeRepository for InMemoryRecruitmentStore {
    fn insert_committee(&self, committee: NewCommittee) -> Result<Committee, RepositoryError> {
        let mut state = self.state();
        let duplicate = state
            .committees
            .values()
            .any(|existing| existing.active && existing.company_id == committee.company_id);
        if duplicate {
            return Err(RepositoryError::Conflict);
        }

        let id = CommitteeId(state.next_id());
        let record = Committee {
            id,
            company_id: committee.company_id,
            vacancy_id: committee.vacancy_id,
            name: committee.name,
            active: true,
            members: committee.members,
            time_created: committee.time_created,
        };
        state.committees.insert(id, record.clone());
        Ok(record)
    }

    fn committee(&self, id: CommitteeId) -> Result<Option<Committee>, RepositoryError> {
        Ok(self.state().committees.get(&id).cloned())
    }

    fn upsert_evaluation(&self, draft: EvaluationDraft) -> Result<Evaluation, RepositoryError> {
        let mut state = self.state();
        let existing = state.evaluations.values_mut().find(|evaluation| {
            evaluation.committee_id == draft.committee_id
                && evaluation.application_id == draft.application_id
                && evaluation.evaluator_id == draft.evaluator_id
        });
        if let Some(evaluation) = existing {
            evaluation.score = draft.score;
            evaluation.vote = draft.vote;
            evaluation.comments = draft.comments;
            evaluation.criteria = draft.criteria;
            evaluation.time_modified = draft.at;
            return Ok(evaluation.clone());
        }

        let id = EvaluationId(state.next_id());
        let evaluation = Evaluation {
            id,
            committee_id: draft.committee_id,
            application_id: draft.application_id,
            evaluator_id: draft.evaluator_id,
            score: draft.score,
            vote: draft.vote,
            comments: draft.comments,
            criteria: draft.criteria,
            time_created: draft.at,
            time_modified: draft.at,
        };
        state.evaluations.insert(id, evaluation.clone());
        Ok(evaluation)
    }

    fn evaluations(
        &self,
        committee: CommitteeId,
        application: ApplicationId,
    ) -> Result<Vec<Evaluation>, RepositoryError> {
        Ok(self
            .state()
            .evaluations
            .values()
            .filter(|evaluation| {
                evaluation.committee_id == committee && evaluation.application_id == application
            })
            .cloned()
            .collect())
    }

    fn evaluations_for_application(
        &self,
        application: ApplicationId,
    ) -> Result<Vec<Evaluation>, RepositoryError> {
        Ok(self
            .state()
            .evaluations
            .values()
            .filter(|evaluation| evaluation.application_id == application)
            .cloned()
            .collect())
    }
}

/// Notification queue that keeps every queued message.
#[derive(Default, Clone)]
pub struct RecordingNotifications {
    queued: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifications {
    pub fn queued(&self) -> Vec<Notification> {
        self.queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn templates_for(&self, user: UserId) -> Vec<String> {
        self.queued()
            .into_iter()
            .filter(|notification| notification.user_id == user)
            .map(|notification| notification.template)
            .collect()
    }
}

impl NotificationQueue for RecordingNotifications {
    fn queue(&self, notification: Notification) -> Result<(), NotificationError> {
        self.queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct RecordingAudit {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl RecordingAudit {
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn actions(&self) -> Vec<&'static str> {
        self.entries().iter().map(|entry| entry.action).collect()
    }
}

impl AuditSink for RecordingAudit {
    fn log(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct RecordingEvents {
    events: Arc<Mutex<Vec<WorkflowEvent>>>,
}

impl RecordingEvents {
    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl EventPublisher for RecordingEvents {
    fn publish(&self, event: WorkflowEvent) -> Result<(), EventError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        Ok(())
    }
}

/// Capability table keyed by user; `allow_all` grants everything to everyone.
#[derive(Default, Clone)]
pub struct StaticCapabilities {
    allow_all: bool,
    grants: Arc<Mutex<HashMap<UserId, BTreeSet<String>>>>,
}

impl StaticCapabilities {
    pub fn allow_all() -> Self {
        Self {
            allow_all: true,
            grants: Arc::default(),
        }
    }

    pub fn grant(&self, user: UserId, capability: &str) {
        self.grants
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(user)
            .or_default()
            .insert(capability.to_string());
    }
}

impl CapabilityCheck for StaticCapabilities {
    fn has_capability(&self, user: UserId, capability: &str) -> bool {
        self.allow_all
            || self
                .grants
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&user)
                .is_some_and(|granted| granted.contains(capability))
    }
}

/// Clock pinned to a settable instant.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Timestamp>>,
}

impl ManualClock {
    pub fn new(now: Timestamp) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn set(&self, now: Timestamp) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
