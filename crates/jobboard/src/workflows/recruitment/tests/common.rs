use std::collections::BTreeSet;
use std::sync::Arc;

use axum::response::Response;
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::config::EngineConfig;
use crate::workflows::recruitment::exemptions::codes;
use crate::workflows::recruitment::{
    capabilities, ApplicantProfile, Application, ApplicationStatus, ApplicationSubmission,
    Collaborators, Convocatoria, ConvocatoriaId, DocumentCategory, DocumentType, Exemption,
    ExemptionGrant, ExemptionType, Gender, GenderCondition, InMemoryRecruitmentStore, Interview,
    InterviewKind, InterviewRequest, ManualClock, RecordingAudit, RecordingEvents,
    RecordingNotifications, RecruitmentEngine, StaticCapabilities, Timestamp, UserId, Vacancy,
    VacancyId, VacancyStatus,
};

pub(super) const VACANCY: VacancyId = VacancyId(10);
pub(super) const ORPHAN_VACANCY: VacancyId = VacancyId(11);
pub(super) const CONVOCATORIA: ConvocatoriaId = ConvocatoriaId(20);

/// Female professional, 34 years old.
pub(super) const APPLICANT: UserId = UserId(100);
/// Male, 55 years old.
pub(super) const SENIOR_APPLICANT: UserId = UserId(101);
/// No profile on file.
pub(super) const ANONYMOUS_APPLICANT: UserId = UserId(102);
/// Profile without gender, high-school education.
pub(super) const BACHILLER_APPLICANT: UserId = UserId(103);

pub(super) const REVIEWER: UserId = UserId(200);
pub(super) const MANAGER: UserId = UserId(300);
pub(super) const INTERVIEWER_A: UserId = UserId(401);
pub(super) const INTERVIEWER_B: UserId = UserId(402);
pub(super) const CHAIR: UserId = UserId(501);
pub(super) const EVALUATOR: UserId = UserId(502);
pub(super) const SECRETARY: UserId = UserId(503);
pub(super) const OBSERVER: UserId = UserId(504);

pub(super) const CEDULA: &str = "cedula";
pub(super) const LIBRETA_MILITAR: &str = "libreta_militar";
pub(super) const TITULO: &str = "titulo_profesional";

pub(super) fn now() -> Timestamp {
    Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

/// Wall-clock time on the interview day, two days after [`now`].
pub(super) fn at(hour: u32, minute: u32) -> Timestamp {
    Utc.with_ymd_and_hms(2025, 3, 12, hour, minute, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn interview_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 12).expect("valid date")
}

pub(super) fn document_type(
    code: &str,
    category: DocumentCategory,
    sort_order: i32,
) -> DocumentType {
    DocumentType {
        code: code.to_string(),
        name: code.replace('_', " "),
        category,
        enabled: true,
        is_required: true,
        gender_condition: GenderCondition::Any,
        profession_exempt: BTreeSet::new(),
        age_exemption_threshold: None,
        default_max_age_days: None,
        accepted_formats: vec!["pdf".to_string()],
        sort_order,
    }
}

pub(super) fn catalog() -> Vec<DocumentType> {
    let mut libreta = document_type(LIBRETA_MILITAR, DocumentCategory::Identification, 2);
    libreta.gender_condition = GenderCondition::MaleOnly;
    libreta.age_exemption_threshold = Some(50);

    let mut titulo = document_type(TITULO, DocumentCategory::Academic, 3);
    titulo.profession_exempt = BTreeSet::from(["bachiller".to_string()]);

    let mut medical = document_type(codes::MEDICAL_CERTIFICATE, DocumentCategory::Health, 8);
    medical.default_max_age_days = Some(90);

    vec![
        medical,
        document_type(CEDULA, DocumentCategory::Identification, 1),
        libreta,
        titulo,
        document_type(codes::BACKGROUND_PROCURADURIA, DocumentCategory::Background, 4),
        document_type(codes::BACKGROUND_CONTRALORIA, DocumentCategory::Background, 5),
        document_type(codes::BACKGROUND_POLICE, DocumentCategory::Background, 6),
        document_type(codes::RNMC, DocumentCategory::Background, 7),
    ]
}

fn profile(
    user_id: UserId,
    username: &str,
    gender: Option<Gender>,
    education_level: &str,
    birth_date: NaiveDate,
) -> ApplicantProfile {
    ApplicantProfile {
        user_id,
        email: format!("{username}@iser.edu.co"),
        username: username.to_string(),
        id_number: Some(format!("1098{}", user_id.0)),
        gender,
        education_level: Some(education_level.to_string()),
        birth_date: Some(birth_date),
    }
}

pub(super) fn seeded_store() -> InMemoryRecruitmentStore {
    let store = InMemoryRecruitmentStore::new();
    store.seed_convocatoria(Convocatoria {
        id: CONVOCATORIA,
        code: "CONV-2025-1".to_string(),
        name: "Convocatoria docente 2025-1".to_string(),
        opens_at: Utc
            .with_ymd_and_hms(2025, 3, 1, 0, 0, 0)
            .single()
            .expect("valid timestamp"),
        closes_at: Utc
            .with_ymd_and_hms(2025, 3, 31, 23, 59, 59)
            .single()
            .expect("valid timestamp"),
    });
    store.seed_vacancy(Vacancy {
        id: VACANCY,
        code: "DOC-MAT-01".to_string(),
        title: "Docente de matemáticas".to_string(),
        company_id: None,
        convocatoria_id: Some(CONVOCATORIA),
        status: VacancyStatus::Published,
    });
    store.seed_vacancy(Vacancy {
        id: ORPHAN_VACANCY,
        code: "DOC-SIN-CONV".to_string(),
        title: "Vacante sin convocatoria".to_string(),
        company_id: None,
        convocatoria_id: None,
        status: VacancyStatus::Published,
    });
    for document_type in catalog() {
        store.seed_document_type(document_type);
    }

    store.seed_profile(profile(
        APPLICANT,
        "ana.perez",
        Some(Gender::Female),
        "profesional",
        NaiveDate::from_ymd_opt(1990, 5, 20).expect("valid date"),
    ));
    store.seed_profile(profile(
        SENIOR_APPLICANT,
        "jorge.rios",
        Some(Gender::Male),
        "magister",
        NaiveDate::from_ymd_opt(1970, 1, 15).expect("valid date"),
    ));
    store.seed_profile(profile(
        BACHILLER_APPLICANT,
        "sam.ortiz",
        None,
        "bachiller",
        NaiveDate::from_ymd_opt(2001, 8, 2).expect("valid date"),
    ));
    store
}

pub(super) fn submission(vacancy_id: VacancyId, applicant_id: UserId) -> ApplicationSubmission {
    ApplicationSubmission {
        vacancy_id,
        applicant_id,
        consent_text: "Autorizo el tratamiento de mis datos personales".to_string(),
        ip_address: Some("10.0.0.8".to_string()),
        user_agent: Some("Mozilla/5.0".to_string()),
        is_exemption: false,
        exemption_reason: None,
    }
}

pub(super) fn interview_request(
    application: &Application,
    scheduled_at: Timestamp,
    interviewers: Vec<UserId>,
) -> InterviewRequest {
    InterviewRequest {
        application_id: application.id,
        scheduled_at,
        duration_minutes: Some(30),
        kind: InterviewKind::InPerson,
        location: Some("Bloque A, sala 2".to_string()),
        interviewers,
        notes: String::new(),
    }
}

pub(super) struct Fixture {
    pub(super) engine: Arc<RecruitmentEngine<InMemoryRecruitmentStore>>,
    pub(super) store: Arc<InMemoryRecruitmentStore>,
    pub(super) notifications: RecordingNotifications,
    pub(super) audit: RecordingAudit,
    pub(super) events: RecordingEvents,
    pub(super) capabilities: StaticCapabilities,
    pub(super) clock: ManualClock,
}

impl Fixture {
    pub(super) fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub(super) fn with_config(config: EngineConfig) -> Self {
        let store = Arc::new(seeded_store());
        let notifications = RecordingNotifications::default();
        let audit = RecordingAudit::default();
        let events = RecordingEvents::default();
        let grants = StaticCapabilities::default();
        for capability in [
            capabilities::CHANGE_STATUS,
            capabilities::REVIEW_DOCUMENTS,
            capabilities::MANAGE_INTERVIEWS,
            capabilities::MANAGE_EXEMPTIONS,
            capabilities::MANAGE_COMMITTEES,
        ] {
            grants.grant(MANAGER, capability);
        }
        grants.grant(REVIEWER, capabilities::REVIEW_DOCUMENTS);
        let clock = ManualClock::new(now());

        let collaborators = Collaborators::new(
            Arc::new(notifications.clone()),
            Arc::new(audit.clone()),
            Arc::new(events.clone()),
            Arc::new(grants.clone()),
            Arc::new(clock.clone()),
        );
        let engine = Arc::new(RecruitmentEngine::new(store.clone(), collaborators, &config));

        Self {
            engine,
            store,
            notifications,
            audit,
            events,
            capabilities: grants,
            clock,
        }
    }

    pub(super) fn submit(&self, applicant: UserId) -> Application {
        self.engine
            .applications
            .submit(submission(VACANCY, applicant))
            .expect("submission accepted")
    }

    pub(super) fn under_review(&self, applicant: UserId) -> Application {
        let application = self.submit(applicant);
        self.engine
            .applications
            .change_status(
                application.id,
                ApplicationStatus::UnderReview,
                "Review started",
                MANAGER,
            )
            .expect("moves to under_review")
    }

    pub(super) fn validated(&self, applicant: UserId) -> Application {
        let application = self.under_review(applicant);
        self.engine
            .applications
            .change_status(
                application.id,
                ApplicationStatus::DocsValidated,
                "Documents verified",
                MANAGER,
            )
            .expect("moves to docs_validated")
    }

    /// Validated application with a 30 minute interview booked at `hour`:00.
    pub(super) fn interviewed(&self, applicant: UserId, hour: u32) -> (Application, Interview) {
        let application = self.validated(applicant);
        let interview = self
            .engine
            .interviews
            .schedule(
                interview_request(&application, at(hour, 0), vec![INTERVIEWER_A]),
                MANAGER,
            )
            .expect("interview booked");
        let application = self
            .engine
            .applications
            .get_required(application.id)
            .expect("application exists");
        (application, interview)
    }

    pub(super) fn grant(&self, user: UserId, exemption_type: ExemptionType) -> Exemption {
        self.engine
            .exemptions
            .grant(
                ExemptionGrant {
                    user_id: user,
                    exemption_type,
                    document_ref: Some("RES-2025-014".to_string()),
                    notes: None,
                    valid_from: now() - Duration::days(1),
                    valid_until: None,
                },
                MANAGER,
            )
            .expect("exemption granted")
    }

    pub(super) fn checklist_codes(&self, vacancy: VacancyId, user: UserId) -> Vec<String> {
        self.engine
            .requirements
            .resolve(vacancy, user)
            .expect("requirements resolve")
            .into_iter()
            .map(|view| view.code)
            .collect()
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
