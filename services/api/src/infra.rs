use chrono::{Duration, NaiveDate};
use jobboard::config::EngineConfig;
use jobboard::workflows::recruitment::exemptions::codes;
use jobboard::workflows::recruitment::{
    capabilities, ApplicantProfile, AuditEntry, AuditSink, Clock, Collaborators, CompanyId,
    Convocatoria, ConvocatoriaId, DocumentCategory, DocumentType, EventPublisher, Gender,
    GenderCondition, InMemoryRecruitmentStore, RecordingNotifications, RecruitmentEngine,
    StaticCapabilities, Timestamp, UserId, Vacancy, VacancyId, VacancyStatus, WorkflowEvent,
};
use jobboard::workflows::recruitment::repository::{AuditError, EventError};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::BTreeSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

/// Staff account holding every capability in the in-memory wiring.
pub(crate) const ADMIN: UserId = UserId(1);
pub(crate) const SAMPLE_COMPANY: CompanyId = CompanyId(1);
pub(crate) const SAMPLE_CONVOCATORIA: ConvocatoriaId = ConvocatoriaId(1);
pub(crate) const SAMPLE_VACANCY: VacancyId = VacancyId(1);

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Audit sink that writes entries to the log stream.
#[derive(Default, Clone, Copy)]
pub(crate) struct TracingAudit;

impl AuditSink for TracingAudit {
    fn log(&self, entry: AuditEntry) -> Result<(), AuditError> {
        info!(
            target: "jobboard::audit",
            action = entry.action,
            entity_type = entry.entity_type,
            entity_id = entry.entity_id,
            actor = ?entry.actor,
            "audit"
        );
        Ok(())
    }
}

#[derive(Default, Clone, Copy)]
pub(crate) struct TracingEvents;

impl EventPublisher for TracingEvents {
    fn publish(&self, event: WorkflowEvent) -> Result<(), EventError> {
        info!(target: "jobboard::events", ?event, "workflow event");
        Ok(())
    }
}

/// Engine over one in-memory store, plus the handles the CLI inspects afterwards.
pub(crate) struct InMemoryWiring {
    pub(crate) store: Arc<InMemoryRecruitmentStore>,
    pub(crate) engine: Arc<RecruitmentEngine<InMemoryRecruitmentStore>>,
    pub(crate) collaborators: Collaborators,
    pub(crate) notifications: RecordingNotifications,
}

pub(crate) fn in_memory_engine(config: &EngineConfig, clock: Arc<dyn Clock>) -> InMemoryWiring {
    let store = Arc::new(InMemoryRecruitmentStore::new());
    let notifications = RecordingNotifications::default();
    let grants = StaticCapabilities::default();
    for capability in [
        capabilities::CHANGE_STATUS,
        capabilities::REVIEW_DOCUMENTS,
        capabilities::MANAGE_INTERVIEWS,
        capabilities::MANAGE_EXEMPTIONS,
        capabilities::MANAGE_COMMITTEES,
    ] {
        grants.grant(ADMIN, capability);
    }

    let collaborators = Collaborators::new(
        Arc::new(notifications.clone()),
        Arc::new(TracingAudit),
        Arc::new(TracingEvents),
        Arc::new(grants),
        clock,
    );
    let engine = Arc::new(RecruitmentEngine::new(
        store.clone(),
        collaborators.clone(),
        config,
    ));
    InMemoryWiring {
        store,
        engine,
        collaborators,
        notifications,
    }
}

fn document_type(
    code: &str,
    name: &str,
    category: DocumentCategory,
    sort_order: i32,
) -> DocumentType {
    DocumentType {
        code: code.to_string(),
        name: name.to_string(),
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

/// Document catalog used by the sample convocatoria.
pub(crate) fn sample_catalog() -> Vec<DocumentType> {
    let mut libreta = document_type(
        "libreta_militar",
        "Libreta militar",
        DocumentCategory::Identification,
        2,
    );
    libreta.gender_condition = GenderCondition::MaleOnly;
    libreta.age_exemption_threshold = Some(50);

    let mut titulo = document_type(
        "titulo_profesional",
        "Título profesional",
        DocumentCategory::Academic,
        3,
    );
    titulo.profession_exempt = BTreeSet::from(["bachiller".to_string()]);

    let mut medical = document_type(
        codes::MEDICAL_CERTIFICATE,
        "Certificado médico",
        DocumentCategory::Health,
        8,
    );
    medical.default_max_age_days = Some(90);

    vec![
        document_type("cedula", "Cédula de ciudadanía", DocumentCategory::Identification, 1),
        libreta,
        titulo,
        document_type(
            codes::BACKGROUND_PROCURADURIA,
            "Antecedentes Procuraduría",
            DocumentCategory::Background,
            4,
        ),
        document_type(
            codes::BACKGROUND_CONTRALORIA,
            "Antecedentes Contraloría",
            DocumentCategory::Background,
            5,
        ),
        document_type(
            codes::BACKGROUND_POLICE,
            "Antecedentes Policía",
            DocumentCategory::Background,
            6,
        ),
        document_type(codes::RNMC, "Medidas correctivas (RNMC)", DocumentCategory::Background, 7),
        medical,
    ]
}

pub(crate) fn sample_profiles() -> Vec<ApplicantProfile> {
    let profile = |id: u64, email: &str, username: &str, gender, education: &str, born| {
        ApplicantProfile {
            user_id: UserId(id),
            email: email.to_string(),
            username: username.to_string(),
            id_number: Some(format!("109{id:05}")),
            gender,
            education_level: Some(education.to_string()),
            birth_date: NaiveDate::from_ymd_opt(born, 3, 15),
        }
    };
    vec![
        profile(100, "laura.mendez@iser.edu.co", "laura.mendez", Some(Gender::Female), "magister", 1990),
        profile(101, "jorge.ruiz@iser.edu.co", "jorge.ruiz", Some(Gender::Male), "profesional", 1968),
        profile(102, "camilo.suarez@iser.edu.co", "camilo.suarez", Some(Gender::Male), "bachiller", 1999),
    ]
}

/// Open convocatoria with one published vacancy, the document catalog and sample applicants.
pub(crate) fn seed_sample_data(store: &InMemoryRecruitmentStore, now: Timestamp) {
    store.seed_convocatoria(Convocatoria {
        id: SAMPLE_CONVOCATORIA,
        code: "CONV-DOC-2025".to_string(),
        name: "Convocatoria docentes ocasionales".to_string(),
        opens_at: now - Duration::days(7),
        closes_at: now + Duration::days(30),
    });
    store.seed_vacancy(Vacancy {
        id: SAMPLE_VACANCY,
        code: "DOC-ING-SIS".to_string(),
        title: "Docente ingeniería de sistemas".to_string(),
        company_id: Some(SAMPLE_COMPANY),
        convocatoria_id: Some(SAMPLE_CONVOCATORIA),
        status: VacancyStatus::Published,
    });
    for document_type in sample_catalog() {
        store.seed_document_type(document_type);
    }
    for profile in sample_profiles() {
        store.seed_profile(profile);
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
