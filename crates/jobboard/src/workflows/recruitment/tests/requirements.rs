use super::common::*;
use chrono::Duration;

use crate::config::{EngineConfig, RecentDocumentsPolicy};
use crate::workflows::recruitment::exemptions::codes;
use crate::workflows::recruitment::{
    Convocatoria, ConvocatoriaId, DocumentCategory, DocumentRequirement, DocumentUpload,
    ExemptionType, RequirementError, ReviewVerdict, UserId, Vacancy, VacancyId, VacancyStatus,
};

const ALL_FOR_APPLICANT: [&str; 7] = [
    CEDULA,
    TITULO,
    codes::BACKGROUND_PROCURADURIA,
    codes::BACKGROUND_CONTRALORIA,
    codes::BACKGROUND_POLICE,
    codes::RNMC,
    codes::MEDICAL_CERTIFICATE,
];

fn seed_explicit_vacancy(fixture: &Fixture, vacancy: VacancyId, convocatoria: ConvocatoriaId) {
    fixture.store.seed_convocatoria(Convocatoria {
        id: convocatoria,
        code: format!("CONV-{}", convocatoria.0),
        name: "Convocatoria administrativa".to_string(),
        opens_at: now() - Duration::days(5),
        closes_at: now() + Duration::days(20),
    });
    fixture.store.seed_vacancy(Vacancy {
        id: vacancy,
        code: format!("ADM-{}", vacancy.0),
        title: "Auxiliar administrativo".to_string(),
        company_id: None,
        convocatoria_id: Some(convocatoria),
        status: VacancyStatus::Published,
    });
}

fn requirement(vacancy: VacancyId, code: &str) -> DocumentRequirement {
    DocumentRequirement {
        vacancy_id: vacancy,
        document_code: code.to_string(),
        is_required: true,
        accepted_formats: None,
        max_age_days: None,
        sort_order: None,
    }
}

#[test]
fn convocatoria_exemptions_remove_explicit_requirements() {
    let fixture = Fixture::new();
    let vacancy = VacancyId(12);
    let convocatoria = ConvocatoriaId(21);
    seed_explicit_vacancy(&fixture, vacancy, convocatoria);
    for code in [CEDULA, codes::RNMC, codes::BACKGROUND_POLICE] {
        fixture.store.seed_requirement(requirement(vacancy, code));
    }
    fixture
        .engine
        .exemptions
        .add_convocatoria_exemption(convocatoria, codes::RNMC, MANAGER)
        .expect("convocatoria exemption added");

    assert_eq!(
        fixture.checklist_codes(vacancy, APPLICANT),
        vec![CEDULA, codes::BACKGROUND_POLICE]
    );
    // Other convocatorias are untouched.
    assert!(fixture
        .checklist_codes(VACANCY, APPLICANT)
        .contains(&codes::RNMC.to_string()));
}

#[test]
fn catalog_defaults_apply_without_explicit_requirements() {
    let fixture = Fixture::new();
    let views = fixture
        .engine
        .requirements
        .resolve(VACANCY, APPLICANT)
        .expect("requirements resolve");

    let listed: Vec<&str> = views.iter().map(|view| view.code.as_str()).collect();
    assert_eq!(listed, ALL_FOR_APPLICANT);
    let medical = views.last().expect("medical certificate listed");
    assert_eq!(medical.max_age_days, Some(90));
    assert_eq!(medical.category, DocumentCategory::Health);
    assert!(views.iter().all(|view| view.is_required));
}

#[test]
fn explicit_requirements_override_catalog_defaults() {
    let fixture = Fixture::new();
    let vacancy = VacancyId(12);
    seed_explicit_vacancy(&fixture, vacancy, ConvocatoriaId(21));

    let mut disabled = document_type("carnet_vacunas", DocumentCategory::Health, 9);
    disabled.enabled = false;
    fixture.store.seed_document_type(disabled);

    let mut medical = requirement(vacancy, codes::MEDICAL_CERTIFICATE);
    medical.is_required = false;
    medical.max_age_days = Some(30);
    medical.sort_order = Some(0);
    medical.accepted_formats = Some(vec!["pdf".to_string(), "jpg".to_string()]);
    fixture.store.seed_requirement(medical);
    fixture.store.seed_requirement(requirement(vacancy, CEDULA));
    fixture.store.seed_requirement(requirement(vacancy, CEDULA));
    fixture
        .store
        .seed_requirement(requirement(vacancy, "carnet_vacunas"));
    fixture
        .store
        .seed_requirement(requirement(vacancy, "desconocido"));

    let views = fixture
        .engine
        .requirements
        .resolve(vacancy, APPLICANT)
        .expect("requirements resolve");
    assert_eq!(views.len(), 2);
    assert_eq!(views[0].code, codes::MEDICAL_CERTIFICATE);
    assert!(!views[0].is_required);
    assert_eq!(views[0].max_age_days, Some(30));
    assert_eq!(views[0].accepted_formats, vec!["pdf", "jpg"]);
    assert_eq!(views[1].code, CEDULA);
}

#[test]
fn gender_age_and_profession_conditions_filter_the_catalog() {
    let fixture = Fixture::new();

    // Male but over the age threshold: military card not required.
    let senior = fixture.checklist_codes(VACANCY, SENIOR_APPLICANT);
    assert!(!senior.contains(&LIBRETA_MILITAR.to_string()));
    assert!(senior.contains(&TITULO.to_string()));

    // Unknown gender keeps gendered documents; high-school level skips the degree.
    let bachiller = fixture.checklist_codes(VACANCY, BACHILLER_APPLICANT);
    assert!(bachiller.contains(&LIBRETA_MILITAR.to_string()));
    assert!(!bachiller.contains(&TITULO.to_string()));

    // Without a profile nothing is filtered.
    assert_eq!(fixture.checklist_codes(VACANCY, ANONYMOUS_APPLICANT).len(), 8);
}

#[test]
fn conditions_are_listed_on_each_view() {
    let fixture = Fixture::new();
    let views = fixture
        .engine
        .requirements
        .resolve(VACANCY, ANONYMOUS_APPLICANT)
        .expect("requirements resolve");
    let libreta = views
        .iter()
        .find(|view| view.code == LIBRETA_MILITAR)
        .expect("military card listed");
    assert_eq!(
        libreta.conditions,
        vec!["applies to male applicants", "not required from age 50"]
    );
}

#[test]
fn rehire_exemption_limits_the_checklist() {
    let fixture = Fixture::new();
    fixture.grant(APPLICANT, ExemptionType::Recontratacion);

    assert_eq!(
        fixture.checklist_codes(VACANCY, APPLICANT),
        vec![
            codes::BACKGROUND_PROCURADURIA,
            codes::BACKGROUND_CONTRALORIA,
            codes::BACKGROUND_POLICE,
            codes::RNMC,
        ]
    );
}

#[test]
fn historic_and_transfer_exemptions_keep_their_own_lists() {
    let fixture = Fixture::new();
    fixture.grant(APPLICANT, ExemptionType::HistoricoIser);
    assert_eq!(
        fixture.checklist_codes(VACANCY, APPLICANT),
        vec![
            codes::BACKGROUND_PROCURADURIA,
            codes::BACKGROUND_CONTRALORIA,
            codes::BACKGROUND_POLICE,
            codes::RNMC,
            codes::MEDICAL_CERTIFICATE,
        ]
    );

    fixture.grant(SENIOR_APPLICANT, ExemptionType::TrasladoInterno);
    assert_eq!(
        fixture.checklist_codes(VACANCY, SENIOR_APPLICANT),
        vec![
            codes::BACKGROUND_PROCURADURIA,
            codes::BACKGROUND_CONTRALORIA
        ]
    );
}

#[test]
fn exemption_lists_never_add_documents() {
    let fixture = Fixture::new();
    fixture
        .engine
        .exemptions
        .add_convocatoria_exemption(CONVOCATORIA, codes::RNMC, MANAGER)
        .expect("convocatoria exemption added");
    fixture.grant(APPLICANT, ExemptionType::Recontratacion);

    assert_eq!(
        fixture.checklist_codes(VACANCY, APPLICANT),
        vec![
            codes::BACKGROUND_PROCURADURIA,
            codes::BACKGROUND_CONTRALORIA,
            codes::BACKGROUND_POLICE,
        ]
    );
}

#[test]
fn revoked_exemption_restores_the_full_checklist() {
    let fixture = Fixture::new();
    let exemption = fixture.grant(APPLICANT, ExemptionType::Recontratacion);
    fixture
        .engine
        .exemptions
        .revoke(exemption.id, MANAGER, "Granted by mistake")
        .expect("exemption revoked");

    assert_eq!(
        fixture.checklist_codes(VACANCY, APPLICANT),
        ALL_FOR_APPLICANT
    );
}

/// Approves a fresh identity document and a medical certificate older than its window.
fn approve_prior_documents(fixture: &Fixture, applicant: UserId) {
    let application = fixture.submit(applicant);
    let uploads = [
        (CEDULA, Some(now().date_naive() - Duration::days(400))),
        (
            codes::MEDICAL_CERTIFICATE,
            Some(now().date_naive() - Duration::days(120)),
        ),
    ];
    for (code, issue_date) in uploads {
        let document = fixture
            .engine
            .documents
            .upload(
                application.id,
                DocumentUpload {
                    document_code: code.to_string(),
                    file_name: format!("{code}.pdf"),
                    issue_date,
                },
                applicant,
            )
            .expect("upload accepted");
        fixture
            .engine
            .documents
            .review(document.id, ReviewVerdict::Approved, None, REVIEWER)
            .expect("review recorded");
    }
}

#[test]
fn recent_documents_exemption_skips_fresh_approved_uploads() {
    let fixture = Fixture::new();
    approve_prior_documents(&fixture, APPLICANT);
    fixture.grant(APPLICANT, ExemptionType::DocumentosRecientes);

    let checklist = fixture.checklist_codes(VACANCY, APPLICANT);
    assert!(!checklist.contains(&CEDULA.to_string()));
    assert!(checklist.contains(&codes::MEDICAL_CERTIFICATE.to_string()));
    assert_eq!(checklist.len(), ALL_FOR_APPLICANT.len() - 1);
}

#[test]
fn recent_documents_exemption_can_be_configured_to_remove_nothing() {
    let fixture = Fixture::with_config(EngineConfig {
        recent_documents: RecentDocumentsPolicy::NoReduction,
        ..EngineConfig::default()
    });
    approve_prior_documents(&fixture, APPLICANT);
    fixture.grant(APPLICANT, ExemptionType::DocumentosRecientes);

    assert_eq!(
        fixture.checklist_codes(VACANCY, APPLICANT),
        ALL_FOR_APPLICANT
    );
}

#[test]
fn vacancies_without_convocatoria_need_nothing() {
    let fixture = Fixture::new();
    assert!(fixture
        .checklist_codes(ORPHAN_VACANCY, APPLICANT)
        .is_empty());

    assert!(matches!(
        fixture.engine.requirements.resolve(VacancyId(999), APPLICANT),
        Err(RequirementError::VacancyNotFound(id)) if id == VacancyId(999)
    ));
}
