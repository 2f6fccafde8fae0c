use super::common::*;
use chrono::Duration;

use crate::config::{EngineConfig, ExemptionTieBreak};
use crate::workflows::recruitment::exemptions::codes;
use crate::workflows::recruitment::{
    ExemptionError, ExemptionGrant, ExemptionId, ExemptionType, UserId,
};

fn grant_request(user: UserId, exemption_type: ExemptionType, from_days_ago: i64) -> ExemptionGrant {
    ExemptionGrant {
        user_id: user,
        exemption_type,
        document_ref: None,
        notes: Some("Resolución rectoral".to_string()),
        valid_from: now() - Duration::days(from_days_ago),
        valid_until: None,
    }
}

#[test]
fn granting_requires_the_exemption_capability() {
    let fixture = Fixture::new();
    match fixture.engine.exemptions.grant(
        grant_request(APPLICANT, ExemptionType::Recontratacion, 1),
        REVIEWER,
    ) {
        Err(ExemptionError::PermissionDenied { user, .. }) => assert_eq!(user, REVIEWER),
        other => panic!("expected permission denied, got {other:?}"),
    }
}

#[test]
fn validity_must_not_end_before_it_starts() {
    let fixture = Fixture::new();
    let mut request = grant_request(APPLICANT, ExemptionType::HistoricoIser, 1);
    request.valid_until = Some(request.valid_from - Duration::days(1));

    assert!(matches!(
        fixture.engine.exemptions.grant(request, MANAGER),
        Err(ExemptionError::InvalidWindow)
    ));
}

#[test]
fn most_recently_created_exemption_wins_by_default() {
    let fixture = Fixture::new();
    fixture.grant(APPLICANT, ExemptionType::HistoricoIser);
    fixture.clock.advance(Duration::minutes(5));
    let newer = fixture.grant(APPLICANT, ExemptionType::TrasladoInterno);

    let active = fixture
        .engine
        .exemptions
        .active_exemption(APPLICANT)
        .expect("lookup succeeds")
        .expect("an exemption is active");
    assert_eq!(active.id, newer.id);
    assert_eq!(active.exemption_type, ExemptionType::TrasladoInterno);
}

#[test]
fn tie_break_can_prefer_the_latest_validity_start() {
    let fixture = Fixture::with_config(EngineConfig {
        exemption_tie_break: ExemptionTieBreak::LatestValidFrom,
        ..EngineConfig::default()
    });
    let later_start = fixture
        .engine
        .exemptions
        .grant(
            grant_request(APPLICANT, ExemptionType::HistoricoIser, 2),
            MANAGER,
        )
        .expect("granted");
    fixture.clock.advance(Duration::minutes(5));
    fixture
        .engine
        .exemptions
        .grant(
            grant_request(APPLICANT, ExemptionType::Recontratacion, 30),
            MANAGER,
        )
        .expect("granted");

    let active = fixture
        .engine
        .exemptions
        .active_exemption(APPLICANT)
        .expect("lookup succeeds")
        .expect("an exemption is active");
    assert_eq!(active.id, later_start.id);
}

#[test]
fn expired_and_future_exemptions_are_ignored() {
    let fixture = Fixture::new();
    let mut expired = grant_request(APPLICANT, ExemptionType::HistoricoIser, 60);
    expired.valid_until = Some(now() - Duration::days(1));
    let mut future = grant_request(APPLICANT, ExemptionType::Recontratacion, 0);
    future.valid_from = now() + Duration::days(3);
    for request in [expired, future] {
        fixture
            .engine
            .exemptions
            .grant(request, MANAGER)
            .expect("granted");
    }

    assert!(fixture
        .engine
        .exemptions
        .active_exemption(APPLICANT)
        .expect("lookup succeeds")
        .is_none());

    fixture.clock.advance(Duration::days(4));
    let active = fixture
        .engine
        .exemptions
        .active_exemption(APPLICANT)
        .expect("lookup succeeds")
        .expect("future exemption became active");
    assert_eq!(active.exemption_type, ExemptionType::Recontratacion);
}

#[test]
fn revocation_is_recorded_once() {
    let fixture = Fixture::new();
    let exemption = fixture.grant(APPLICANT, ExemptionType::Recontratacion);

    let revoked = fixture
        .engine
        .exemptions
        .revoke(exemption.id, MANAGER, "  Contract not renewed ")
        .expect("revoked");
    assert_eq!(revoked.time_revoked, Some(now()));
    assert_eq!(revoked.revoked_by, Some(MANAGER));
    assert_eq!(revoked.revoke_reason.as_deref(), Some("Contract not renewed"));

    assert!(matches!(
        fixture.engine.exemptions.revoke(exemption.id, MANAGER, ""),
        Err(ExemptionError::AlreadyRevoked(id)) if id == exemption.id
    ));
    assert!(matches!(
        fixture.engine.exemptions.revoke(ExemptionId(9_999), MANAGER, ""),
        Err(ExemptionError::NotFound(_))
    ));
    assert_eq!(
        fixture.audit.actions(),
        vec!["exemption_granted", "exemption_revoked"]
    );
}

#[test]
fn convocatoria_exemptions_are_unique_per_document() {
    let fixture = Fixture::new();
    fixture
        .engine
        .exemptions
        .add_convocatoria_exemption(CONVOCATORIA, codes::RNMC, MANAGER)
        .expect("added");

    assert!(matches!(
        fixture
            .engine
            .exemptions
            .add_convocatoria_exemption(CONVOCATORIA, codes::RNMC, MANAGER),
        Err(ExemptionError::DuplicateConvocatoriaExemption { .. })
    ));

    let exempted = fixture
        .engine
        .exemptions
        .convocatoria_exempted_codes(CONVOCATORIA)
        .expect("codes listed");
    assert!(exempted.contains(codes::RNMC));

    assert!(fixture
        .engine
        .exemptions
        .remove_convocatoria_exemption(CONVOCATORIA, codes::RNMC, MANAGER)
        .expect("removed"));
    assert!(!fixture
        .engine
        .exemptions
        .remove_convocatoria_exemption(CONVOCATORIA, codes::RNMC, MANAGER)
        .expect("second removal is a no-op"));
}
