use super::common::*;
use chrono::Duration;

use crate::workflows::recruitment::exemptions::codes;
use crate::workflows::recruitment::{
    Application, ApplicationStatus, DocumentReviewError, DocumentUpload, ExemptionType,
    ReviewStatus, ReviewVerdict, UserId,
};

fn upload(code: &str) -> DocumentUpload {
    DocumentUpload {
        document_code: code.to_string(),
        file_name: format!("{code}.pdf"),
        issue_date: Some(now().date_naive() - Duration::days(3)),
    }
}

fn upload_and_approve(fixture: &Fixture, application: &Application, applicant: UserId, code: &str) {
    let document = fixture
        .engine
        .documents
        .upload(application.id, upload(code), applicant)
        .expect("upload accepted");
    fixture
        .engine
        .documents
        .review(document.id, ReviewVerdict::Approved, None, REVIEWER)
        .expect("approved");
}

#[test]
fn only_the_owner_can_upload_required_documents() {
    let fixture = Fixture::new();
    let application = fixture.submit(APPLICANT);

    assert!(matches!(
        fixture
            .engine
            .documents
            .upload(application.id, upload(CEDULA), SENIOR_APPLICANT),
        Err(DocumentReviewError::NotOwner { user, .. }) if user == SENIOR_APPLICANT
    ));
    match fixture
        .engine
        .documents
        .upload(application.id, upload(LIBRETA_MILITAR), APPLICANT)
    {
        Err(DocumentReviewError::NotRequired(code)) => assert_eq!(code, LIBRETA_MILITAR),
        other => panic!("expected not required, got {other:?}"),
    }

    let mut nameless = upload(CEDULA);
    nameless.file_name = "  ".to_string();
    assert!(matches!(
        fixture
            .engine
            .documents
            .upload(application.id, nameless, APPLICANT),
        Err(DocumentReviewError::MissingFileName)
    ));
}

#[test]
fn rejections_need_a_reason_and_reviewer_capability() {
    let fixture = Fixture::new();
    let application = fixture.submit(APPLICANT);
    let document = fixture
        .engine
        .documents
        .upload(application.id, upload(CEDULA), APPLICANT)
        .expect("upload accepted");
    assert_eq!(document.review_status, ReviewStatus::Pending);

    assert!(matches!(
        fixture
            .engine
            .documents
            .review(document.id, ReviewVerdict::Rejected, Some(" "), REVIEWER),
        Err(DocumentReviewError::MissingRejectionReason)
    ));
    assert!(matches!(
        fixture
            .engine
            .documents
            .review(document.id, ReviewVerdict::Approved, None, APPLICANT),
        Err(DocumentReviewError::PermissionDenied { .. })
    ));

    let rejected = fixture
        .engine
        .documents
        .review(
            document.id,
            ReviewVerdict::Rejected,
            Some("Illegible scan"),
            REVIEWER,
        )
        .expect("rejected");
    assert_eq!(rejected.review_status, ReviewStatus::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("Illegible scan"));
    assert_eq!(rejected.reviewed_by, Some(REVIEWER));
}

#[test]
fn checklist_tracks_the_latest_upload_per_code() {
    let fixture = Fixture::new();
    let application = fixture.submit(APPLICANT);
    upload_and_approve(&fixture, &application, APPLICANT, CEDULA);
    fixture.clock.advance(Duration::minutes(10));
    let replacement = fixture
        .engine
        .documents
        .upload(application.id, upload(CEDULA), APPLICANT)
        .expect("replacement accepted");

    let checklist = fixture
        .engine
        .documents
        .checklist(application.id)
        .expect("checklist builds");
    let item = checklist
        .items
        .iter()
        .find(|item| item.requirement.code == CEDULA)
        .expect("cedula listed");
    assert_eq!(
        item.document.as_ref().map(|document| document.id),
        Some(replacement.id)
    );
    assert!(!item.is_satisfied());
    assert_eq!(checklist.missing_required().len(), 7);
}

#[test]
fn complete_review_validates_when_everything_is_approved() {
    let fixture = Fixture::new();
    fixture.grant(APPLICANT, ExemptionType::Recontratacion);
    let application = fixture.under_review(APPLICANT);
    for code in [
        codes::BACKGROUND_PROCURADURIA,
        codes::BACKGROUND_CONTRALORIA,
        codes::BACKGROUND_POLICE,
        codes::RNMC,
    ] {
        upload_and_approve(&fixture, &application, APPLICANT, code);
    }

    let validated = fixture
        .engine
        .documents
        .complete_review(application.id, REVIEWER)
        .expect("review completed");
    assert_eq!(validated.status, ApplicationStatus::DocsValidated);

    let history = fixture
        .engine
        .applications
        .history(application.id)
        .expect("history");
    let last = history.last().expect("log entry");
    assert_eq!(last.comments, "All required documents approved");
    assert_eq!(last.actor_id, REVIEWER);

    assert!(matches!(
        fixture
            .engine
            .documents
            .upload(application.id, upload(codes::RNMC), APPLICANT),
        Err(DocumentReviewError::UploadClosed {
            status: ApplicationStatus::DocsValidated,
            ..
        })
    ));
}

#[test]
fn missing_documents_send_the_application_back() {
    let fixture = Fixture::new();
    fixture.grant(APPLICANT, ExemptionType::TrasladoInterno);
    let application = fixture.under_review(APPLICANT);
    upload_and_approve(
        &fixture,
        &application,
        APPLICANT,
        codes::BACKGROUND_PROCURADURIA,
    );

    let returned = fixture
        .engine
        .documents
        .complete_review(application.id, REVIEWER)
        .expect("review completed");
    assert_eq!(returned.status, ApplicationStatus::DocsRejected);
    let history = fixture
        .engine
        .applications
        .history(application.id)
        .expect("history");
    assert_eq!(
        history.last().map(|entry| entry.comments.as_str()),
        Some("Missing or rejected documents: antecedentes_contraloria")
    );
    assert_eq!(
        fixture.notifications.templates_for(APPLICANT).last().map(String::as_str),
        Some("docs_rejected")
    );

    // The applicant can fix the gap and go back to review.
    upload_and_approve(
        &fixture,
        &application,
        APPLICANT,
        codes::BACKGROUND_CONTRALORIA,
    );
    let resubmitted = fixture
        .engine
        .applications
        .change_status(
            application.id,
            ApplicationStatus::UnderReview,
            "Documents resubmitted",
            MANAGER,
        )
        .expect("back under review");
    assert_eq!(resubmitted.status, ApplicationStatus::UnderReview);
    let validated = fixture
        .engine
        .documents
        .complete_review(application.id, REVIEWER)
        .expect("review completed");
    assert_eq!(validated.status, ApplicationStatus::DocsValidated);
}

#[test]
fn completing_review_from_submitted_is_an_invalid_edge() {
    let fixture = Fixture::new();
    let application = fixture.submit(APPLICANT);

    assert!(matches!(
        fixture
            .engine
            .documents
            .complete_review(application.id, REVIEWER),
        Err(DocumentReviewError::Application(_))
    ));
}
