//! Document upload and review, feeding the `under_review` exit of the status graph.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::context::Collaborators;
use super::domain::{
    Application, ApplicationDocument, ApplicationId, ApplicationStatus, DocumentId,
    NewApplicationDocument, ReviewStatus, UserId,
};
use super::repository::{capabilities, AuditEntry, RecruitmentStore, RepositoryError};
use super::requirements::{RequirementCalculator, RequirementError, RequirementView};
use super::service::{ApplicationService, ApplicationServiceError};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DocumentUpload {
    pub document_code: String,
    pub file_name: String,
    #[serde(default)]
    pub issue_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewVerdict {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChecklistItem {
    pub requirement: RequirementView,
    /// Most recent upload for this code, if any.
    pub document: Option<ApplicationDocument>,
}

impl ChecklistItem {
    pub fn is_satisfied(&self) -> bool {
        self.document
            .as_ref()
            .is_some_and(|document| document.review_status == ReviewStatus::Approved)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Checklist {
    pub application_id: ApplicationId,
    pub items: Vec<ChecklistItem>,
}

impl Checklist {
    /// Required codes without an approved latest upload.
    pub fn missing_required(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter(|item| item.requirement.is_required && !item.is_satisfied())
            .map(|item| item.requirement.code.as_str())
            .collect()
    }
}

pub struct DocumentReviewService<S: ?Sized> {
    store: Arc<S>,
    collaborators: Collaborators,
    requirements: RequirementCalculator<S>,
    applications: ApplicationService<S>,
}

impl<S: ?Sized> Clone for DocumentReviewService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            collaborators: self.collaborators.clone(),
            requirements: self.requirements.clone(),
            applications: self.applications.clone(),
        }
    }
}

impl<S> DocumentReviewService<S>
where
    S: RecruitmentStore + ?Sized,
{
    pub fn new(
        store: Arc<S>,
        collaborators: Collaborators,
        requirements: RequirementCalculator<S>,
        applications: ApplicationService<S>,
    ) -> Self {
        Self {
            store,
            collaborators,
            requirements,
            applications,
        }
    }

    /// Record metadata for a file the applicant stored externally.
    pub fn upload(
        &self,
        application_id: ApplicationId,
        upload: DocumentUpload,
        actor: UserId,
    ) -> Result<ApplicationDocument, DocumentReviewError> {
        let application = self.application(application_id)?;
        if actor != application.applicant_id {
            return Err(DocumentReviewError::NotOwner {
                application: application_id,
                user: actor,
            });
        }
        if !matches!(
            application.status,
            ApplicationStatus::Submitted
                | ApplicationStatus::UnderReview
                | ApplicationStatus::DocsRejected
        ) {
            return Err(DocumentReviewError::UploadClosed {
                application: application_id,
                status: application.status,
            });
        }

        let file_name = upload.file_name.trim();
        if file_name.is_empty() {
            return Err(DocumentReviewError::MissingFileName);
        }
        let code = upload.document_code.trim();
        let checklist = self
            .requirements
            .resolve(application.vacancy_id, application.applicant_id)?;
        if !checklist.iter().any(|view| view.code == code) {
            return Err(DocumentReviewError::NotRequired(code.to_string()));
        }

        let document = self.store.insert_document(NewApplicationDocument {
            application_id,
            applicant_id: application.applicant_id,
            document_code: code.to_string(),
            file_name: file_name.to_string(),
            issue_date: upload.issue_date,
            uploaded_at: self.collaborators.now(),
        })?;

        info!(
            application = %application_id,
            document = %document.id,
            code = %document.document_code,
            "document uploaded"
        );
        self.collaborators.audit(AuditEntry {
            action: "document_uploaded",
            entity_type: "application_document",
            entity_id: document.id.0,
            actor: Some(actor),
            extra: Some(serde_json::json!({ "code": document.document_code })),
        });
        Ok(document)
    }

    pub fn review(
        &self,
        document_id: DocumentId,
        verdict: ReviewVerdict,
        reason: Option<&str>,
        reviewer: UserId,
    ) -> Result<ApplicationDocument, DocumentReviewError> {
        self.require(reviewer)?;
        let mut document = self
            .store
            .document(document_id)?
            .ok_or(DocumentReviewError::DocumentNotFound(document_id))?;

        let reason = reason.map(str::trim).filter(|reason| !reason.is_empty());
        document.review_status = match verdict {
            ReviewVerdict::Approved => ReviewStatus::Approved,
            ReviewVerdict::Rejected => {
                if reason.is_none() {
                    return Err(DocumentReviewError::MissingRejectionReason);
                }
                ReviewStatus::Rejected
            }
        };
        document.rejection_reason = match verdict {
            ReviewVerdict::Approved => None,
            ReviewVerdict::Rejected => reason.map(str::to_string),
        };
        document.reviewed_by = Some(reviewer);
        document.reviewed_at = Some(self.collaborators.now());
        self.store.update_document(document.clone())?;

        info!(document = %document_id, ?verdict, "document reviewed");
        self.collaborators.audit(AuditEntry {
            action: "document_reviewed",
            entity_type: "application_document",
            entity_id: document_id.0,
            actor: Some(reviewer),
            extra: Some(serde_json::json!({ "verdict": verdict })),
        });
        Ok(document)
    }

    /// Resolved requirements paired with the latest upload for each.
    pub fn checklist(&self, application_id: ApplicationId) -> Result<Checklist, DocumentReviewError> {
        let application = self.application(application_id)?;
        let requirements = self
            .requirements
            .resolve(application.vacancy_id, application.applicant_id)?;
        let documents = self.store.documents_for_application(application_id)?;

        let items = requirements
            .into_iter()
            .map(|requirement| {
                let document = documents
                    .iter()
                    .filter(|document| document.document_code == requirement.code)
                    .max_by_key(|document| (document.uploaded_at, document.id))
                    .cloned();
                ChecklistItem {
                    requirement,
                    document,
                }
            })
            .collect();

        Ok(Checklist {
            application_id,
            items,
        })
    }

    /// Close the review: `docs_validated` when nothing required is missing,
    /// otherwise `docs_rejected` naming the outstanding codes.
    pub fn complete_review(
        &self,
        application_id: ApplicationId,
        actor: UserId,
    ) -> Result<Application, DocumentReviewError> {
        self.require(actor)?;
        let checklist = self.checklist(application_id)?;
        let missing = checklist.missing_required();

        let (target, comments) = if missing.is_empty() {
            (
                ApplicationStatus::DocsValidated,
                "All required documents approved".to_string(),
            )
        } else {
            (
                ApplicationStatus::DocsRejected,
                format!("Missing or rejected documents: {}", missing.join(", ")),
            )
        };
        Ok(self
            .applications
            .transition(application_id, target, &comments, actor)?)
    }

    fn application(&self, id: ApplicationId) -> Result<Application, DocumentReviewError> {
        self.store
            .application(id)?
            .ok_or(DocumentReviewError::ApplicationNotFound(id))
    }

    fn require(&self, actor: UserId) -> Result<(), DocumentReviewError> {
        if self
            .collaborators
            .has_capability(actor, capabilities::REVIEW_DOCUMENTS)
        {
            Ok(())
        } else {
            Err(DocumentReviewError::PermissionDenied {
                user: actor,
                capability: capabilities::REVIEW_DOCUMENTS,
            })
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentReviewError {
    #[error("application {0} not found")]
    ApplicationNotFound(ApplicationId),
    #[error("document {0} not found")]
    DocumentNotFound(DocumentId),
    #[error("user {user} does not own application {application}")]
    NotOwner {
        application: ApplicationId,
        user: UserId,
    },
    #[error("documents cannot be uploaded while application {application} is {status}")]
    UploadClosed {
        application: ApplicationId,
        status: ApplicationStatus,
    },
    #[error("document {0} is not part of this application's checklist")]
    NotRequired(String),
    #[error("file name is required")]
    MissingFileName,
    #[error("a rejected document needs a reason")]
    MissingRejectionReason,
    #[error("user {user} lacks capability {capability}")]
    PermissionDenied {
        user: UserId,
        capability: &'static str,
    },
    #[error(transparent)]
    Requirements(#[from] RequirementError),
    #[error(transparent)]
    Application(#[from] ApplicationServiceError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
