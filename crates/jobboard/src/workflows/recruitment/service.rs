use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use super::context::Collaborators;
use super::domain::{
    Application, ApplicationId, ApplicationStatus, ConsentRecord, Decision, DecisionOutcome,
    NewApplication, NewLogEntry, UserId, VacancyId, VacancyListing, WorkflowLogEntry,
};
use super::repository::{
    capabilities, ApplicationChange, AuditEntry, Notification, RecruitmentStore,
    RepositoryError, WorkflowEvent,
};

/// Submission payload; consent is captured verbatim with its request metadata.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApplicationSubmission {
    pub vacancy_id: VacancyId,
    pub applicant_id: UserId,
    pub consent_text: String,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub is_exemption: bool,
    #[serde(default)]
    pub exemption_reason: Option<String>,
}

/// Drives applications through the status graph and owns the workflow log.
pub struct ApplicationService<S: ?Sized> {
    store: Arc<S>,
    collaborators: Collaborators,
}

impl<S: ?Sized> Clone for ApplicationService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            collaborators: self.collaborators.clone(),
        }
    }
}

impl<S> ApplicationService<S>
where
    S: RecruitmentStore + ?Sized,
{
    pub fn new(store: Arc<S>, collaborators: Collaborators) -> Self {
        Self {
            store,
            collaborators,
        }
    }

    /// Create a `submitted` application for an open vacancy.
    pub fn submit(
        &self,
        submission: ApplicationSubmission,
    ) -> Result<Application, ApplicationServiceError> {
        let now = self.collaborators.now();
        let listing = self.listing(submission.vacancy_id)?;
        if !listing.accepts_applications_at(now) {
            return Err(ApplicationServiceError::VacancyClosed(submission.vacancy_id));
        }

        let consent_text = submission.consent_text.trim();
        if consent_text.is_empty() {
            return Err(ApplicationServiceError::MissingConsent);
        }

        let new_application = NewApplication {
            vacancy_id: submission.vacancy_id,
            applicant_id: submission.applicant_id,
            consent: ConsentRecord {
                text: consent_text.to_string(),
                ip_address: submission.ip_address,
                user_agent: submission.user_agent,
                accepted_at: now,
            },
            is_exemption: submission.is_exemption,
            exemption_reason: submission
                .exemption_reason
                .filter(|reason| !reason.trim().is_empty()),
            time_created: now,
        };
        let log_entry = NewLogEntry {
            from_status: None,
            to_status: ApplicationStatus::Submitted,
            actor_id: submission.applicant_id,
            comments: "Application submitted".to_string(),
            created_at: now,
        };

        let application = match self.store.insert_application(new_application, log_entry) {
            Ok(application) => application,
            Err(RepositoryError::Conflict) => {
                return Err(ApplicationServiceError::DuplicateApplication {
                    vacancy: submission.vacancy_id,
                    applicant: submission.applicant_id,
                })
            }
            Err(other) => return Err(other.into()),
        };

        info!(
            application = %application.id,
            vacancy = %application.vacancy_id,
            applicant = %application.applicant_id,
            "application submitted"
        );
        self.collaborators.publish(WorkflowEvent::ApplicationSubmitted {
            application_id: application.id,
            vacancy_id: application.vacancy_id,
            applicant_id: application.applicant_id,
            at: now,
        });
        self.collaborators.audit(AuditEntry {
            action: "application_created",
            entity_type: "application",
            entity_id: application.id.0,
            actor: Some(application.applicant_id),
            extra: None,
        });
        self.notify_status(&application, &listing);
        Ok(application)
    }

    pub fn get(&self, id: ApplicationId) -> Result<Option<Application>, ApplicationServiceError> {
        Ok(self.store.application(id)?)
    }

    /// Load-or-fail variant of [`get`](Self::get).
    pub fn get_required(&self, id: ApplicationId) -> Result<Application, ApplicationServiceError> {
        self.store
            .application(id)?
            .ok_or(ApplicationServiceError::ApplicationNotFound(id))
    }

    /// Workflow log ordered by time.
    pub fn history(
        &self,
        id: ApplicationId,
    ) -> Result<Vec<WorkflowLogEntry>, ApplicationServiceError> {
        self.get_required(id)?;
        let mut entries = self.store.workflow_log(id)?;
        entries.sort_by_key(|entry| (entry.created_at, entry.id));
        Ok(entries)
    }

    pub fn change_status(
        &self,
        id: ApplicationId,
        target: ApplicationStatus,
        comments: &str,
        actor: UserId,
    ) -> Result<Application, ApplicationServiceError> {
        self.require(actor, capabilities::CHANGE_STATUS)?;
        self.transition(id, target, comments, actor)
    }

    /// Apply a graph edge on behalf of another engine service that already checked
    /// the actor's rights.
    pub(crate) fn transition(
        &self,
        id: ApplicationId,
        target: ApplicationStatus,
        comments: &str,
        actor: UserId,
    ) -> Result<Application, ApplicationServiceError> {
        let current = self.get_required(id)?;
        if !current.status.can_transition_to(target) {
            warn!(
                application = %id,
                from = %current.status,
                to = %target,
                "rejected status transition"
            );
            return Err(ApplicationServiceError::InvalidTransition {
                from: current.status,
                to: target,
            });
        }
        self.commit(current, target, comments, actor)
    }

    /// Move to `withdrawn`; already-terminal applications are returned untouched.
    pub fn withdraw(
        &self,
        id: ApplicationId,
        reason: &str,
        actor: UserId,
    ) -> Result<Application, ApplicationServiceError> {
        let current = self.get_required(id)?;
        if actor != current.applicant_id {
            self.require(actor, capabilities::CHANGE_STATUS)?;
        }
        if current.status.is_terminal() {
            return Ok(current);
        }
        self.commit(current, ApplicationStatus::Withdrawn, reason, actor)
    }

    pub fn assign_reviewer(
        &self,
        id: ApplicationId,
        reviewer: UserId,
        actor: UserId,
    ) -> Result<Application, ApplicationServiceError> {
        self.require(actor, capabilities::CHANGE_STATUS)?;
        if !self
            .collaborators
            .has_capability(reviewer, capabilities::REVIEW_DOCUMENTS)
        {
            return Err(ApplicationServiceError::ReviewerNotEligible(reviewer));
        }

        let current = self.get_required(id)?;
        if current.status.is_terminal() {
            return Err(ApplicationServiceError::ApplicationClosed {
                application: id,
                status: current.status,
            });
        }

        let expected_version = current.version;
        let mut updated = current;
        updated.reviewer_id = Some(reviewer);
        updated.time_modified = self.collaborators.now();
        let application = self.persist(ApplicationChange {
            application: updated,
            expected_version,
            log_entry: None,
        })?;

        info!(application = %id, %reviewer, "reviewer assigned");
        self.collaborators.audit(AuditEntry {
            action: "reviewer_assigned",
            entity_type: "application",
            entity_id: id.0,
            actor: Some(actor),
            extra: Some(serde_json::json!({ "reviewer": reviewer })),
        });
        Ok(application)
    }

    fn commit(
        &self,
        current: Application,
        target: ApplicationStatus,
        comments: &str,
        actor: UserId,
    ) -> Result<Application, ApplicationServiceError> {
        let now = self.collaborators.now();
        let previous = current.status;
        let expected_version = current.version;

        let mut updated = current;
        updated.status = target;
        updated.time_modified = now;
        let outcome = match target {
            ApplicationStatus::Selected => Some(DecisionOutcome::Selected),
            ApplicationStatus::Rejected => Some(DecisionOutcome::Rejected),
            _ => None,
        };
        if let Some(outcome) = outcome {
            updated.decision = Some(Decision {
                outcome,
                decided_by: actor,
                decided_at: now,
                comments: comments.to_string(),
            });
        }

        let application = self.persist(ApplicationChange {
            application: updated,
            expected_version,
            log_entry: Some(NewLogEntry {
                from_status: Some(previous),
                to_status: target,
                actor_id: actor,
                comments: comments.to_string(),
                created_at: now,
            }),
        })?;

        info!(
            application = %application.id,
            from = %previous,
            to = %target,
            actor = %actor,
            "application status changed"
        );
        self.collaborators.publish(WorkflowEvent::StatusChanged {
            application_id: application.id,
            from: previous,
            to: target,
            actor_id: actor,
            at: now,
        });
        self.collaborators.audit(AuditEntry {
            action: "status_changed",
            entity_type: "application",
            entity_id: application.id.0,
            actor: Some(actor),
            extra: Some(serde_json::json!({ "from": previous, "to": target })),
        });
        if target.notification_template().is_some() {
            match self.listing(application.vacancy_id) {
                Ok(listing) => self.notify_status(&application, &listing),
                Err(err) => {
                    warn!(application = %application.id, error = %err, "skipping status notification")
                }
            }
        }
        Ok(application)
    }

    fn persist(&self, change: ApplicationChange) -> Result<Application, ApplicationServiceError> {
        let id = change.application.id;
        match self.store.commit_application(change) {
            Ok(application) => Ok(application),
            Err(RepositoryError::StaleVersion { .. }) => {
                Err(ApplicationServiceError::ConcurrentModification(id))
            }
            Err(RepositoryError::NotFound) => Err(ApplicationServiceError::ApplicationNotFound(id)),
            Err(other) => Err(other.into()),
        }
    }

    fn listing(&self, vacancy_id: VacancyId) -> Result<VacancyListing, ApplicationServiceError> {
        let vacancy = self
            .store
            .vacancy(vacancy_id)?
            .ok_or(ApplicationServiceError::VacancyNotFound(vacancy_id))?;
        let convocatoria = match vacancy.convocatoria_id {
            Some(id) => self.store.convocatoria(id)?,
            None => None,
        };
        Ok(VacancyListing {
            vacancy,
            convocatoria,
        })
    }

    fn notify_status(&self, application: &Application, listing: &VacancyListing) {
        let Some(template) = application.status.notification_template() else {
            return;
        };
        let mut data = BTreeMap::new();
        data.insert("application_id".to_string(), application.id.to_string());
        data.insert("vacancy_code".to_string(), listing.vacancy.code.clone());
        data.insert("vacancy_title".to_string(), listing.vacancy.title.clone());
        data.insert("status".to_string(), application.status.label().to_string());
        if let Some(decision) = &application.decision {
            data.insert("comments".to_string(), decision.comments.clone());
        }
        self.collaborators.notify(Notification {
            user_id: application.applicant_id,
            template: template.to_string(),
            data,
        });
    }

    fn require(&self, actor: UserId, capability: &'static str) -> Result<(), ApplicationServiceError> {
        if self.collaborators.has_capability(actor, capability) {
            Ok(())
        } else {
            Err(ApplicationServiceError::PermissionDenied {
                user: actor,
                capability,
            })
        }
    }
}

/// Error raised by the application service.
#[derive(Debug, thiserror::Error)]
pub enum ApplicationServiceError {
    #[error("vacancy {0} not found")]
    VacancyNotFound(VacancyId),
    #[error("vacancy {0} is not open for applications")]
    VacancyClosed(VacancyId),
    #[error("consent text is required")]
    MissingConsent,
    #[error("user {applicant} already applied to vacancy {vacancy}")]
    DuplicateApplication { vacancy: VacancyId, applicant: UserId },
    #[error("application {0} not found")]
    ApplicationNotFound(ApplicationId),
    #[error("transition not allowed from {from} to {to}")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("application {0} was modified concurrently; reload and retry")]
    ConcurrentModification(ApplicationId),
    #[error("user {user} lacks capability {capability}")]
    PermissionDenied {
        user: UserId,
        capability: &'static str,
    },
    #[error("user {0} cannot review documents")]
    ReviewerNotEligible(UserId),
    #[error("application {application} is already {status}")]
    ApplicationClosed {
        application: ApplicationId,
        status: ApplicationStatus,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
