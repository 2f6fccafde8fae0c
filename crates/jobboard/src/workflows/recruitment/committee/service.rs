use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use super::super::context::Collaborators;
use super::super::domain::{
    Application, ApplicationId, ApplicationStatus, CommitteeId, CompanyId, DecisionOutcome,
    UserId, VacancyId,
};
use super::super::repository::{
    capabilities, AuditEntry, RecruitmentStore, RepositoryError, WorkflowEvent,
};
use super::super::service::{ApplicationService, ApplicationServiceError};
use super::aggregate::{rank, summarise_votes};
use super::domain::{
    Committee, CommitteeMember, CommitteeRole, Evaluation, EvaluationDraft, NewCommittee,
    RankingEntry, Vote, VoteSummary,
};

const SCORE_RANGE: std::ops::RangeInclusive<f64> = 0.0..=100.0;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommitteeRequest {
    pub company_id: CompanyId,
    #[serde(default)]
    pub vacancy_id: Option<VacancyId>,
    pub name: String,
    pub members: Vec<MemberRequest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MemberRequest {
    pub user_id: UserId,
    pub role: CommitteeRole,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EvaluationInput {
    pub committee_id: CommitteeId,
    pub application_id: ApplicationId,
    pub score: f64,
    pub vote: Vote,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub criteria: BTreeMap<String, f64>,
}

/// Committee membership, evaluation upserts, vote aggregation and final decisions.
pub struct CommitteeService<S: ?Sized> {
    store: Arc<S>,
    collaborators: Collaborators,
    applications: ApplicationService<S>,
}

impl<S: ?Sized> Clone for CommitteeService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            collaborators: self.collaborators.clone(),
            applications: self.applications.clone(),
        }
    }
}

impl<S> CommitteeService<S>
where
    S: RecruitmentStore + ?Sized,
{
    pub fn new(
        store: Arc<S>,
        collaborators: Collaborators,
        applications: ApplicationService<S>,
    ) -> Self {
        Self {
            store,
            collaborators,
            applications,
        }
    }

    pub fn create_committee(
        &self,
        request: CommitteeRequest,
        actor: UserId,
    ) -> Result<Committee, CommitteeError> {
        if !self
            .collaborators
            .has_capability(actor, capabilities::MANAGE_COMMITTEES)
        {
            return Err(CommitteeError::PermissionDenied {
                user: actor,
                capability: capabilities::MANAGE_COMMITTEES,
            });
        }
        let name = request.name.trim();
        if name.is_empty() {
            return Err(CommitteeError::MissingName);
        }

        let mut seen = BTreeSet::new();
        for member in &request.members {
            if !seen.insert(member.user_id) {
                return Err(CommitteeError::DuplicateMember(member.user_id));
            }
        }
        let chairs = request
            .members
            .iter()
            .filter(|member| member.role == CommitteeRole::Chair)
            .count();
        if chairs != 1 {
            return Err(CommitteeError::ChairCount(chairs));
        }

        let new_committee = NewCommittee {
            company_id: request.company_id,
            vacancy_id: request.vacancy_id,
            name: name.to_string(),
            members: request
                .members
                .iter()
                .map(|member| CommitteeMember {
                    user_id: member.user_id,
                    role: member.role,
                    active: true,
                })
                .collect(),
            time_created: self.collaborators.now(),
        };
        let committee = match self.store.insert_committee(new_committee) {
            Ok(committee) => committee,
            Err(RepositoryError::Conflict) => {
                return Err(CommitteeError::DuplicateCommittee(request.company_id))
            }
            Err(other) => return Err(other.into()),
        };

        info!(committee = %committee.id, company = %committee.company_id, "committee created");
        self.collaborators.audit(AuditEntry {
            action: "committee_created",
            entity_type: "committee",
            entity_id: committee.id.0,
            actor: Some(actor),
            extra: Some(serde_json::json!({ "members": committee.members.len() })),
        });
        Ok(committee)
    }

    pub fn committee(&self, id: CommitteeId) -> Result<Committee, CommitteeError> {
        self.store
            .committee(id)?
            .ok_or(CommitteeError::CommitteeNotFound(id))
    }

    /// Insert or update `evaluator`'s evaluation; each rejection names the rule it broke.
    pub fn evaluate(
        &self,
        input: EvaluationInput,
        evaluator: UserId,
    ) -> Result<Evaluation, CommitteeError> {
        let committee = self.committee(input.committee_id)?;
        if !committee.active {
            return Err(CommitteeError::CommitteeInactive(committee.id));
        }
        let member = committee
            .member(evaluator)
            .ok_or(CommitteeError::NotMember {
                committee: committee.id,
                user: evaluator,
            })?;
        if !member.active {
            return Err(CommitteeError::InactiveMember {
                committee: committee.id,
                user: evaluator,
            });
        }
        if !member.role.can_vote() {
            return Err(CommitteeError::ObserverCannotVote(evaluator));
        }
        if !SCORE_RANGE.contains(&input.score) {
            return Err(CommitteeError::ScoreOutOfRange(input.score));
        }
        if let Some((name, score)) = input
            .criteria
            .iter()
            .find(|(_, score)| !SCORE_RANGE.contains(*score))
        {
            return Err(CommitteeError::CriterionOutOfRange {
                criterion: name.clone(),
                score: *score,
            });
        }
        self.application(input.application_id)?;

        let now = self.collaborators.now();
        let evaluation = self.store.upsert_evaluation(EvaluationDraft {
            committee_id: committee.id,
            application_id: input.application_id,
            evaluator_id: evaluator,
            score: input.score,
            vote: input.vote,
            comments: input.comments.trim().to_string(),
            criteria: input.criteria,
            at: now,
        })?;

        info!(
            committee = %committee.id,
            application = %input.application_id,
            %evaluator,
            vote = ?evaluation.vote,
            "evaluation recorded"
        );
        self.collaborators.publish(WorkflowEvent::EvaluationRecorded {
            committee_id: committee.id,
            application_id: input.application_id,
            evaluator_id: evaluator,
            at: now,
        });
        self.collaborators.audit(AuditEntry {
            action: "evaluation_recorded",
            entity_type: "evaluation",
            entity_id: evaluation.id.0,
            actor: Some(evaluator),
            extra: Some(serde_json::json!({ "score": evaluation.score, "vote": evaluation.vote })),
        });
        Ok(evaluation)
    }

    pub fn aggregate(
        &self,
        application: ApplicationId,
        committee: CommitteeId,
    ) -> Result<VoteSummary, CommitteeError> {
        let evaluations = self.store.evaluations(committee, application)?;
        Ok(summarise_votes(committee, application, &evaluations))
    }

    pub fn ranking(&self, vacancy: VacancyId) -> Result<Vec<RankingEntry>, CommitteeError> {
        let applications = self.store.applications_for_vacancy(vacancy)?;
        let mut candidates = Vec::with_capacity(applications.len());
        for application in applications {
            let evaluations = self.store.evaluations_for_application(application.id)?;
            candidates.push((application, evaluations));
        }
        Ok(rank(candidates))
    }

    /// Chair-only final decision; moves the application out of `interview`.
    pub fn record_decision(
        &self,
        application_id: ApplicationId,
        committee_id: CommitteeId,
        outcome: DecisionOutcome,
        actor: UserId,
        notes: &str,
    ) -> Result<Application, CommitteeError> {
        let committee = self.committee(committee_id)?;
        if committee.chair() != Some(actor) {
            warn!(committee = %committee_id, %actor, "decision attempted by non-chair");
            return Err(CommitteeError::NotChair {
                committee: committee_id,
                user: actor,
            });
        }
        let application = self.application(application_id)?;
        if application.status != ApplicationStatus::Interview {
            return Err(CommitteeError::NotInInterview {
                application: application_id,
                status: application.status,
            });
        }

        let summary = self.aggregate(application_id, committee_id)?;
        let average = summary
            .average_score
            .map_or_else(|| "n/a".to_string(), |score| format!("{score:.2}"));
        let mut comments = format!(
            "Committee recommendation: {} (approve {}, reject {}, abstain {}, average score {})",
            summary.recommendation, summary.approve, summary.reject, summary.abstain, average
        );
        if !notes.trim().is_empty() {
            comments = format!("{}. {comments}", notes.trim());
        }

        Ok(self
            .applications
            .transition(application_id, outcome.status(), &comments, actor)?)
    }

    fn application(&self, id: ApplicationId) -> Result<Application, CommitteeError> {
        self.store
            .application(id)?
            .ok_or(CommitteeError::ApplicationNotFound(id))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommitteeError {
    #[error("user {user} lacks capability {capability}")]
    PermissionDenied {
        user: UserId,
        capability: &'static str,
    },
    #[error("committee name is required")]
    MissingName,
    #[error("user {0} is listed twice")]
    DuplicateMember(UserId),
    #[error("a committee needs exactly one chair (found {0})")]
    ChairCount(usize),
    #[error("company {0} already has an active committee")]
    DuplicateCommittee(CompanyId),
    #[error("committee {0} not found")]
    CommitteeNotFound(CommitteeId),
    #[error("committee {0} is not active")]
    CommitteeInactive(CommitteeId),
    #[error("application {0} not found")]
    ApplicationNotFound(ApplicationId),
    #[error("user {user} is not a member of committee {committee}")]
    NotMember { committee: CommitteeId, user: UserId },
    #[error("user {user} is an inactive member of committee {committee}")]
    InactiveMember { committee: CommitteeId, user: UserId },
    #[error("observer {0} cannot vote")]
    ObserverCannotVote(UserId),
    #[error("score must be between 0 and 100 (got {0})")]
    ScoreOutOfRange(f64),
    #[error("criterion {criterion} must be between 0 and 100 (got {score})")]
    CriterionOutOfRange { criterion: String, score: f64 },
    #[error("only the chair of committee {committee} can record a decision (user {user})")]
    NotChair { committee: CommitteeId, user: UserId },
    #[error("application {application} is {status}; decisions need interview")]
    NotInInterview {
        application: ApplicationId,
        status: ApplicationStatus,
    },
    #[error(transparent)]
    Application(#[from] ApplicationServiceError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
