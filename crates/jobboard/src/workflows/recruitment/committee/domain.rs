use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::super::domain::{
    ApplicationId, ApplicationStatus, CommitteeId, CompanyId, EvaluationId, Timestamp, UserId,
    VacancyId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitteeRole {
    Chair,
    Secretary,
    Evaluator,
    Observer,
}

impl CommitteeRole {
    pub const fn can_vote(self) -> bool {
        !matches!(self, CommitteeRole::Observer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitteeMember {
    pub user_id: UserId,
    pub role: CommitteeRole,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Committee {
    pub id: CommitteeId,
    pub company_id: CompanyId,
    pub vacancy_id: Option<VacancyId>,
    pub name: String,
    pub active: bool,
    pub members: Vec<CommitteeMember>,
    pub time_created: Timestamp,
}

impl Committee {
    pub fn member(&self, user: UserId) -> Option<&CommitteeMember> {
        self.members.iter().find(|member| member.user_id == user)
    }

    pub fn chair(&self) -> Option<UserId> {
        self.members
            .iter()
            .find(|member| member.active && member.role == CommitteeRole::Chair)
            .map(|member| member.user_id)
    }

    pub fn voting_members(&self) -> usize {
        self.members
            .iter()
            .filter(|member| member.active && member.role.can_vote())
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCommittee {
    pub company_id: CompanyId,
    pub vacancy_id: Option<VacancyId>,
    pub name: String,
    pub members: Vec<CommitteeMember>,
    pub time_created: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vote {
    Approve,
    Reject,
    Abstain,
}

/// One evaluator's score and vote; unique per (committee, application, evaluator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: EvaluationId,
    pub committee_id: CommitteeId,
    pub application_id: ApplicationId,
    pub evaluator_id: UserId,
    pub score: f64,
    pub vote: Vote,
    pub comments: String,
    pub criteria: BTreeMap<String, f64>,
    pub time_created: Timestamp,
    pub time_modified: Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationDraft {
    pub committee_id: CommitteeId,
    pub application_id: ApplicationId,
    pub evaluator_id: UserId,
    pub score: f64,
    pub vote: Vote,
    pub comments: String,
    pub criteria: BTreeMap<String, f64>,
    pub at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitteeRecommendation {
    StrongApprove,
    Approve,
    Marginal,
    Reject,
    Pending,
}

impl CommitteeRecommendation {
    pub const fn label(self) -> &'static str {
        match self {
            CommitteeRecommendation::StrongApprove => "strong_approve",
            CommitteeRecommendation::Approve => "approve",
            CommitteeRecommendation::Marginal => "marginal",
            CommitteeRecommendation::Reject => "reject",
            CommitteeRecommendation::Pending => "pending",
        }
    }
}

impl fmt::Display for CommitteeRecommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Vote tally and score statistics for one application before one committee.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoteSummary {
    pub application_id: ApplicationId,
    pub committee_id: CommitteeId,
    pub approve: usize,
    pub reject: usize,
    pub abstain: usize,
    pub total: usize,
    pub average_score: Option<f64>,
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
    pub approve_ratio: Option<f64>,
    pub recommendation: CommitteeRecommendation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingEntry {
    pub rank: u32,
    pub application_id: ApplicationId,
    pub applicant_id: UserId,
    pub status: ApplicationStatus,
    pub average_score: Option<f64>,
    pub approve_votes: usize,
    pub evaluations: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn votes_deserialise_from_snake_case() {
        let votes: Vec<Vote> =
            serde_json::from_str(r#"["approve","reject","abstain"]"#).expect("known votes");
        assert_eq!(votes, vec![Vote::Approve, Vote::Reject, Vote::Abstain]);
        assert!(serde_json::from_str::<Vote>(r#""Approve""#).is_err());
    }
}
