//! Selection committees: membership, evaluations, vote aggregation and ranking.

pub mod aggregate;
pub mod domain;
pub mod service;

pub use aggregate::{rank, recommendation_for, summarise_votes};
pub use domain::{
    Committee, CommitteeMember, CommitteeRecommendation, CommitteeRole, Evaluation,
    EvaluationDraft, NewCommittee, RankingEntry, Vote, VoteSummary,
};
pub use service::{
    CommitteeError, CommitteeRequest, CommitteeService, EvaluationInput, MemberRequest,
};
