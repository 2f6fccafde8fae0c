//! Pure vote tallying and ranking; no store access so results are reproducible.

use std::cmp::Ordering;

use super::super::domain::{Application, ApplicationId, ApplicationStatus, CommitteeId};
use super::domain::{CommitteeRecommendation, Evaluation, RankingEntry, Vote, VoteSummary};

/// Statuses that take part in a vacancy ranking.
pub const RANKED_STATUSES: [ApplicationStatus; 4] = [
    ApplicationStatus::Interview,
    ApplicationStatus::DocsValidated,
    ApplicationStatus::Selected,
    ApplicationStatus::Rejected,
];

/// Recommendation from the approve ratio among non-abstaining voters.
pub fn recommendation_for(approve: usize, reject: usize) -> CommitteeRecommendation {
    let voters = approve + reject;
    if voters == 0 {
        return CommitteeRecommendation::Pending;
    }
    let percent = approve as f64 * 100.0 / voters as f64;
    if percent >= 66.0 {
        CommitteeRecommendation::StrongApprove
    } else if percent >= 50.0 {
        CommitteeRecommendation::Approve
    } else if percent >= 33.0 {
        CommitteeRecommendation::Marginal
    } else {
        CommitteeRecommendation::Reject
    }
}

pub fn summarise_votes(
    committee: CommitteeId,
    application: ApplicationId,
    evaluations: &[Evaluation],
) -> VoteSummary {
    let count = |vote: Vote| {
        evaluations
            .iter()
            .filter(|evaluation| evaluation.vote == vote)
            .count()
    };
    let approve = count(Vote::Approve);
    let reject = count(Vote::Reject);
    let abstain = count(Vote::Abstain);

    let scores: Vec<f64> = evaluations.iter().map(|evaluation| evaluation.score).collect();
    let average_score = mean(&scores);
    let min_score = scores.iter().copied().reduce(f64::min);
    let max_score = scores.iter().copied().reduce(f64::max);
    let approve_ratio =
        (approve + reject > 0).then(|| approve as f64 / (approve + reject) as f64);

    VoteSummary {
        application_id: application,
        committee_id: committee,
        approve,
        reject,
        abstain,
        total: evaluations.len(),
        average_score,
        min_score,
        max_score,
        approve_ratio,
        recommendation: recommendation_for(approve, reject),
    }
}

/// Order candidates by average score then approve votes; equal keys share a rank and
/// the next distinct key takes the following number.
pub fn rank(candidates: Vec<(Application, Vec<Evaluation>)>) -> Vec<RankingEntry> {
    let mut rows: Vec<RankingEntry> = candidates
        .into_iter()
        .filter(|(application, _)| RANKED_STATUSES.contains(&application.status))
        .map(|(application, evaluations)| {
            let scores: Vec<f64> = evaluations.iter().map(|evaluation| evaluation.score).collect();
            RankingEntry {
                rank: 0,
                application_id: application.id,
                applicant_id: application.applicant_id,
                status: application.status,
                average_score: mean(&scores).map(round2),
                approve_votes: evaluations
                    .iter()
                    .filter(|evaluation| evaluation.vote == Vote::Approve)
                    .count(),
                evaluations: evaluations.len(),
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        compare_scores(b.average_score, a.average_score)
            .then_with(|| b.approve_votes.cmp(&a.approve_votes))
            .then_with(|| a.application_id.cmp(&b.application_id))
    });

    let mut rank = 0;
    let mut previous: Option<(Option<f64>, usize)> = None;
    for row in &mut rows {
        let key = (row.average_score, row.approve_votes);
        if previous != Some(key) {
            rank += 1;
            previous = Some(key);
        }
        row.rank = rank;
    }
    rows
}

/// Unscored candidates sort after every scored one.
fn compare_scores(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_of_three_approvals_is_strong() {
        assert_eq!(recommendation_for(2, 1), CommitteeRecommendation::StrongApprove);
    }

    #[test]
    fn thresholds_are_inclusive() {
        assert_eq!(recommendation_for(1, 1), CommitteeRecommendation::Approve);
        assert_eq!(recommendation_for(1, 2), CommitteeRecommendation::Marginal);
        assert_eq!(recommendation_for(1, 3), CommitteeRecommendation::Reject);
        assert_eq!(recommendation_for(0, 0), CommitteeRecommendation::Pending);
    }

    #[test]
    fn averages_round_to_two_decimals() {
        assert_eq!(round2(83.333_333), 83.33);
        assert_eq!(round2(66.666), 66.67);
    }
}
