//! Allowed application status transitions and the notification each one triggers.
//!
//! `withdrawn` has no entry in the edge table; only the withdraw operation reaches it.

use super::domain::ApplicationStatus;

const TRANSITIONS: &[(ApplicationStatus, &[ApplicationStatus])] = &[
    (
        ApplicationStatus::Submitted,
        &[ApplicationStatus::UnderReview, ApplicationStatus::Rejected],
    ),
    (
        ApplicationStatus::UnderReview,
        &[
            ApplicationStatus::DocsValidated,
            ApplicationStatus::DocsRejected,
        ],
    ),
    (
        ApplicationStatus::DocsRejected,
        &[ApplicationStatus::UnderReview],
    ),
    (
        ApplicationStatus::DocsValidated,
        &[ApplicationStatus::Interview, ApplicationStatus::Rejected],
    ),
    (
        ApplicationStatus::Interview,
        &[ApplicationStatus::Selected, ApplicationStatus::Rejected],
    ),
];

impl ApplicationStatus {
    pub fn allowed_targets(self) -> &'static [ApplicationStatus] {
        TRANSITIONS
            .iter()
            .find(|(from, _)| *from == self)
            .map(|(_, targets)| *targets)
            .unwrap_or(&[])
    }

    pub fn can_transition_to(self, target: ApplicationStatus) -> bool {
        self.allowed_targets().contains(&target)
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Selected | ApplicationStatus::Rejected | ApplicationStatus::Withdrawn
        )
    }

    /// Template queued to the applicant when an application enters this status.
    pub const fn notification_template(self) -> Option<&'static str> {
        match self {
            ApplicationStatus::Submitted => Some("application_received"),
            ApplicationStatus::DocsValidated => Some("docs_validated"),
            ApplicationStatus::DocsRejected => Some("docs_rejected"),
            ApplicationStatus::Selected => Some("selected"),
            ApplicationStatus::Rejected => Some("rejected"),
            ApplicationStatus::UnderReview
            | ApplicationStatus::Interview
            | ApplicationStatus::Withdrawn => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_have_no_outgoing_edges() {
        for status in ApplicationStatus::ALL {
            if status.is_terminal() {
                assert!(
                    status.allowed_targets().is_empty(),
                    "{status} should be terminal"
                );
            }
        }
    }

    #[test]
    fn docs_validated_requires_review_first() {
        assert!(!ApplicationStatus::Submitted.can_transition_to(ApplicationStatus::DocsValidated));
        assert!(ApplicationStatus::Submitted.can_transition_to(ApplicationStatus::UnderReview));
        assert!(ApplicationStatus::UnderReview.can_transition_to(ApplicationStatus::DocsValidated));
    }

    #[test]
    fn withdrawn_is_never_an_edge_target() {
        for status in ApplicationStatus::ALL {
            assert!(!status.can_transition_to(ApplicationStatus::Withdrawn));
        }
    }

    #[test]
    fn rejected_documents_can_be_resubmitted_for_review() {
        assert_eq!(
            ApplicationStatus::DocsRejected.allowed_targets(),
            &[ApplicationStatus::UnderReview]
        );
    }

    #[test]
    fn interview_status_has_no_template() {
        assert_eq!(ApplicationStatus::Interview.notification_template(), None);
        assert_eq!(
            ApplicationStatus::Selected.notification_template(),
            Some("selected")
        );
    }
}
