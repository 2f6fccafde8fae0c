use std::sync::Arc;

use super::committee::CommitteeService;
use super::context::Collaborators;
use super::documents::DocumentReviewService;
use super::exemptions::ExemptionResolver;
use super::interviews::InterviewScheduler;
use super::repository::RecruitmentStore;
use super::requirements::RequirementCalculator;
use super::service::ApplicationService;
use crate::config::EngineConfig;

/// Every engine service wired against one store and one set of collaborators.
pub struct RecruitmentEngine<S: ?Sized> {
    pub applications: ApplicationService<S>,
    pub exemptions: ExemptionResolver<S>,
    pub requirements: RequirementCalculator<S>,
    pub documents: DocumentReviewService<S>,
    pub interviews: InterviewScheduler<S>,
    pub committees: CommitteeService<S>,
}

impl<S> RecruitmentEngine<S>
where
    S: RecruitmentStore + ?Sized,
{
    pub fn new(store: Arc<S>, collaborators: Collaborators, config: &EngineConfig) -> Self {
        let applications = ApplicationService::new(store.clone(), collaborators.clone());
        let exemptions = ExemptionResolver::new(
            store.clone(),
            collaborators.clone(),
            config.exemption_tie_break,
        );
        let requirements = RequirementCalculator::new(store.clone(), collaborators.clone(), config);
        let documents = DocumentReviewService::new(
            store.clone(),
            collaborators.clone(),
            requirements.clone(),
            applications.clone(),
        );
        let interviews = InterviewScheduler::new(
            store.clone(),
            collaborators.clone(),
            applications.clone(),
            config,
        );
        let committees = CommitteeService::new(store, collaborators, applications.clone());

        Self {
            applications,
            exemptions,
            requirements,
            documents,
            interviews,
            committees,
        }
    }
}
