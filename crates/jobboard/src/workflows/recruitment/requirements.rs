//! Applicant-specific document checklist.
//!
//! Vacancy requirements (or catalog defaults) are narrowed by convocatoria exemptions,
//! gender/profession/age conditions, and finally the applicant's active exemption.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::context::Collaborators;
use super::domain::{
    ApplicantProfile, ApplicationDocument, DocumentCategory, DocumentType, GenderCondition,
    ReviewStatus, Timestamp, UserId, VacancyId,
};
use super::exemptions::{ExemptionError, ExemptionResolver, RequiredDocuments};
use super::repository::{RecruitmentStore, RepositoryError};
use crate::config::{EngineConfig, RecentDocumentsPolicy};

/// One line of the applicant's checklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequirementView {
    pub code: String,
    pub name: String,
    pub category: DocumentCategory,
    pub is_required: bool,
    pub accepted_formats: Vec<String>,
    pub max_age_days: Option<u32>,
    pub sort_order: i32,
    pub conditions: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum RequirementError {
    #[error("vacancy {0} not found")]
    VacancyNotFound(VacancyId),
    #[error(transparent)]
    Exemption(#[from] ExemptionError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub struct RequirementCalculator<S: ?Sized> {
    store: Arc<S>,
    exemptions: ExemptionResolver<S>,
    collaborators: Collaborators,
    recent_documents: RecentDocumentsPolicy,
}

impl<S: ?Sized> Clone for RequirementCalculator<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            exemptions: self.exemptions.clone(),
            collaborators: self.collaborators.clone(),
            recent_documents: self.recent_documents,
        }
    }
}

impl<S> RequirementCalculator<S>
where
    S: RecruitmentStore + ?Sized,
{
    pub fn new(store: Arc<S>, collaborators: Collaborators, config: &EngineConfig) -> Self {
        let exemptions =
            ExemptionResolver::new(store.clone(), collaborators.clone(), config.exemption_tie_break);
        Self {
            store,
            exemptions,
            collaborators,
            recent_documents: config.recent_documents,
        }
    }

    /// Ordered checklist for `user` applying to `vacancy`.
    ///
    /// Empty when the vacancy has no convocatoria or no document type is enabled.
    pub fn resolve(
        &self,
        vacancy: VacancyId,
        user: UserId,
    ) -> Result<Vec<RequirementView>, RequirementError> {
        let record = self
            .store
            .vacancy(vacancy)?
            .ok_or(RequirementError::VacancyNotFound(vacancy))?;
        let Some(convocatoria) = record.convocatoria_id else {
            debug!(%vacancy, "vacancy has no convocatoria; checklist is empty");
            return Ok(Vec::new());
        };

        let mut views = self.base_requirements(vacancy)?;
        let types: HashMap<String, DocumentType> = self
            .store
            .document_types()?
            .into_iter()
            .map(|doc_type| (doc_type.code.clone(), doc_type))
            .collect();

        let exempted = self.exemptions.convocatoria_exempted_codes(convocatoria)?;
        views.retain(|view| !exempted.contains(&view.code));

        let profile = self.store.applicant_profile(user)?;
        let now = self.collaborators.now();
        if let Some(profile) = &profile {
            views.retain(|view| {
                types
                    .get(&view.code)
                    .map_or(true, |doc_type| applies_to(doc_type, profile, now))
            });
        }

        if let Some(exemption) = self.exemptions.active_exemption(user)? {
            match exemption.exemption_type.required_documents() {
                RequiredDocuments::Only(_) => {
                    let keep = exemption.exemption_type.required_documents().codes();
                    views.retain(|view| keep.contains(view.code.as_str()));
                }
                RequiredDocuments::FreshnessDependent => {
                    if self.recent_documents == RecentDocumentsPolicy::FreshnessCheck {
                        let fresh = self.fresh_codes(user, &views, now)?;
                        views.retain(|view| !fresh.contains(&view.code));
                    }
                }
            }
        }

        views.sort_by_key(|view| view.sort_order);
        debug!(%vacancy, %user, documents = views.len(), "checklist resolved");
        Ok(views)
    }

    fn base_requirements(&self, vacancy: VacancyId) -> Result<Vec<RequirementView>, RepositoryError> {
        let types = self.store.document_types()?;
        let explicit = self.store.requirements_for(vacancy)?;

        if explicit.is_empty() {
            return Ok(types
                .iter()
                .filter(|doc_type| doc_type.enabled)
                .map(|doc_type| default_view(doc_type))
                .collect());
        }

        let by_code: HashMap<&str, &DocumentType> = types
            .iter()
            .filter(|doc_type| doc_type.enabled)
            .map(|doc_type| (doc_type.code.as_str(), doc_type))
            .collect();

        let mut seen = BTreeSet::new();
        let mut views = Vec::new();
        for requirement in explicit {
            let Some(doc_type) = by_code.get(requirement.document_code.as_str()) else {
                continue;
            };
            if !seen.insert(requirement.document_code.clone()) {
                continue;
            }
            let mut view = default_view(doc_type);
            view.is_required = requirement.is_required;
            if let Some(formats) = requirement.accepted_formats {
                view.accepted_formats = formats;
            }
            if requirement.max_age_days.is_some() {
                view.max_age_days = requirement.max_age_days;
            }
            if let Some(order) = requirement.sort_order {
                view.sort_order = order;
            }
            views.push(view);
        }
        Ok(views)
    }

    fn fresh_codes(
        &self,
        user: UserId,
        views: &[RequirementView],
        now: Timestamp,
    ) -> Result<BTreeSet<String>, RepositoryError> {
        let documents = self.store.documents_for_applicant(user)?;
        Ok(views
            .iter()
            .filter(|view| {
                documents
                    .iter()
                    .any(|document| is_fresh(document, &view.code, view.max_age_days, now))
            })
            .map(|view| view.code.clone())
            .collect())
    }
}

fn default_view(doc_type: &DocumentType) -> RequirementView {
    let mut conditions = Vec::new();
    match doc_type.gender_condition {
        GenderCondition::Any => {}
        GenderCondition::MaleOnly => conditions.push("applies to male applicants".to_string()),
        GenderCondition::FemaleOnly => {
            conditions.push("applies to female applicants".to_string())
        }
    }
    if let Some(age) = doc_type.age_exemption_threshold {
        conditions.push(format!("not required from age {age}"));
    }
    if !doc_type.profession_exempt.is_empty() {
        let levels: Vec<&str> = doc_type.profession_exempt.iter().map(String::as_str).collect();
        conditions.push(format!("not required for {}", levels.join(", ")));
    }

    RequirementView {
        code: doc_type.code.clone(),
        name: doc_type.name.clone(),
        category: doc_type.category,
        is_required: doc_type.is_required,
        accepted_formats: doc_type.accepted_formats.clone(),
        max_age_days: doc_type.default_max_age_days,
        sort_order: doc_type.sort_order,
        conditions,
    }
}

fn applies_to(doc_type: &DocumentType, profile: &ApplicantProfile, now: Timestamp) -> bool {
    if !doc_type.gender_condition.admits(profile.gender) {
        return false;
    }
    if let Some(level) = &profile.education_level {
        if doc_type.profession_exempt.contains(level) {
            return false;
        }
    }
    if let (Some(threshold), Some(age)) = (
        doc_type.age_exemption_threshold,
        profile.age_on(now.date_naive()),
    ) {
        if age >= threshold {
            return false;
        }
    }
    true
}

/// An approved document counts as fresh while its issue date is inside the validity window.
pub(crate) fn is_fresh(
    document: &ApplicationDocument,
    code: &str,
    max_age_days: Option<u32>,
    now: Timestamp,
) -> bool {
    if document.document_code != code || document.review_status != ReviewStatus::Approved {
        return false;
    }
    match (max_age_days, document.issue_date) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(max_age), Some(issued)) => {
            let age = now.date_naive().signed_duration_since(issued).num_days();
            age >= 0 && age <= i64::from(max_age)
        }
    }
}
